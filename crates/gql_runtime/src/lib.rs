//! Runtime for gql.
//!
//! This crate provides the schema side of gql:
//! - `schema`: Schema model and builder
//! - `sdl`: Building a schema from type definitions
//! - `introspection`: The introspection query and its result shape
//! - `index`: Scalar type lookup along response paths
//! - `validation`: Document validation
//! - `executor` / `resolver`: In-process execution

pub mod error;
pub mod executor;
pub mod index;
pub mod introspection;
pub mod resolver;
pub mod schema;
pub mod sdl;
pub mod validation;
pub mod value;

pub use error::SchemaError;
pub use executor::{Context, Executor, ExecutorConfig, FieldError, PathSegment, Response};
pub use introspection::{build_client_schema, IntrospectionSchema, INTROSPECTION_QUERY};
pub use resolver::{
    AsyncFnResolver, DefaultResolver, FnResolver, Resolver, ResolverArgs, ResolverError,
    ResolverFuture, ResolverInfo, ResolverMap, ResolverResult,
};
pub use schema::{
    DirectiveDefinition, EnumDef, EnumValueDef, FieldDef, InputFieldDef, InputObjectDef,
    InterfaceDef, ObjectDef, ScalarDef, Schema, SchemaBuilder, TypeDef, TypeKind, TypeRef,
    UnionDef, BUILTIN_SCALARS,
};
pub use sdl::build_ast_schema;
pub use validation::{validate, ValidationError};

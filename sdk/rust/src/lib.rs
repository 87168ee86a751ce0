//! gql client SDK
//!
//! A GraphQL client that validates documents against a schema, sends them
//! through a pluggable transport, and converts custom scalar values in
//! responses.
//!
//! # Custom scalars
//!
//! ```ignore
//! use gql_client::{Client, ScalarError};
//! use serde_json::Value;
//!
//! let client = Client::builder()
//!     .type_defs("scalar DateTime type Query { film: Film } type Film { releaseDate: DateTime }")
//!     .transport(HttpTransport::new("http://localhost:4000/graphql")?)
//!     .custom_scalar("DateTime", |v: &Value| -> Result<Value, ScalarError> { parse_date(v) })
//!     .build()
//!     .await?;
//!
//! // `releaseDate` comes back already converted.
//! let data = client.execute("{ film { releaseDate } }").await?;
//! ```
//!
//! # Local execution
//!
//! A client built with a schema and no transport executes documents
//! in-process through [`LocalSchemaTransport`], reading fields from a root
//! value or resolving them through a [`ResolverMap`].

pub mod client;
pub mod error;
pub mod scalars;
pub mod transport;
pub mod type_adapter;

pub use client::{Client, ClientBuilder, ClientConfig};
pub use error::{ErrorCode, GqlError, GqlResult, IntoGqlError, ResultExt};
pub use scalars::{CustomScalar, ScalarError, ScalarRegistry, ScalarRegistryBuilder};
pub use transport::{
    HttpTransport, HttpTransportConfig, LocalSchemaTransport, Request, Response, Transport,
};
pub use type_adapter::TypeAdapter;

// Re-export runtime types that are commonly needed
pub use gql_runtime::executor::{Context, FieldError, PathSegment};
pub use gql_runtime::resolver::{
    ResolverArgs, ResolverError, ResolverInfo, ResolverMap, ResolverResult,
};
pub use gql_runtime::schema::{Schema, SchemaBuilder};
pub use gql_runtime::{build_ast_schema, build_client_schema, INTROSPECTION_QUERY};

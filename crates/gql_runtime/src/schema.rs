//! Schema model for gql.
//!
//! A [`Schema`] is an immutable graph of named types. It is built once,
//! programmatically through [`SchemaBuilder`], from SDL (see [`crate::sdl`]),
//! or from an introspection result (see [`crate::introspection`]), and then
//! shared read-only.

use crate::error::SchemaError;
use gql_syntax::{DirectiveLocation, OperationType};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Names of the scalars every schema provides.
pub const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// A GraphQL schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub description: Option<String>,
    pub query_type: Option<String>,
    pub mutation_type: Option<String>,
    pub subscription_type: Option<String>,
    pub types: IndexMap<String, TypeDef>,
    pub directives: IndexMap<String, DirectiveDefinition>,
}

impl Schema {
    /// Creates a new empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a type by name.
    #[must_use]
    pub fn get_type(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Returns all types.
    pub fn types(&self) -> impl Iterator<Item = (&String, &TypeDef)> {
        self.types.iter()
    }

    /// Returns the name of the root type for an operation kind.
    #[must_use]
    pub fn root_type_name(&self, operation: OperationType) -> Option<&str> {
        match operation {
            OperationType::Query => self.query_type.as_deref(),
            OperationType::Mutation => self.mutation_type.as_deref(),
            OperationType::Subscription => self.subscription_type.as_deref(),
        }
    }

    /// Returns the root type for an operation kind.
    #[must_use]
    pub fn root_type(&self, operation: OperationType) -> Option<&TypeDef> {
        self.root_type_name(operation)
            .and_then(|name| self.get_type(name))
    }

    /// Looks up a field on an object or interface type.
    #[must_use]
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDef> {
        self.get_type(type_name)?.fields()?.get(field_name)
    }

    /// Returns true if `object_name` is a possible runtime type of `type_name`.
    ///
    /// Every type is a possible type of itself.
    #[must_use]
    pub fn is_possible_type(&self, type_name: &str, object_name: &str) -> bool {
        if type_name == object_name {
            return true;
        }
        match self.get_type(type_name) {
            Some(TypeDef::Union(union)) => union.members.iter().any(|m| m == object_name),
            Some(TypeDef::Interface(_)) => match self.get_type(object_name) {
                Some(TypeDef::Object(obj)) => obj.implements.iter().any(|i| i == type_name),
                Some(TypeDef::Interface(iface)) => iface.implements.iter().any(|i| i == type_name),
                _ => false,
            },
            _ => false,
        }
    }

    /// Returns the object types an abstract type may resolve to.
    #[must_use]
    pub fn possible_types(&self, type_name: &str) -> Vec<&str> {
        match self.get_type(type_name) {
            Some(TypeDef::Union(union)) => union.members.iter().map(String::as_str).collect(),
            Some(TypeDef::Interface(_)) => self
                .types
                .values()
                .filter_map(|def| match def {
                    TypeDef::Object(obj) if obj.implements.iter().any(|i| i == type_name) => {
                        Some(obj.name.as_str())
                    }
                    _ => None,
                })
                .collect(),
            Some(TypeDef::Object(obj)) => vec![obj.name.as_str()],
            _ => Vec::new(),
        }
    }

    /// Checks that every type reference resolves to a defined type.
    ///
    /// # Errors
    ///
    /// Returns the first dangling reference found.
    pub fn check_references(&self) -> Result<(), SchemaError> {
        let unknown = |name: &str, referenced_by: String| SchemaError::UnknownType {
            name: name.to_string(),
            referenced_by,
        };
        let check = |ty: &TypeRef, referenced_by: &dyn Fn() -> String| {
            let name = ty.named_type();
            if self.types.contains_key(name) {
                Ok(())
            } else {
                Err(unknown(name, referenced_by()))
            }
        };

        for (operation, root) in [
            ("query", &self.query_type),
            ("mutation", &self.mutation_type),
            ("subscription", &self.subscription_type),
        ] {
            if let Some(root) = root {
                match self.get_type(root) {
                    Some(TypeDef::Object(_)) => {}
                    Some(_) => {
                        return Err(SchemaError::InvalidRoot {
                            operation,
                            name: root.clone(),
                        })
                    }
                    None => return Err(unknown(root, format!("schema {operation} root"))),
                }
            }
        }

        for def in self.types.values() {
            let type_name = def.name();
            if let Some(fields) = def.fields() {
                for field in fields.values() {
                    check(&field.ty, &|| format!("{type_name}.{}", field.name))?;
                    for arg in field.arguments.values() {
                        check(&arg.ty, &|| format!("{type_name}.{}({}:)", field.name, arg.name))?;
                    }
                }
            }
            match def {
                TypeDef::Object(ObjectDef { implements, .. })
                | TypeDef::Interface(InterfaceDef { implements, .. }) => {
                    for iface in implements {
                        if !matches!(self.get_type(iface), Some(TypeDef::Interface(_))) {
                            return Err(unknown(iface, type_name.to_string()));
                        }
                    }
                }
                TypeDef::Union(union) => {
                    for member in &union.members {
                        if !matches!(self.get_type(member), Some(TypeDef::Object(_))) {
                            return Err(unknown(member, type_name.to_string()));
                        }
                    }
                }
                TypeDef::InputObject(input) => {
                    for field in input.fields.values() {
                        check(&field.ty, &|| format!("{type_name}.{}", field.name))?;
                    }
                }
                TypeDef::Scalar(_) | TypeDef::Enum(_) => {}
            }
        }

        Ok(())
    }
}

/// Classification of a named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
}

impl TypeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Object => "OBJECT",
            Self::Interface => "INTERFACE",
            Self::Union => "UNION",
            Self::Enum => "ENUM",
            Self::InputObject => "INPUT_OBJECT",
        }
    }
}

/// A type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeDef {
    Scalar(ScalarDef),
    Object(ObjectDef),
    Interface(InterfaceDef),
    Union(UnionDef),
    Enum(EnumDef),
    InputObject(InputObjectDef),
}

impl TypeDef {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(def) => &def.name,
            Self::Object(def) => &def.name,
            Self::Interface(def) => &def.name,
            Self::Union(def) => &def.name,
            Self::Enum(def) => &def.name,
            Self::InputObject(def) => &def.name,
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Scalar(def) => def.description.as_deref(),
            Self::Object(def) => def.description.as_deref(),
            Self::Interface(def) => def.description.as_deref(),
            Self::Union(def) => def.description.as_deref(),
            Self::Enum(def) => def.description.as_deref(),
            Self::InputObject(def) => def.description.as_deref(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> TypeKind {
        match self {
            Self::Scalar(_) => TypeKind::Scalar,
            Self::Object(_) => TypeKind::Object,
            Self::Interface(_) => TypeKind::Interface,
            Self::Union(_) => TypeKind::Union,
            Self::Enum(_) => TypeKind::Enum,
            Self::InputObject(_) => TypeKind::InputObject,
        }
    }

    /// Returns the output fields of object and interface types.
    #[must_use]
    pub fn fields(&self) -> Option<&IndexMap<String, FieldDef>> {
        match self {
            Self::Object(def) => Some(&def.fields),
            Self::Interface(def) => Some(&def.fields),
            _ => None,
        }
    }

    /// Returns true for types that take a selection set.
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Interface(_) | Self::Union(_))
    }

    /// Returns true for scalars and enums.
    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }

    /// Returns true for types usable as arguments and variables.
    #[must_use]
    pub const fn is_input(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_) | Self::InputObject(_))
    }

    /// Returns true for interfaces and unions.
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        matches!(self, Self::Interface(_) | Self::Union(_))
    }
}

/// Scalar type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalarDef {
    pub name: String,
    pub description: Option<String>,
}

impl ScalarDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// Object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

impl ObjectDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: IndexMap::new(),
            implements: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    /// Declares an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.implements.push(interface.into());
        self
    }
}

/// Interface type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, FieldDef>,
    pub implements: Vec<String>,
}

/// Union type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionDef {
    pub name: String,
    pub description: Option<String>,
    pub members: Vec<String>,
}

/// Enum type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub description: Option<String>,
    pub values: Vec<EnumValueDef>,
}

/// Enum value definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumValueDef {
    pub name: String,
    pub description: Option<String>,
    pub deprecated: bool,
    pub deprecation_reason: Option<String>,
}

/// Input object type definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputObjectDef {
    pub name: String,
    pub description: Option<String>,
    pub fields: IndexMap<String, InputFieldDef>,
}

/// Field definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub arguments: IndexMap<String, InputFieldDef>,
    pub deprecated: bool,
    pub deprecation_reason: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            arguments: IndexMap::new(),
            deprecated: false,
            deprecation_reason: None,
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn argument(mut self, arg: InputFieldDef) -> Self {
        self.arguments.insert(arg.name.clone(), arg);
        self
    }
}

/// Input field definition, used for arguments and input object fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputFieldDef {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
    pub default_value: Option<serde_json::Value>,
}

impl InputFieldDef {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            description: None,
            ty,
            default_value: None,
        }
    }

    /// Returns true if a value must be supplied.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.ty.is_non_null() && self.default_value.is_none()
    }
}

/// Type reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    #[must_use]
    pub fn list(inner: TypeRef) -> Self {
        Self::List(Box::new(inner))
    }

    #[must_use]
    pub fn non_null(inner: TypeRef) -> Self {
        Self::NonNull(Box::new(inner))
    }

    /// Unwraps list and non-null wrappers down to the named type.
    #[must_use]
    pub fn named_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.named_type(),
        }
    }

    #[must_use]
    pub const fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Returns the type with an outer non-null wrapper removed.
    #[must_use]
    pub fn nullable(&self) -> &TypeRef {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }

    /// Returns true if the type is a list once non-null is removed.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), Self::List(_))
    }

    /// Converts a type reference from a parsed document.
    #[must_use]
    pub fn from_ast(ty: &gql_syntax::Type<'_>) -> Self {
        match ty {
            gql_syntax::Type::Named(name) => Self::named(name.value),
            gql_syntax::Type::List(inner, _) => Self::list(Self::from_ast(inner)),
            gql_syntax::Type::NonNull(inner, _) => Self::non_null(Self::from_ast(inner)),
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

/// Directive definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveDefinition {
    pub name: String,
    pub description: Option<String>,
    pub arguments: IndexMap<String, InputFieldDef>,
    pub locations: Vec<DirectiveLocation>,
    pub repeatable: bool,
}

/// Schema builder.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Creates a builder with the built-in scalars and directives registered.
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self::default();
        for name in BUILTIN_SCALARS {
            builder.schema.types.insert(
                name.to_string(),
                TypeDef::Scalar(ScalarDef {
                    name: name.to_string(),
                    description: Some(format!("The `{name}` scalar type.")),
                }),
            );
        }

        let condition = |name: &str, description: &str| DirectiveDefinition {
            name: name.to_string(),
            description: Some(description.to_string()),
            arguments: IndexMap::from([(
                "if".to_string(),
                InputFieldDef::new("if", TypeRef::non_null(TypeRef::named("Boolean"))),
            )]),
            locations: vec![
                DirectiveLocation::Field,
                DirectiveLocation::FragmentSpread,
                DirectiveLocation::InlineFragment,
            ],
            repeatable: false,
        };
        let mut deprecation_reason = InputFieldDef::new("reason", TypeRef::named("String"));
        deprecation_reason.default_value = Some(serde_json::Value::from("No longer supported"));

        for directive in [
            condition("skip", "Skips this field or fragment when `if` is true."),
            condition("include", "Includes this field or fragment only when `if` is true."),
            DirectiveDefinition {
                name: "deprecated".to_string(),
                description: Some("Marks an element as no longer supported.".to_string()),
                arguments: IndexMap::from([("reason".to_string(), deprecation_reason)]),
                locations: vec![
                    DirectiveLocation::FieldDefinition,
                    DirectiveLocation::ArgumentDefinition,
                    DirectiveLocation::InputFieldDefinition,
                    DirectiveLocation::EnumValue,
                ],
                repeatable: false,
            },
        ] {
            builder
                .schema
                .directives
                .insert(directive.name.clone(), directive);
        }
        builder
    }

    /// Sets the schema description.
    #[must_use]
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.schema.description = Some(desc.into());
        self
    }

    /// Sets the query type.
    #[must_use]
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = Some(name.into());
        self
    }

    /// Sets the mutation type.
    #[must_use]
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = Some(name.into());
        self
    }

    /// Sets the subscription type.
    #[must_use]
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.schema.subscription_type = Some(name.into());
        self
    }

    /// Adds a type, replacing any previous type of the same name.
    #[must_use]
    pub fn add_type(mut self, type_def: TypeDef) -> Self {
        self.schema
            .types
            .insert(type_def.name().to_string(), type_def);
        self
    }

    /// Adds a directive definition.
    #[must_use]
    pub fn add_directive(mut self, directive: DirectiveDefinition) -> Self {
        self.schema
            .directives
            .insert(directive.name.clone(), directive);
        self
    }

    /// Returns true if a type of this name has been added.
    #[must_use]
    pub fn has_type(&self, name: &str) -> bool {
        self.schema.types.contains_key(name)
    }

    pub(crate) fn type_mut(&mut self, name: &str) -> Option<&mut TypeDef> {
        self.schema.types.get_mut(name)
    }

    /// Builds the schema.
    #[must_use]
    pub fn build(self) -> Schema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn film_schema() -> Schema {
        SchemaBuilder::new()
            .query_type("Query")
            .add_type(TypeDef::Scalar(ScalarDef::new("DateTime")))
            .add_type(TypeDef::Object(
                ObjectDef::new("Query").field(
                    FieldDef::new("film", TypeRef::named("Film"))
                        .argument(InputFieldDef::new("id", TypeRef::non_null(TypeRef::named("ID")))),
                ),
            ))
            .add_type(TypeDef::Object(
                ObjectDef::new("Film")
                    .implements("Node")
                    .field(FieldDef::new("id", TypeRef::non_null(TypeRef::named("ID"))))
                    .field(FieldDef::new("releaseDate", TypeRef::named("DateTime"))),
            ))
            .add_type(TypeDef::Interface(InterfaceDef {
                name: "Node".to_string(),
                description: None,
                fields: IndexMap::from([(
                    "id".to_string(),
                    FieldDef::new("id", TypeRef::non_null(TypeRef::named("ID"))),
                )]),
                implements: Vec::new(),
            }))
            .build()
    }

    #[test]
    fn test_schema_builder() {
        let schema = film_schema();

        assert_eq!(schema.query_type.as_deref(), Some("Query"));
        assert!(schema.get_type("Boolean").is_some());
        assert!(schema.directives.contains_key("skip"));
        assert_eq!(
            schema.root_type(OperationType::Query).map(TypeDef::name),
            Some("Query")
        );
        assert!(schema.root_type(OperationType::Mutation).is_none());
        assert!(schema.check_references().is_ok());
    }

    #[test]
    fn test_type_ref_unwrapping() {
        let ty = TypeRef::non_null(TypeRef::list(TypeRef::non_null(TypeRef::named("Film"))));
        assert_eq!(ty.named_type(), "Film");
        assert_eq!(ty.to_string(), "[Film!]!");
        assert!(ty.is_list());
        assert!(ty.is_non_null());
    }

    #[test]
    fn test_possible_types() {
        let schema = film_schema();
        assert!(schema.is_possible_type("Node", "Film"));
        assert!(schema.is_possible_type("Film", "Film"));
        assert!(!schema.is_possible_type("Film", "Query"));
        assert_eq!(schema.possible_types("Node"), vec!["Film"]);
    }

    #[test]
    fn test_check_references_reports_dangling_type() {
        let schema = SchemaBuilder::new()
            .query_type("Query")
            .add_type(TypeDef::Object(
                ObjectDef::new("Query").field(FieldDef::new("film", TypeRef::named("Film"))),
            ))
            .build();

        let err = schema.check_references().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown type `Film` referenced by `Query.film`"
        );
    }

    #[test]
    fn test_required_arguments() {
        let schema = film_schema();
        let film = schema.field("Query", "film").unwrap();
        assert!(film.arguments["id"].is_required());
    }
}

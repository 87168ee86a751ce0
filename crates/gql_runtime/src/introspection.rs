//! Introspection: the standard query, its result shape, and conversions
//! between that shape and [`Schema`].

use crate::error::SchemaError;
use crate::schema::{
    DirectiveDefinition, EnumDef, EnumValueDef, FieldDef, InputFieldDef, InputObjectDef,
    InterfaceDef, ObjectDef, ScalarDef, Schema, SchemaBuilder, TypeDef, TypeKind, TypeRef,
    UnionDef,
};
use crate::value::{const_to_json, print_literal};
use gql_syntax::DirectiveLocation;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The query used to fetch a schema from a server.
pub const INTROSPECTION_QUERY: &str = r"
query IntrospectionQuery {
  __schema {
    description
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types {
      ...FullType
    }
    directives {
      name
      description
      isRepeatable
      locations
      args {
        ...InputValue
      }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args {
      ...InputValue
    }
    type {
      ...TypeRef
    }
    isDeprecated
    deprecationReason
  }
  inputFields {
    ...InputValue
  }
  interfaces {
    ...TypeRef
  }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes {
    ...TypeRef
  }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
";

/// The `__schema` object of an introspection result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionSchema {
    #[serde(default)]
    pub description: Option<String>,
    pub query_type: Option<RootTypeRef>,
    #[serde(default)]
    pub mutation_type: Option<RootTypeRef>,
    #[serde(default)]
    pub subscription_type: Option<RootTypeRef>,
    pub types: Vec<FullType>,
    #[serde(default)]
    pub directives: Vec<IntrospectionDirective>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootTypeRef {
    pub name: String,
}

/// A named type as reported by introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullType {
    pub kind: TypeKind,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<IntrospectionField>>,
    #[serde(default)]
    pub input_fields: Option<Vec<IntrospectionInputValue>>,
    #[serde(default)]
    pub interfaces: Option<Vec<IntrospectionTypeRef>>,
    #[serde(default)]
    pub enum_values: Option<Vec<IntrospectionEnumValue>>,
    #[serde(default)]
    pub possible_types: Option<Vec<IntrospectionTypeRef>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionField {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub args: Vec<IntrospectionInputValue>,
    #[serde(rename = "type")]
    pub ty: IntrospectionTypeRef,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

/// An argument or input field. `default_value` is a printed literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionInputValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub ty: IntrospectionTypeRef,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionEnumValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_deprecated: bool,
    #[serde(default)]
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionDirective {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub locations: Vec<DirectiveLocation>,
    #[serde(default)]
    pub args: Vec<IntrospectionInputValue>,
    #[serde(default)]
    pub is_repeatable: bool,
}

/// Kinds that can appear in a type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeRefKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

impl From<TypeKind> for TypeRefKind {
    fn from(kind: TypeKind) -> Self {
        match kind {
            TypeKind::Scalar => Self::Scalar,
            TypeKind::Object => Self::Object,
            TypeKind::Interface => Self::Interface,
            TypeKind::Union => Self::Union,
            TypeKind::Enum => Self::Enum,
            TypeKind::InputObject => Self::InputObject,
        }
    }
}

/// A possibly wrapped type reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionTypeRef {
    pub kind: TypeRefKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub of_type: Option<Box<IntrospectionTypeRef>>,
}

impl IntrospectionTypeRef {
    fn to_type_ref(&self) -> Result<TypeRef, SchemaError> {
        let inner = || {
            self.of_type
                .as_deref()
                .ok_or_else(|| {
                    SchemaError::Introspection(format!("{:?} type without ofType", self.kind))
                })
                .and_then(Self::to_type_ref)
        };
        match self.kind {
            TypeRefKind::List => Ok(TypeRef::list(inner()?)),
            TypeRefKind::NonNull => Ok(TypeRef::non_null(inner()?)),
            _ => self.name.clone().map(TypeRef::Named).ok_or_else(|| {
                SchemaError::Introspection("named type reference without a name".to_string())
            }),
        }
    }
}

/// Builds a schema from an introspection result.
///
/// Accepts either the `data` object (`{"__schema": ..}`) or a full response
/// (`{"data": {"__schema": ..}}`). Introspection types (`__Type` and
/// friends) are skipped.
///
/// # Errors
///
/// Returns [`SchemaError::Introspection`] when the value does not have the
/// introspection shape, and a reference error when it names undefined types.
pub fn build_client_schema(introspection: &Value) -> Result<Schema, SchemaError> {
    let raw = introspection
        .get("__schema")
        .or_else(|| introspection.get("data").and_then(|d| d.get("__schema")))
        .ok_or_else(|| SchemaError::Introspection("missing `__schema`".to_string()))?;
    let parsed: IntrospectionSchema = serde_json::from_value(raw.clone())
        .map_err(|e| SchemaError::Introspection(e.to_string()))?;

    let mut builder = SchemaBuilder::new();
    for full_type in &parsed.types {
        if full_type.name.starts_with("__") {
            continue;
        }
        builder = builder.add_type(convert_full_type(full_type)?);
    }
    for directive in &parsed.directives {
        builder = builder.add_directive(DirectiveDefinition {
            name: directive.name.clone(),
            description: directive.description.clone(),
            arguments: convert_input_values(&directive.args)?,
            locations: directive.locations.clone(),
            repeatable: directive.is_repeatable,
        });
    }

    if let Some(root) = parsed.query_type {
        builder = builder.query_type(root.name);
    }
    if let Some(root) = parsed.mutation_type {
        builder = builder.mutation_type(root.name);
    }
    if let Some(root) = parsed.subscription_type {
        builder = builder.subscription_type(root.name);
    }
    if let Some(description) = parsed.description {
        builder = builder.description(description);
    }

    let schema = builder.build();
    schema.check_references()?;
    Ok(schema)
}

fn convert_full_type(full_type: &FullType) -> Result<TypeDef, SchemaError> {
    let name = full_type.name.clone();
    let description = full_type.description.clone();
    let names = |refs: &Option<Vec<IntrospectionTypeRef>>| -> Vec<String> {
        refs.iter()
            .flatten()
            .filter_map(|r| r.name.clone())
            .collect()
    };

    Ok(match full_type.kind {
        TypeKind::Scalar => TypeDef::Scalar(ScalarDef { name, description }),
        TypeKind::Object => TypeDef::Object(ObjectDef {
            name,
            description,
            fields: convert_fields(full_type.fields.as_deref().unwrap_or_default())?,
            implements: names(&full_type.interfaces),
        }),
        TypeKind::Interface => TypeDef::Interface(InterfaceDef {
            name,
            description,
            fields: convert_fields(full_type.fields.as_deref().unwrap_or_default())?,
            implements: names(&full_type.interfaces),
        }),
        TypeKind::Union => TypeDef::Union(UnionDef {
            name,
            description,
            members: names(&full_type.possible_types),
        }),
        TypeKind::Enum => TypeDef::Enum(EnumDef {
            name,
            description,
            values: full_type
                .enum_values
                .iter()
                .flatten()
                .map(|value| EnumValueDef {
                    name: value.name.clone(),
                    description: value.description.clone(),
                    deprecated: value.is_deprecated,
                    deprecation_reason: value.deprecation_reason.clone(),
                })
                .collect(),
        }),
        TypeKind::InputObject => TypeDef::InputObject(InputObjectDef {
            name,
            description,
            fields: convert_input_values(full_type.input_fields.as_deref().unwrap_or_default())?,
        }),
    })
}

fn convert_fields(fields: &[IntrospectionField]) -> Result<IndexMap<String, FieldDef>, SchemaError> {
    fields
        .iter()
        .map(|field| {
            let def = FieldDef {
                name: field.name.clone(),
                description: field.description.clone(),
                ty: field.ty.to_type_ref()?,
                arguments: convert_input_values(&field.args)?,
                deprecated: field.is_deprecated,
                deprecation_reason: field.deprecation_reason.clone(),
            };
            Ok((def.name.clone(), def))
        })
        .collect()
}

fn convert_input_values(
    values: &[IntrospectionInputValue],
) -> Result<IndexMap<String, InputFieldDef>, SchemaError> {
    values
        .iter()
        .map(|value| {
            let default_value = value
                .default_value
                .as_deref()
                .map(|literal| {
                    gql_syntax::parse_const_value(literal)
                        .map(|parsed| const_to_json(&parsed))
                        .map_err(|_| {
                            SchemaError::Introspection(format!(
                                "invalid default value for `{}`: {literal}",
                                value.name
                            ))
                        })
                })
                .transpose()?;
            let def = InputFieldDef {
                name: value.name.clone(),
                description: value.description.clone(),
                ty: value.ty.to_type_ref()?,
                default_value,
            };
            Ok((def.name.clone(), def))
        })
        .collect()
}

impl Schema {
    /// Describes this schema in the introspection result shape.
    #[must_use]
    pub fn to_introspection_schema(&self) -> IntrospectionSchema {
        let root = |name: Option<&String>| name.map(|name| RootTypeRef { name: name.clone() });
        IntrospectionSchema {
            description: self.description.clone(),
            query_type: root(self.query_type.as_ref()),
            mutation_type: root(self.mutation_type.as_ref()),
            subscription_type: root(self.subscription_type.as_ref()),
            types: self.types.values().map(|ty| self.full_type(ty)).collect(),
            directives: self
                .directives
                .values()
                .map(|directive| IntrospectionDirective {
                    name: directive.name.clone(),
                    description: directive.description.clone(),
                    locations: directive.locations.clone(),
                    args: self.input_values(&directive.arguments),
                    is_repeatable: directive.repeatable,
                })
                .collect(),
        }
    }

    /// Returns the `data` of an introspection query against this schema,
    /// `{"__schema": ..}`.
    #[must_use]
    pub fn to_introspection(&self) -> Value {
        let schema = serde_json::to_value(self.to_introspection_schema()).unwrap_or(Value::Null);
        serde_json::json!({ "__schema": schema })
    }

    /// Describes one named type in the introspection shape.
    #[must_use]
    pub fn introspect_type(&self, name: &str) -> Option<FullType> {
        self.get_type(name).map(|ty| self.full_type(ty))
    }

    fn full_type(&self, ty: &TypeDef) -> FullType {
        let mut full = FullType {
            kind: ty.kind(),
            name: ty.name().to_string(),
            description: ty.description().map(str::to_string),
            fields: None,
            input_fields: None,
            interfaces: None,
            enum_values: None,
            possible_types: None,
        };
        match ty {
            TypeDef::Scalar(_) => {}
            TypeDef::Object(ObjectDef {
                fields, implements, ..
            })
            | TypeDef::Interface(InterfaceDef {
                fields, implements, ..
            }) => {
                full.fields = Some(
                    fields
                        .values()
                        .map(|field| IntrospectionField {
                            name: field.name.clone(),
                            description: field.description.clone(),
                            args: self.input_values(&field.arguments),
                            ty: self.type_ref(&field.ty),
                            is_deprecated: field.deprecated,
                            deprecation_reason: field.deprecation_reason.clone(),
                        })
                        .collect(),
                );
                full.interfaces = Some(implements.iter().map(|name| self.named_ref(name)).collect());
                if ty.is_abstract() {
                    full.possible_types = Some(self.possible_type_refs(ty.name()));
                }
            }
            TypeDef::Union(_) => full.possible_types = Some(self.possible_type_refs(ty.name())),
            TypeDef::Enum(def) => {
                full.enum_values = Some(
                    def.values
                        .iter()
                        .map(|value| IntrospectionEnumValue {
                            name: value.name.clone(),
                            description: value.description.clone(),
                            is_deprecated: value.deprecated,
                            deprecation_reason: value.deprecation_reason.clone(),
                        })
                        .collect(),
                );
            }
            TypeDef::InputObject(def) => full.input_fields = Some(self.input_values(&def.fields)),
        }
        full
    }

    fn possible_type_refs(&self, name: &str) -> Vec<IntrospectionTypeRef> {
        self.possible_types(name)
            .into_iter()
            .map(|name| self.named_ref(name))
            .collect()
    }

    fn input_values(&self, values: &IndexMap<String, InputFieldDef>) -> Vec<IntrospectionInputValue> {
        values
            .values()
            .map(|value| {
                let is_enum_type =
                    matches!(self.get_type(value.ty.named_type()), Some(TypeDef::Enum(_)));
                IntrospectionInputValue {
                    name: value.name.clone(),
                    description: value.description.clone(),
                    ty: self.type_ref(&value.ty),
                    default_value: value
                        .default_value
                        .as_ref()
                        .map(|default| print_literal(default, &|_| is_enum_type)),
                }
            })
            .collect()
    }

    fn type_ref(&self, ty: &TypeRef) -> IntrospectionTypeRef {
        match ty {
            TypeRef::Named(name) => self.named_ref(name),
            TypeRef::List(inner) => IntrospectionTypeRef {
                kind: TypeRefKind::List,
                name: None,
                of_type: Some(Box::new(self.type_ref(inner))),
            },
            TypeRef::NonNull(inner) => IntrospectionTypeRef {
                kind: TypeRefKind::NonNull,
                name: None,
                of_type: Some(Box::new(self.type_ref(inner))),
            },
        }
    }

    fn named_ref(&self, name: &str) -> IntrospectionTypeRef {
        IntrospectionTypeRef {
            kind: self
                .get_type(name)
                .map_or(TypeRefKind::Scalar, |ty| ty.kind().into()),
            name: Some(name.to_string()),
            of_type: None,
        }
    }
}

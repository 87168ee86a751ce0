//! Schema construction from type definitions (SDL).

use crate::error::SchemaError;
use crate::schema::{
    DirectiveDefinition, EnumDef, EnumValueDef, FieldDef, InputFieldDef, InputObjectDef,
    InterfaceDef, ObjectDef, ScalarDef, Schema, SchemaBuilder, TypeDef, TypeRef, UnionDef,
    BUILTIN_SCALARS,
};
use crate::value::const_to_json;
use gql_syntax::{self as ast, Definition, OperationType};
use indexmap::IndexMap;

/// Builds a schema from SDL type definitions.
///
/// Root types come from a `schema { .. }` block when present, otherwise
/// from object types named `Query`, `Mutation` and `Subscription`.
/// `extend` definitions are merged into the types they extend.
///
/// # Errors
///
/// Returns [`SchemaError::Parse`] for syntax errors and a reference error
/// when a field, argument, interface or union member names an undefined
/// type.
pub fn build_ast_schema(sdl: &str) -> Result<Schema, SchemaError> {
    let document = ast::parse(sdl).into_result().map_err(SchemaError::Parse)?;

    let mut builder = SchemaBuilder::new();
    let mut description = None;
    let mut roots: Vec<(OperationType, String)> = Vec::new();
    let mut extensions = Vec::new();

    for definition in &document.definitions {
        match definition {
            Definition::Schema(schema_def) | Definition::SchemaExtension(schema_def) => {
                if let Some(desc) = &schema_def.description {
                    description = Some(desc.value.clone());
                }
                roots.extend(
                    schema_def
                        .operations
                        .iter()
                        .map(|op| (op.operation, op.type_name.value.to_string())),
                );
            }
            Definition::Type(type_def) => {
                let name = type_def.name().value;
                if builder.has_type(name) && !BUILTIN_SCALARS.contains(&name) {
                    return Err(SchemaError::DuplicateType(name.to_string()));
                }
                builder = builder.add_type(convert_type_definition(type_def));
            }
            Definition::TypeExtension(type_def) => extensions.push(type_def),
            Definition::Directive(directive) => {
                builder = builder.add_directive(convert_directive(directive));
            }
            Definition::Operation(_) | Definition::Fragment(_) => {
                tracing::debug!("ignoring executable definition in type definitions");
            }
        }
    }

    for extension in extensions {
        apply_extension(&mut builder, extension)?;
    }

    if roots.is_empty() {
        for (operation, name) in [
            (OperationType::Query, "Query"),
            (OperationType::Mutation, "Mutation"),
            (OperationType::Subscription, "Subscription"),
        ] {
            if builder.has_type(name) {
                roots.push((operation, name.to_string()));
            }
        }
    }
    for (operation, name) in roots {
        builder = match operation {
            OperationType::Query => builder.query_type(name),
            OperationType::Mutation => builder.mutation_type(name),
            OperationType::Subscription => builder.subscription_type(name),
        };
    }
    if let Some(description) = description {
        builder = builder.description(description);
    }

    let schema = builder.build();
    schema.check_references()?;
    Ok(schema)
}

fn description(desc: Option<&ast::Description>) -> Option<String> {
    desc.map(|d| d.value.clone())
}

/// Reads `@deprecated(reason: ..)` from a directive list.
fn deprecation(directives: &[ast::Directive<'_>]) -> (bool, Option<String>) {
    let Some(directive) = directives.iter().find(|d| d.name.value == "deprecated") else {
        return (false, None);
    };
    let reason = directive
        .arguments
        .iter()
        .find(|arg| arg.name.value == "reason")
        .and_then(|arg| match &arg.value {
            ast::Value::String(reason, _) => Some(reason.clone()),
            _ => None,
        })
        .unwrap_or_else(|| "No longer supported".to_string());
    (true, Some(reason))
}

fn convert_type_definition(def: &ast::TypeDefinition<'_>) -> TypeDef {
    match def {
        ast::TypeDefinition::Object(obj) => TypeDef::Object(ObjectDef {
            name: obj.name.value.to_string(),
            description: description(obj.description.as_ref()),
            fields: convert_fields(&obj.fields),
            implements: names(&obj.implements),
        }),
        ast::TypeDefinition::Interface(iface) => TypeDef::Interface(InterfaceDef {
            name: iface.name.value.to_string(),
            description: description(iface.description.as_ref()),
            fields: convert_fields(&iface.fields),
            implements: names(&iface.implements),
        }),
        ast::TypeDefinition::Union(union) => TypeDef::Union(UnionDef {
            name: union.name.value.to_string(),
            description: description(union.description.as_ref()),
            members: names(&union.members),
        }),
        ast::TypeDefinition::Enum(enum_def) => TypeDef::Enum(EnumDef {
            name: enum_def.name.value.to_string(),
            description: description(enum_def.description.as_ref()),
            values: convert_enum_values(&enum_def.values),
        }),
        ast::TypeDefinition::Input(input) => TypeDef::InputObject(InputObjectDef {
            name: input.name.value.to_string(),
            description: description(input.description.as_ref()),
            fields: convert_input_values(&input.fields),
        }),
        ast::TypeDefinition::Scalar(scalar) => TypeDef::Scalar(ScalarDef {
            name: scalar.name.value.to_string(),
            description: description(scalar.description.as_ref()),
        }),
    }
}

fn names(names: &[ast::Name<'_>]) -> Vec<String> {
    names.iter().map(|n| n.value.to_string()).collect()
}

fn convert_fields(fields: &[ast::FieldDefinition<'_>]) -> IndexMap<String, FieldDef> {
    fields
        .iter()
        .map(|field| {
            let (deprecated, deprecation_reason) = deprecation(&field.directives);
            let def = FieldDef {
                name: field.name.value.to_string(),
                description: description(field.description.as_ref()),
                ty: TypeRef::from_ast(&field.ty),
                arguments: convert_input_values(&field.arguments),
                deprecated,
                deprecation_reason,
            };
            (def.name.clone(), def)
        })
        .collect()
}

fn convert_input_values(values: &[ast::InputValueDefinition<'_>]) -> IndexMap<String, InputFieldDef> {
    values
        .iter()
        .map(|value| {
            let def = InputFieldDef {
                name: value.name.value.to_string(),
                description: description(value.description.as_ref()),
                ty: TypeRef::from_ast(&value.ty),
                default_value: value.default_value.as_ref().map(const_to_json),
            };
            (def.name.clone(), def)
        })
        .collect()
}

fn convert_enum_values(values: &[ast::EnumValueDefinition<'_>]) -> Vec<EnumValueDef> {
    values
        .iter()
        .map(|value| {
            let (deprecated, deprecation_reason) = deprecation(&value.directives);
            EnumValueDef {
                name: value.name.value.to_string(),
                description: description(value.description.as_ref()),
                deprecated,
                deprecation_reason,
            }
        })
        .collect()
}

fn convert_directive(directive: &ast::DirectiveDefinition<'_>) -> DirectiveDefinition {
    DirectiveDefinition {
        name: directive.name.value.to_string(),
        description: description(directive.description.as_ref()),
        arguments: convert_input_values(&directive.arguments),
        locations: directive.locations.clone(),
        repeatable: directive.repeatable,
    }
}

fn apply_extension(
    builder: &mut SchemaBuilder,
    extension: &ast::TypeDefinition<'_>,
) -> Result<(), SchemaError> {
    let name = extension.name().value;
    let invalid = || SchemaError::InvalidExtension(name.to_string());
    let target = builder.type_mut(name).ok_or_else(invalid)?;

    match (target, convert_type_definition(extension)) {
        (TypeDef::Object(target), TypeDef::Object(ext)) => {
            target.fields.extend(ext.fields);
            target.implements.extend(ext.implements);
        }
        (TypeDef::Interface(target), TypeDef::Interface(ext)) => {
            target.fields.extend(ext.fields);
            target.implements.extend(ext.implements);
        }
        (TypeDef::Union(target), TypeDef::Union(ext)) => target.members.extend(ext.members),
        (TypeDef::Enum(target), TypeDef::Enum(ext)) => target.values.extend(ext.values),
        (TypeDef::InputObject(target), TypeDef::InputObject(ext)) => {
            target.fields.extend(ext.fields);
        }
        (TypeDef::Scalar(_), TypeDef::Scalar(_)) => {}
        _ => return Err(invalid()),
    }
    Ok(())
}

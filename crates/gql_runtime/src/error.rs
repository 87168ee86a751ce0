//! Errors raised while building a schema.

use gql_core::Diagnostic;
use thiserror::Error;

/// An error building a [`Schema`](crate::Schema).
#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    /// The type definitions failed to parse.
    #[error("invalid type definitions: {}", first_title(.0))]
    Parse(Vec<Diagnostic>),

    /// A type reference names a type the schema does not define.
    #[error("unknown type `{name}` referenced by `{referenced_by}`")]
    UnknownType { name: String, referenced_by: String },

    /// A type is defined more than once.
    #[error("type `{0}` is defined more than once")]
    DuplicateType(String),

    /// An extension targets a type that is not defined, or of another kind.
    #[error("cannot extend type `{0}`")]
    InvalidExtension(String),

    /// A root operation type is not an object type.
    #[error("{operation} root type `{name}` must be an object type")]
    InvalidRoot {
        operation: &'static str,
        name: String,
    },

    /// An introspection result could not be read.
    #[error("invalid introspection result: {0}")]
    Introspection(String),
}

fn first_title(diagnostics: &[Diagnostic]) -> String {
    diagnostics.first().map_or_else(
        || "no definitions".to_string(),
        |d| match d.labels.first() {
            Some(label) => format!("{} ({})", d.title, label.message),
            None => d.title.clone(),
        },
    )
}

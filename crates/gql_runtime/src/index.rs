//! Scalar type resolution over a schema.
//!
//! Given a path of response keys from a root operation type, these lookups
//! find the declared type of the terminal field and report its name when it
//! is a scalar. They never fail: an unresolvable path simply has no scalar
//! type, which callers treat as "leave the value alone".

use crate::schema::{FieldDef, Schema, TypeDef};
use gql_syntax::OperationType;

const ROOT_ORDER: [OperationType; 3] = [
    OperationType::Query,
    OperationType::Mutation,
    OperationType::Subscription,
];

impl Schema {
    /// Returns the scalar name of a field's type, if it is a scalar.
    ///
    /// List and non-null wrappers are unwrapped first, so `[DateTime!]`
    /// yields `DateTime`. Built-in scalars are reported like any other.
    #[must_use]
    pub fn scalar_type_name(&self, field: &FieldDef) -> Option<&str> {
        match self.get_type(field.ty.named_type())? {
            TypeDef::Scalar(scalar) => Some(&scalar.name),
            _ => None,
        }
    }

    /// Resolves the scalar type reached by following `path` from a root.
    ///
    /// The root is the first of the query, mutation and subscription types
    /// that declares `path[0]`. Each further key is looked up on the named
    /// type of the previous field, which must be an object or interface.
    ///
    /// ```
    /// # use gql_runtime::build_ast_schema;
    /// let schema = build_ast_schema(
    ///     "scalar DateTime type Query { film: Film } type Film { releaseDate: DateTime }",
    /// )
    /// .unwrap();
    /// assert_eq!(schema.lookup_scalar_type(&["film", "releaseDate"]), Some("DateTime"));
    /// assert_eq!(schema.lookup_scalar_type(&["film"]), None);
    /// ```
    #[must_use]
    pub fn lookup_scalar_type<S: AsRef<str>>(&self, path: &[S]) -> Option<&str> {
        let (first, rest) = path.split_first()?;
        let first = first.as_ref();

        let root = ROOT_ORDER.iter().find_map(|&operation| {
            self.root_type(operation)
                .filter(|root| root.fields().is_some_and(|f| f.contains_key(first)))
        })?;

        let mut field = root.fields()?.get(first)?;
        for key in rest {
            let parent = self.get_type(field.ty.named_type())?;
            field = parent.fields()?.get(key.as_ref())?;
        }

        self.scalar_type_name(field)
    }
}

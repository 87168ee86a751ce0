//! Custom scalar conversion over response data.
//!
//! The adapter walks a response tree alongside the schema. Every leaf whose
//! field path resolves to a registered scalar is passed through that
//! scalar's converter; everything else is copied unchanged. Lists are
//! transparent: elements share their list field's path.

use crate::scalars::{ScalarError, ScalarRegistry};
use gql_runtime::Schema;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Applies registered scalar converters to response data.
#[derive(Debug, Clone)]
pub struct TypeAdapter {
    schema: Arc<Schema>,
    scalars: ScalarRegistry,
}

impl TypeAdapter {
    pub fn new(schema: Arc<Schema>, scalars: ScalarRegistry) -> Self {
        Self { schema, scalars }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn scalars(&self) -> &ScalarRegistry {
        &self.scalars
    }

    /// Returns a converted copy of `response`.
    ///
    /// The input is never modified and the output has the same shape. The
    /// first converter failure aborts the walk.
    pub fn convert_scalars(&self, response: &Value) -> Result<Value, ScalarError> {
        if self.scalars.is_empty() {
            return Ok(response.clone());
        }
        let mut path = Vec::new();
        self.convert(response, &mut path)
    }

    fn convert<'v>(&self, value: &'v Value, path: &mut Vec<&'v str>) -> Result<Value, ScalarError> {
        match value {
            Value::Object(fields) => {
                let mut converted = Map::new();
                for (key, child) in fields {
                    path.push(key);
                    let result = self.convert(child, path);
                    path.pop();
                    converted.insert(key.clone(), result?);
                }
                Ok(Value::Object(converted))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.convert(item, path))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            leaf => self.convert_leaf(leaf, path),
        }
    }

    fn convert_leaf(&self, leaf: &Value, path: &[&str]) -> Result<Value, ScalarError> {
        let Some(name) = self.schema.lookup_scalar_type(path) else {
            return Ok(leaf.clone());
        };
        match self.scalars.get(name) {
            Some(scalar) => scalar
                .parse_value(leaf)
                .map_err(|err| err.with_scalar(name)),
            None => Ok(leaf.clone()),
        }
    }
}

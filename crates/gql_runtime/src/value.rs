//! Conversions between document literals and JSON values.

use gql_syntax::Value as AstValue;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;

/// Converts a literal to JSON, substituting variables.
///
/// Enum values become strings. Undefined variables become `null`.
#[must_use]
pub fn to_json(value: &AstValue<'_>, variables: &HashMap<String, Value>) -> Value {
    match value {
        AstValue::Variable(name) => variables.get(name.value).cloned().unwrap_or(Value::Null),
        AstValue::Int(i, _) => Value::from(*i),
        AstValue::Float(f, _) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        AstValue::String(s, _) => Value::String(s.clone()),
        AstValue::Boolean(b, _) => Value::Bool(*b),
        AstValue::Null(_) => Value::Null,
        AstValue::Enum(name) => Value::String(name.value.to_string()),
        AstValue::List(items, _) => {
            Value::Array(items.iter().map(|item| to_json(item, variables)).collect())
        }
        AstValue::Object(fields, _) => Value::Object(
            fields
                .iter()
                .map(|(name, value)| (name.value.to_string(), to_json(value, variables)))
                .collect::<Map<_, _>>(),
        ),
    }
}

/// Converts a constant literal to JSON.
#[must_use]
pub fn const_to_json(value: &AstValue<'_>) -> Value {
    to_json(value, &HashMap::new())
}

/// Prints a JSON value as a GraphQL literal.
///
/// Strings for which `is_enum` returns true are printed bare.
pub fn print_literal(value: &Value, is_enum: &dyn Fn(&str) -> bool) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if is_enum(s) => s.clone(),
        Value::String(s) => Value::String(s.clone()).to_string(),
        Value::Array(items) => {
            let items: Vec<_> = items.iter().map(|v| print_literal(v, is_enum)).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(fields) => {
            let fields: Vec<_> = fields
                .iter()
                .map(|(k, v)| format!("{k}: {}", print_literal(v, is_enum)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
    }
}

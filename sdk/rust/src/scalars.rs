//! Custom scalar converters.
//!
//! A [`CustomScalar`] turns the raw JSON a server sends for a scalar into the
//! value the application wants to see. Converters are registered by scalar
//! name in a [`ScalarRegistry`].

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A converter failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScalarError {
    pub message: String,
    /// The scalar being converted, filled in by the adapter.
    pub scalar: Option<String>,
}

impl ScalarError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            scalar: None,
        }
    }

    #[must_use]
    pub fn with_scalar(mut self, scalar: impl Into<String>) -> Self {
        self.scalar = Some(scalar.into());
        self
    }
}

/// Converts raw response values of one scalar type.
pub trait CustomScalar: Send + Sync {
    fn parse_value(&self, value: &Value) -> Result<Value, ScalarError>;
}

impl<F> CustomScalar for F
where
    F: Fn(&Value) -> Result<Value, ScalarError> + Send + Sync,
{
    fn parse_value(&self, value: &Value) -> Result<Value, ScalarError> {
        self(value)
    }
}

/// Converters keyed by scalar type name. Immutable once built.
#[derive(Clone, Default)]
pub struct ScalarRegistry {
    scalars: FxHashMap<String, Arc<dyn CustomScalar>>,
}

impl ScalarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ScalarRegistryBuilder {
        ScalarRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&dyn CustomScalar> {
        self.scalars.get(name).map(|scalar| scalar.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scalars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.scalars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty()
    }
}

impl fmt::Debug for ScalarRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("ScalarRegistry").field("scalars", &names).finish()
    }
}

/// Builder for [`ScalarRegistry`].
#[derive(Default)]
pub struct ScalarRegistryBuilder {
    scalars: FxHashMap<String, Arc<dyn CustomScalar>>,
}

impl ScalarRegistryBuilder {
    /// Registers a converter, replacing any previous one for `name`.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, scalar: impl CustomScalar + 'static) -> Self {
        self.scalars.insert(name.into(), Arc::new(scalar));
        self
    }

    /// Registers a closure as a converter.
    #[must_use]
    pub fn register_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, ScalarError> + Send + Sync + 'static,
    {
        self.register(name, f)
    }

    pub(crate) fn insert(&mut self, name: String, scalar: Arc<dyn CustomScalar>) {
        self.scalars.insert(name, scalar);
    }

    pub(crate) fn extend(&mut self, registry: ScalarRegistry) {
        self.scalars.extend(registry.scalars);
    }

    pub fn build(self) -> ScalarRegistry {
        ScalarRegistry {
            scalars: self.scalars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Cents;

    impl CustomScalar for Cents {
        fn parse_value(&self, value: &Value) -> Result<Value, ScalarError> {
            value
                .as_f64()
                .map(|dollars| json!((dollars * 100.0).round() as i64))
                .ok_or_else(|| ScalarError::new(format!("expected a number, got {value}")))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ScalarRegistry::builder()
            .register("Money", Cents)
            .register_fn("Upper", |v| Ok(json!(v.as_str().unwrap_or_default().to_uppercase())))
            .build();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("Money"));
        assert!(registry.get("DateTime").is_none());

        let money = registry.get("Money").expect("registered");
        assert_eq!(money.parse_value(&json!(12.5)), Ok(json!(1250)));
        assert_eq!(
            money.parse_value(&json!("12")),
            Err(ScalarError::new("expected a number, got \"12\""))
        );
        let upper = registry.get("Upper").expect("registered");
        assert_eq!(upper.parse_value(&json!("abc")), Ok(json!("ABC")));
    }

    #[test]
    fn test_later_registration_wins() {
        let registry = ScalarRegistry::builder()
            .register_fn("Flag", |_| Ok(json!(1)))
            .register_fn("Flag", |_| Ok(json!(2)))
            .build();
        let flag = registry.get("Flag").expect("registered");
        assert_eq!(flag.parse_value(&Value::Null), Ok(json!(2)));
        assert_eq!(format!("{registry:?}"), "ScalarRegistry { scalars: [\"Flag\"] }");
    }
}

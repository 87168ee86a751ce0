//! Typed errors for the gql client.
//!
//! Every failure surfaced by the client is a [`GqlError`] carrying an
//! [`ErrorCode`], a message, an optional cause and structured extensions.

use crate::scalars::ScalarError;
use gql_runtime::{FieldError, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Classification of client errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Network errors
    NetworkError,
    Timeout,
    ConnectionRefused,

    // Protocol errors
    HttpError,
    HttpsNotSupported,
    InvalidUrl,
    InvalidResponse,

    // Document errors
    SyntaxError,
    ValidationError,

    // Execution errors
    ServerError,
    RetryExhausted,
    ScalarParseError,

    // Schema and setup errors
    SchemaError,
    NoSchema,
    NoTransport,
    InvalidConfiguration,

    // Serialization errors
    SerializeError,
    DeserializeError,

    InternalError,
}

impl ErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::HttpError => "HTTP_ERROR",
            Self::HttpsNotSupported => "HTTPS_NOT_SUPPORTED",
            Self::InvalidUrl => "INVALID_URL",
            Self::InvalidResponse => "INVALID_RESPONSE",
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::ScalarParseError => "SCALAR_PARSE_ERROR",
            Self::SchemaError => "SCHEMA_ERROR",
            Self::NoSchema => "NO_SCHEMA",
            Self::NoTransport => "NO_TRANSPORT",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::SerializeError => "SERIALIZE_ERROR",
            Self::DeserializeError => "DESERIALIZE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true for transient network failures.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::Timeout | Self::ConnectionRefused
        )
    }

    /// Returns true for errors caused by the caller's input or setup.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::SyntaxError
                | Self::ValidationError
                | Self::InvalidUrl
                | Self::HttpsNotSupported
                | Self::NoSchema
                | Self::NoTransport
                | Self::InvalidConfiguration
        )
    }

    /// Returns true for errors reported by the server.
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::ServerError | Self::HttpError | Self::InternalError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client error.
#[derive(Error, Debug, Clone)]
#[error("[{code}] {message}")]
pub struct GqlError {
    pub code: ErrorCode,
    pub message: String,
    /// The error this one wraps, e.g. the last attempt of a retried request.
    #[source]
    pub source: Option<Box<GqlError>>,
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

impl GqlError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            extensions: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: GqlError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let extensions = self.extensions.get_or_insert_with(HashMap::new);
        if let Ok(v) = serde_json::to_value(value) {
            extensions.insert(key.into(), v);
        }
        self
    }

    /// Returns an extension value, if set.
    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.extensions.as_ref()?.get(key)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "Request timed out")
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SyntaxError, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfiguration, message)
    }

    pub fn serialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializeError, message)
    }

    pub fn deserialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeserializeError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.code.is_server_error()
    }
}

impl Serialize for GqlError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("GqlError", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(ref ext) = self.extensions {
            state.serialize_field("extensions", ext)?;
        }
        state.end()
    }
}

impl From<SchemaError> for GqlError {
    fn from(error: SchemaError) -> Self {
        Self::new(ErrorCode::SchemaError, error.to_string())
    }
}

impl From<ScalarError> for GqlError {
    fn from(error: ScalarError) -> Self {
        let err = Self::new(ErrorCode::ScalarParseError, error.message);
        match error.scalar {
            Some(scalar) => err.with_extension("scalar", scalar),
            None => err,
        }
    }
}

/// A GraphQL error returned by the server.
impl From<FieldError> for GqlError {
    fn from(error: FieldError) -> Self {
        let mut err = Self::new(ErrorCode::ServerError, error.message);
        if let Some(path) = error.path {
            err = err.with_extension("path", path);
        }
        if let Some(locations) = error.locations {
            err = err.with_extension("locations", locations);
        }
        if let Some(extensions) = error.extensions {
            err = err.with_extension("extensions", extensions);
        }
        err
    }
}

pub type GqlResult<T> = std::result::Result<T, GqlError>;

/// Converts foreign errors into [`GqlError`].
pub trait IntoGqlError {
    fn into_gql_error(self, code: ErrorCode) -> GqlError;
}

impl<E: std::error::Error> IntoGqlError for E {
    fn into_gql_error(self, code: ErrorCode) -> GqlError {
        GqlError::new(code, self.to_string())
    }
}

/// Maps the error of a `Result` into a [`GqlError`].
pub trait ResultExt<T> {
    fn map_gql_err(self, code: ErrorCode) -> GqlResult<T>;

    /// Uses `message` and keeps the original error text as the
    /// `original_error` extension.
    fn map_gql_err_with(self, code: ErrorCode, message: impl Into<String>) -> GqlResult<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn map_gql_err(self, code: ErrorCode) -> GqlResult<T> {
        self.map_err(|e| e.into_gql_error(code))
    }

    fn map_gql_err_with(self, code: ErrorCode, message: impl Into<String>) -> GqlResult<T> {
        self.map_err(|e| GqlError::new(code, message).with_extension("original_error", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gql_runtime::PathSegment;

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::Timeout.is_retryable());
        assert!(!ErrorCode::SyntaxError.is_retryable());

        assert!(ErrorCode::ValidationError.is_client_error());
        assert!(!ErrorCode::ServerError.is_client_error());

        assert!(ErrorCode::ServerError.is_server_error());
        assert!(!ErrorCode::NoSchema.is_server_error());
    }

    #[test]
    fn test_error_display_and_serialization() {
        let err = GqlError::new(ErrorCode::NoSchema, "no schema").with_extension("hint", "pass one");
        assert_eq!(err.to_string(), "[NO_SCHEMA] no schema");
        assert_eq!(
            serde_json::to_value(&err).expect("serializable"),
            serde_json::json!({
                "code": "NO_SCHEMA",
                "message": "no schema",
                "extensions": {"hint": "pass one"}
            })
        );
    }

    #[test]
    fn test_source_chain() {
        let err = GqlError::new(ErrorCode::RetryExhausted, "Failed 2 retries: [TIMEOUT] Request timed out")
            .with_source(GqlError::timeout());
        let source = std::error::Error::source(&err).expect("source");
        assert_eq!(source.to_string(), "[TIMEOUT] Request timed out");
    }

    #[test]
    fn test_from_field_error() {
        let err: GqlError = FieldError::new("Film not found")
            .with_path(vec![PathSegment::Field("film".into())])
            .into();
        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(err.message, "Film not found");
        assert_eq!(err.extension("path"), Some(&serde_json::json!(["film"])));
    }

    #[test]
    fn test_from_scalar_error() {
        let err: GqlError = ScalarError::new("not a date").with_scalar("DateTime").into();
        assert_eq!(err.code, ErrorCode::ScalarParseError);
        assert_eq!(err.message, "not a date");
        assert_eq!(err.extension("scalar"), Some(&serde_json::json!("DateTime")));
    }

    #[test]
    fn test_result_ext() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        let err = result.map_gql_err(ErrorCode::InternalError).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.message, "file not found");
    }
}

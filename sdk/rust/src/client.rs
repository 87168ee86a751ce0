//! The gql client.
//!
//! A [`Client`] validates documents against its schema (when it has one),
//! sends them through a [`Transport`] with retries, and converts custom
//! scalars in the returned data.
//!
//! ```ignore
//! use gql_client::{Client, HttpTransport};
//!
//! let client = Client::builder()
//!     .transport(HttpTransport::new("http://localhost:4000/graphql")?)
//!     .fetch_schema_from_transport(true)
//!     .custom_scalar("DateTime", |v: &Value| parse_date(v))
//!     .build()
//!     .await?;
//!
//! let data = client.execute("{ film(id: \"1\") { releaseDate } }").await?;
//! ```

use crate::error::{ErrorCode, GqlError, GqlResult, ResultExt};
use crate::scalars::{CustomScalar, ScalarRegistry, ScalarRegistryBuilder};
use crate::transport::{LocalSchemaTransport, Request, Response, Transport};
use crate::type_adapter::TypeAdapter;
use gql_core::{Diagnostic, LineIndex};
use gql_runtime::{build_ast_schema, build_client_schema, Schema, INTROSPECTION_QUERY};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Attempts per request. `0` sends once and returns transport errors
    /// unchanged; `n` makes up to `n` attempts.
    pub retries: u32,
    /// Back-off before the second attempt, doubled for each later one.
    pub retry_delay: Duration,
    /// Build the schema from an introspection query sent at build time.
    pub fetch_schema_from_transport: bool,
}

/// A GraphQL client.
#[derive(Clone)]
pub struct Client {
    schema: Option<Arc<Schema>>,
    introspection: Option<Value>,
    transport: Arc<dyn Transport>,
    adapter: Option<TypeAdapter>,
    config: ClientConfig,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("has_schema", &self.schema.is_some())
            .field("adapter", &self.adapter.as_ref().map(TypeAdapter::scalars))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_deref()
    }

    /// Returns the introspection result the schema was built from, or one
    /// generated from the schema.
    pub fn introspection(&self) -> Option<Value> {
        self.introspection
            .clone()
            .or_else(|| self.schema.as_ref().map(|schema| schema.to_introspection()))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validates a document against the client's schema.
    pub fn validate(&self, query: &str) -> GqlResult<()> {
        match &self.schema {
            Some(schema) => validate_document(schema, query),
            None => Err(GqlError::new(
                ErrorCode::NoSchema,
                "Cannot validate locally the document, you need to pass a schema.",
            )),
        }
    }

    /// Executes a document and returns its `data`.
    pub async fn execute(&self, query: &str) -> GqlResult<Value> {
        self.execute_request(Request::new(query)).await
    }

    /// Executes a request and returns its `data` with custom scalars
    /// converted.
    ///
    /// The first GraphQL error of the response is raised as a
    /// [`ErrorCode::ServerError`]; all of them are attached as the `errors`
    /// extension.
    pub async fn execute_request(&self, request: Request) -> GqlResult<Value> {
        if let Some(schema) = &self.schema {
            validate_document(schema, &request.query)?;
        }

        debug!(operation = ?request.operation_name, "executing request");
        let response = send(self.transport.as_ref(), &request, &self.config).await?;
        let data = into_data(response)?;

        match &self.adapter {
            Some(adapter) => Ok(adapter.convert_scalars(&data)?),
            None => Ok(data),
        }
    }

    /// Executes a document and deserializes its `data`.
    pub async fn execute_as<T: DeserializeOwned>(&self, query: &str) -> GqlResult<T> {
        let data = self.execute(query).await?;
        serde_json::from_value(data).map_gql_err(ErrorCode::DeserializeError)
    }
}

/// Builder for [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    schema: Option<Schema>,
    introspection: Option<Value>,
    type_defs: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    config: ClientConfig,
    scalars: ScalarRegistryBuilder,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("has_schema", &self.schema.is_some())
            .field("has_introspection", &self.introspection.is_some())
            .field("has_type_defs", &self.type_defs.is_some())
            .field("has_transport", &self.transport.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    #[must_use]
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Builds the schema from an introspection result.
    #[must_use]
    pub fn introspection(mut self, introspection: Value) -> Self {
        self.introspection = Some(introspection);
        self
    }

    /// Builds the schema from SDL type definitions.
    #[must_use]
    pub fn type_defs(mut self, type_defs: impl Into<String>) -> Self {
        self.type_defs = Some(type_defs.into());
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    #[must_use]
    pub fn fetch_schema_from_transport(mut self, fetch: bool) -> Self {
        self.config.fetch_schema_from_transport = fetch;
        self
    }

    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    #[must_use]
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn custom_scalar(mut self, name: impl Into<String>, scalar: impl CustomScalar + 'static) -> Self {
        self.scalars.insert(name.into(), Arc::new(scalar));
        self
    }

    /// Adds every converter of `registry`.
    #[must_use]
    pub fn custom_scalars(mut self, registry: ScalarRegistry) -> Self {
        self.scalars.extend(registry);
        self
    }

    /// Builds the client, fetching the schema first when configured to.
    pub async fn build(self) -> GqlResult<Client> {
        let Self {
            schema,
            mut introspection,
            type_defs,
            transport,
            config,
            scalars,
        } = self;

        if introspection.is_some() && type_defs.is_some() {
            return Err(GqlError::configuration(
                "Cannot provide both introspection and type definitions.",
            ));
        }
        if schema.is_some() && (introspection.is_some() || type_defs.is_some()) {
            return Err(GqlError::configuration(
                "Cannot provide introspection or type definitions together with a schema.",
            ));
        }
        if config.fetch_schema_from_transport {
            if transport.is_none() {
                return Err(GqlError::configuration(
                    "Fetching the schema from the transport requires a transport.",
                ));
            }
            if schema.is_some() || introspection.is_some() || type_defs.is_some() {
                return Err(GqlError::configuration(
                    "Cannot fetch the schema from the transport when a schema is provided.",
                ));
            }
        }

        let mut schema = match (schema, &introspection, type_defs) {
            (Some(schema), _, _) => Some(schema),
            (None, Some(introspection), _) => Some(build_client_schema(introspection)?),
            (None, None, Some(type_defs)) => Some(build_ast_schema(&type_defs)?),
            (None, None, None) => None,
        };

        if let (Some(transport), true) = (&transport, config.fetch_schema_from_transport) {
            debug!("fetching schema from transport");
            let response = send(transport.as_ref(), &Request::new(INTROSPECTION_QUERY), &config).await?;
            let data = into_data(response)?;
            schema = Some(build_client_schema(&data)?);
            introspection = Some(data);
        }

        let schema = schema.map(Arc::new);
        if let Some(schema) = &schema {
            debug!(types = schema.types.len(), "schema ready");
        }

        let transport: Arc<dyn Transport> = match (transport, &schema) {
            (Some(transport), _) => transport,
            (None, Some(schema)) => Arc::new(LocalSchemaTransport::new(Arc::clone(schema))),
            (None, None) => {
                return Err(GqlError::new(
                    ErrorCode::NoTransport,
                    "A transport or a schema is required.",
                ))
            }
        };

        let scalars = scalars.build();
        let adapter = match &schema {
            _ if scalars.is_empty() => None,
            Some(schema) => Some(TypeAdapter::new(Arc::clone(schema), scalars)),
            None => {
                return Err(GqlError::configuration(
                    "Custom scalars require a schema to locate scalar fields.",
                ))
            }
        };

        Ok(Client {
            schema,
            introspection,
            transport,
            adapter,
            config,
        })
    }
}

/// Sends a request, retrying failed attempts per `config`.
async fn send(transport: &dyn Transport, request: &Request, config: &ClientConfig) -> GqlResult<Response> {
    if config.retries == 0 {
        return transport.execute(request).await;
    }

    let mut attempt = 1;
    loop {
        let err = match transport.execute(request).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };
        warn!(attempt, retries = config.retries, error = %err, "request attempt failed");

        if attempt >= config.retries {
            return Err(GqlError::new(
                ErrorCode::RetryExhausted,
                format!("Failed {} retries: {err}", config.retries),
            )
            .with_source(err));
        }

        let delay = config
            .retry_delay
            .saturating_mul(2u32.saturating_pow(attempt - 1));
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Raises the first GraphQL error, otherwise returns `data`.
fn into_data(response: Response) -> GqlResult<Value> {
    match response.errors {
        Some(errors) if !errors.is_empty() => {
            let all = serde_json::to_value(&errors).unwrap_or(Value::Null);
            let first = errors.into_iter().next().map(GqlError::from);
            Err(first
                .unwrap_or_else(|| GqlError::internal("empty error list"))
                .with_extension("errors", all))
        }
        _ => Ok(response.data.unwrap_or(Value::Null)),
    }
}

fn validate_document(schema: &Schema, query: &str) -> GqlResult<()> {
    let line_index = LineIndex::new(query);
    let document = gql_syntax::parse(query)
        .into_result()
        .map_err(|diagnostics| syntax_error(&diagnostics, &line_index))?;

    let errors = gql_runtime::validate(schema, &document);
    let Some(first) = errors.first() else {
        return Ok(());
    };
    let all: Vec<Value> = errors
        .iter()
        .map(|error| {
            json!({
                "message": error.message,
                "locations": [line_index.location(error.span.start)],
            })
        })
        .collect();
    Err(GqlError::validation(first.message.clone())
        .with_extension("locations", [line_index.location(first.span.start)])
        .with_extension("errors", all))
}

fn syntax_error(diagnostics: &[Diagnostic], line_index: &LineIndex) -> GqlError {
    let Some(first) = diagnostics.first() else {
        return GqlError::syntax("Syntax Error");
    };
    let message = match first.labels.first() {
        Some(label) => format!("Syntax Error: {} ({})", first.title, label.message),
        None => format!("Syntax Error: {}", first.title),
    };
    let error = GqlError::syntax(message);
    match first.primary_span() {
        Some(span) => error.with_extension("locations", [line_index.location(span.start)]),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails a fixed number of times, then answers with `data`.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for Flaky {
        async fn execute(&self, _request: &Request) -> GqlResult<Response> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(GqlError::network(format!("attempt {call} failed")))
            } else {
                Ok(Response::data(json!({"ok": true})))
            }
        }
    }

    fn config(retries: u32) -> ClientConfig {
        ClientConfig {
            retries,
            ..ClientConfig::default()
        }
    }

    #[tokio::test]
    async fn test_no_retries_returns_error_unchanged() {
        let transport = Flaky::new(1);
        let err = send(transport.as_ref(), &Request::new("{ ok }"), &config(0))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NetworkError);
        assert_eq!(err.message, "attempt 1 failed");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let transport = Flaky::new(2);
        let response = send(transport.as_ref(), &Request::new("{ ok }"), &config(3))
            .await
            .expect("third attempt succeeds");
        assert_eq!(response.data, Some(json!({"ok": true})));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let transport = Flaky::new(5);
        let err = send(transport.as_ref(), &Request::new("{ ok }"), &config(2))
            .await
            .unwrap_err();
        assert_eq!(transport.calls(), 2);
        assert_eq!(err.code, ErrorCode::RetryExhausted);
        insta::assert_snapshot!(err.message, @"Failed 2 retries: [NETWORK_ERROR] attempt 2 failed");
        let source = err.source.expect("last error");
        assert_eq!(source.message, "attempt 2 failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles() {
        let transport = Flaky::new(3);
        let config = ClientConfig {
            retries: 4,
            retry_delay: Duration::from_millis(100),
            ..ClientConfig::default()
        };
        let start = tokio::time::Instant::now();
        send(transport.as_ref(), &Request::new("{ ok }"), &config)
            .await
            .expect("fourth attempt succeeds");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(800), "{elapsed:?}");
    }

    #[test]
    fn test_into_data() {
        assert_eq!(into_data(Response::default()).expect("no errors"), Value::Null);
        assert_eq!(
            into_data(Response::data(json!({"a": 1}))).expect("no errors"),
            json!({"a": 1})
        );

        let response: Response = serde_json::from_value(json!({
            "data": {"film": null},
            "errors": [
                {"message": "Film not found", "path": ["film"]},
                {"message": "Rate limited"}
            ]
        }))
        .expect("response");
        let err = into_data(response).unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(err.message, "Film not found");
        assert_eq!(err.extension("path"), Some(&json!(["film"])));
        assert_eq!(err.extension("errors").and_then(Value::as_array).map(Vec::len), Some(2));
    }
}

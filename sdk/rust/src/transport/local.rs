//! In-process execution against a schema.

use super::{Request, Response, Transport};
use crate::error::GqlResult;
use async_trait::async_trait;
use gql_runtime::{Context, Executor, ResolverMap, Schema};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Executes requests against a local [`Schema`].
///
/// Without resolvers every field is read from its parent value, starting
/// from the root value (`null` by default).
#[derive(Debug)]
pub struct LocalSchemaTransport {
    schema: Arc<Schema>,
    executor: Executor,
    root_value: Value,
}

impl LocalSchemaTransport {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            executor: Executor::new(),
            root_value: Value::Null,
        }
    }

    #[must_use]
    pub fn with_resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.executor = Executor::with_resolvers(resolvers);
        self
    }

    #[must_use]
    pub fn with_root_value(mut self, root_value: Value) -> Self {
        self.root_value = root_value;
        self
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[async_trait]
impl Transport for LocalSchemaTransport {
    async fn execute(&self, request: &Request) -> GqlResult<Response> {
        debug!(operation = ?request.operation_name, "executing locally");
        let variables = request
            .variables
            .clone()
            .map(|vars| vars.into_iter().collect())
            .unwrap_or_default();
        let ctx = Context::with_variables(variables);

        Ok(self
            .executor
            .execute(
                &self.schema,
                &request.query,
                request.operation_name.as_deref(),
                &ctx,
                &self.root_value,
            )
            .await)
    }
}

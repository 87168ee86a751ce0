//! Transports that carry GraphQL requests to an executor.
//!
//! - [`HttpTransport`]: POSTs JSON to a GraphQL endpoint over HTTP/1.1
//! - [`LocalSchemaTransport`]: executes in-process against a [`Schema`]
//!
//! [`Schema`]: gql_runtime::Schema

mod http;
mod local;

pub use http::{HttpTransport, HttpTransportConfig};
pub use local::LocalSchemaTransport;

pub use gql_runtime::{FieldError, PathSegment, Response};

use crate::error::GqlResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Sends a request and returns the GraphQL response.
///
/// A response carrying GraphQL `errors` is a successful send; only failures
/// to obtain a response are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &Request) -> GqlResult<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: &Request) -> GqlResult<Response> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn execute(&self, request: &Request) -> GqlResult<Response> {
        (**self).execute(request).await
    }
}

/// A GraphQL request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Extra HTTP headers for this request only.
    #[serde(skip)]
    pub headers: HashMap<String, String>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Sets one variable.
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables
            .get_or_insert_with(Map::new)
            .insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = Request::new("query Film($id: ID!) { film(id: $id) { title } }")
            .variable("id", "1")
            .operation_name("Film")
            .header("Authorization", "Bearer token");

        assert_eq!(
            serde_json::to_value(&request).expect("serializable"),
            json!({
                "query": "query Film($id: ID!) { film(id: $id) { title } }",
                "variables": {"id": "1"},
                "operationName": "Film"
            })
        );
    }

    #[test]
    fn test_minimal_request_omits_optional_members() {
        let body = serde_json::to_value(Request::new("{ film { title } }")).expect("serializable");
        assert_eq!(body, json!({"query": "{ film { title } }"}));
    }
}

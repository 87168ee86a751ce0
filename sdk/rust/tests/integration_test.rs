//! Integration tests for gql_client

use async_trait::async_trait;
use gql_client::{
    build_ast_schema, build_client_schema, Client, ErrorCode, GqlError, GqlResult,
    LocalSchemaTransport, Request, ResolverMap, Response, ScalarError, ScalarRegistry, Schema,
    Transport, INTROSPECTION_QUERY,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STAR_WARS: &str = r#"
    scalar DateTime

    type Query {
        film(id: ID): Film
        allFilms: FilmConnection
        hero: Hero
    }

    type Mutation {
        createHero(name: String!): CreateHeroPayload
    }

    type Film {
        id: ID!
        title: String
        releaseDate: DateTime
        species: [Species]
    }

    type Species { name: String }
    type FilmConnection { edges: [FilmEdge] }
    type FilmEdge { node: Film }
    type Hero { name: String }
    type CreateHeroPayload { hero: Hero ok: Boolean }
"#;

fn star_wars() -> Schema {
    build_ast_schema(STAR_WARS).expect("valid schema")
}

fn root_value() -> Value {
    json!({
        "film": {"id": "some_id", "title": "A New Hope", "releaseDate": "some_datetime"},
        "allFilms": {
            "edges": [
                {"node": {"id": "1", "releaseDate": "some_datetime"}},
                {"node": {"id": "2", "releaseDate": "some_other_datetime"}}
            ]
        },
        "hero": {"name": "luke"}
    })
}

fn capitalize(value: &Value) -> Result<Value, ScalarError> {
    value
        .as_str()
        .map(|s| Value::String(s.to_uppercase()))
        .ok_or_else(|| ScalarError::new(format!("not a string: {value}")))
}

async fn local_client() -> Client {
    let schema = Arc::new(star_wars());
    Client::builder()
        .schema(star_wars())
        .transport(LocalSchemaTransport::new(schema).with_root_value(root_value()))
        .custom_scalar("DateTime", capitalize)
        .build()
        .await
        .expect("client")
}

/// Counts requests and answers from a fixed script.
struct Scripted {
    responses: Vec<GqlResult<Response>>,
    calls: AtomicU32,
}

impl Scripted {
    fn new(responses: Vec<GqlResult<Response>>) -> Arc<Self> {
        Arc::new(Self {
            responses,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for Scripted {
    async fn execute(&self, _request: &Request) -> GqlResult<Response> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        let index = call.min(self.responses.len() - 1);
        self.responses[index].clone()
    }
}

#[tokio::test]
async fn test_end_to_end_scalar_conversion() {
    let client = local_client().await;

    let data = client
        .execute("{ film(id: \"some_id\") { id releaseDate } }")
        .await
        .expect("data");

    assert_eq!(
        data,
        json!({"film": {"id": "some_id", "releaseDate": "SOME_DATETIME"}})
    );
}

#[tokio::test]
async fn test_end_to_end_list_conversion() {
    let client = local_client().await;

    let data = client
        .execute("{ allFilms { edges { node { id releaseDate } } } }")
        .await
        .expect("data");

    assert_eq!(
        data,
        json!({
            "allFilms": {
                "edges": [
                    {"node": {"id": "1", "releaseDate": "SOME_DATETIME"}},
                    {"node": {"id": "2", "releaseDate": "SOME_OTHER_DATETIME"}}
                ]
            }
        })
    );
}

#[tokio::test]
async fn test_without_scalars_data_is_unchanged() {
    let client = Client::builder()
        .schema(star_wars())
        .transport(LocalSchemaTransport::new(Arc::new(star_wars())).with_root_value(root_value()))
        .build()
        .await
        .expect("client");

    let data = client.execute("{ film { releaseDate } hero { name } }").await.expect("data");
    assert_eq!(
        data,
        json!({"film": {"releaseDate": "some_datetime"}, "hero": {"name": "luke"}})
    );
}

#[tokio::test]
async fn test_execute_as() {
    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Film {
        title: String,
        release_date: String,
    }

    #[derive(Debug, Deserialize)]
    struct Data {
        film: Film,
    }

    let data: Data = local_client()
        .await
        .execute_as("{ film { title releaseDate } }")
        .await
        .expect("typed data");
    assert_eq!(
        data.film,
        Film {
            title: "A New Hope".into(),
            release_date: "SOME_DATETIME".into()
        }
    );
}

#[tokio::test]
async fn test_converter_failure_is_scalar_parse_error() {
    let schema = Arc::new(star_wars());
    let client = Client::builder()
        .schema(star_wars())
        .transport(
            LocalSchemaTransport::new(schema).with_root_value(json!({"film": {"releaseDate": 1977}})),
        )
        .custom_scalar("DateTime", capitalize)
        .build()
        .await
        .expect("client");

    let err = client.execute("{ film { releaseDate } }").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ScalarParseError);
    assert_eq!(err.message, "not a string: 1977");
    assert_eq!(err.extension("scalar"), Some(&json!("DateTime")));
}

#[tokio::test]
async fn test_schema_only_client_executes_locally() {
    let client = Client::builder()
        .type_defs("type Query { version: String }")
        .build()
        .await
        .expect("client");

    // No resolvers and a null root: every root field is null.
    assert_eq!(
        client.execute("{ version }").await.expect("data"),
        json!({"version": null})
    );
}

#[tokio::test]
async fn test_local_transport_with_resolvers() {
    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Mutation", "createHero", |_parent, args, _ctx, _info| {
        let name: String = args.require("name")?;
        Ok(json!({"hero": {"name": name}, "ok": true}))
    });
    let client = Client::builder()
        .schema(star_wars())
        .transport(LocalSchemaTransport::new(Arc::new(star_wars())).with_resolvers(resolvers))
        .build()
        .await
        .expect("client");

    let request = Request::new("mutation ($name: String!) { createHero(name: $name) { ok hero { name } } }")
        .variable("name", "Rey");
    let data = client.execute_request(request).await.expect("data");
    assert_eq!(data, json!({"createHero": {"ok": true, "hero": {"name": "Rey"}}}));
}

#[tokio::test]
async fn test_validation_errors() {
    let client = local_client().await;

    let err = client.execute("{ film { director } }").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationError);
    insta::assert_snapshot!(err.message, @r#"Cannot query field "director" on type "Film"."#);
    assert_eq!(err.extension("locations"), Some(&json!([{"line": 1, "column": 10}])));

    let err = client.validate("{ film { id ").unwrap_err();
    assert_eq!(err.code, ErrorCode::SyntaxError);
    assert!(err.message.starts_with("Syntax Error:"), "{}", err.message);

    assert!(client.validate("{ hero { name } }").is_ok());
}

#[tokio::test]
async fn test_introspection_query_through_schema_client() {
    let client = Client::builder()
        .schema(star_wars())
        .build()
        .await
        .expect("client");

    assert!(client.validate(INTROSPECTION_QUERY).is_ok());
    let data = client.execute(INTROSPECTION_QUERY).await.expect("introspection data");
    let rebuilt = build_client_schema(&data).expect("valid introspection");
    assert_eq!(rebuilt.lookup_scalar_type(&["film", "releaseDate"]), Some("DateTime"));

    assert!(client
        .validate("{ __schema { queryType { ...T } } } fragment T on __Type { name }")
        .is_ok());
}

#[tokio::test]
async fn test_validate_without_schema() {
    let transport = Scripted::new(vec![Ok(Response::data(json!({})))]);
    let client = Client::builder().transport(transport).build().await.expect("client");

    let err = client.validate("{ anything }").unwrap_err();
    assert_eq!(err.code, ErrorCode::NoSchema);
    insta::assert_snapshot!(
        err.message,
        @"Cannot validate locally the document, you need to pass a schema."
    );
}

#[tokio::test]
async fn test_server_errors_are_raised() {
    let response: Response = serde_json::from_value(json!({
        "data": null,
        "errors": [{"message": "Film not found", "path": ["film"], "locations": [{"line": 1, "column": 3}]}]
    }))
    .expect("response");
    let client = Client::builder()
        .transport(Scripted::new(vec![Ok(response)]))
        .build()
        .await
        .expect("client");

    let err = client.execute("{ film { id } }").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ServerError);
    assert_eq!(err.message, "Film not found");
    assert_eq!(err.extension("path"), Some(&json!(["film"])));
}

#[tokio::test]
async fn test_client_retries_through_transport() {
    let transport = Scripted::new(vec![
        Err(GqlError::timeout()),
        Err(GqlError::network("connection reset")),
        Ok(Response::data(json!({"hero": {"name": "luke"}}))),
    ]);
    let client = Client::builder()
        .transport(Arc::clone(&transport))
        .retries(3)
        .retry_delay(Duration::from_millis(1))
        .build()
        .await
        .expect("client");

    let data = client.execute("{ hero { name } }").await.expect("data");
    assert_eq!(data, json!({"hero": {"name": "luke"}}));
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_client_retry_exhaustion() {
    let transport = Scripted::new(vec![Err(GqlError::timeout())]);
    let client = Client::builder()
        .transport(Arc::clone(&transport))
        .retries(3)
        .build()
        .await
        .expect("client");

    let err = client.execute("{ hero { name } }").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::RetryExhausted);
    insta::assert_snapshot!(err.message, @"Failed 3 retries: [TIMEOUT] Request timed out");
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_fetch_schema_from_transport() {
    let schema = Arc::new(star_wars());
    let server = LocalSchemaTransport::new(Arc::clone(&schema)).with_root_value(root_value());

    let client = Client::builder()
        .transport(server)
        .fetch_schema_from_transport(true)
        .custom_scalar("DateTime", capitalize)
        .build()
        .await
        .expect("client");

    let fetched = client.schema().expect("fetched schema");
    assert_eq!(fetched.lookup_scalar_type(&["film", "releaseDate"]), Some("DateTime"));
    assert_eq!(fetched.lookup_scalar_type(&["createHero", "ok"]), Some("Boolean"));
    assert!(client.introspection().is_some_and(|i| i.get("__schema").is_some()));

    let data = client.execute("{ film { releaseDate } }").await.expect("data");
    assert_eq!(data, json!({"film": {"releaseDate": "SOME_DATETIME"}}));
}

#[tokio::test]
async fn test_introspection_client() {
    let introspection = star_wars().to_introspection();
    let client = Client::builder()
        .introspection(introspection.clone())
        .build()
        .await
        .expect("client");

    assert_eq!(client.introspection(), Some(introspection));
    assert!(client.validate("{ film { releaseDate species { name } } }").is_ok());
}

#[tokio::test]
async fn test_builder_configuration_errors() {
    let sdl = "type Query { a: String }";
    let transport = || Scripted::new(vec![Ok(Response::data(json!({})))]);

    let cases = [
        Client::builder()
            .introspection(star_wars().to_introspection())
            .type_defs(sdl),
        Client::builder().schema(star_wars()).type_defs(sdl),
        Client::builder()
            .schema(star_wars())
            .introspection(star_wars().to_introspection()),
        Client::builder().fetch_schema_from_transport(true),
        Client::builder()
            .transport(transport())
            .schema(star_wars())
            .fetch_schema_from_transport(true),
        Client::builder()
            .transport(transport())
            .custom_scalar("DateTime", capitalize),
    ];

    for builder in cases {
        let debug = format!("{builder:?}");
        let err = builder.build().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfiguration, "{debug}");
    }

    let err = Client::builder().build().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::NoTransport);
}

#[tokio::test]
async fn test_custom_scalars_registry() {
    let registry = ScalarRegistry::builder()
        .register("DateTime", capitalize)
        .build();
    let client = Client::builder()
        .schema(star_wars())
        .transport(LocalSchemaTransport::new(Arc::new(star_wars())).with_root_value(root_value()))
        .custom_scalars(registry)
        .build()
        .await
        .expect("client");

    let data = client.execute("{ film { releaseDate } }").await.expect("data");
    assert_eq!(data["film"]["releaseDate"], json!("SOME_DATETIME"));
}

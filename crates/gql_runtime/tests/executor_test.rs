//! Execution of documents against a resolver-backed schema.

use gql_runtime::{
    build_ast_schema, build_client_schema, Context, Executor, PathSegment, ResolverError,
    ResolverMap, Schema, INTROSPECTION_QUERY,
};
use serde_json::{json, Value};
use std::collections::HashMap;

const SDL: &str = r#"
    scalar DateTime

    type Query {
        film(id: ID!): Film
        films(first: Int = 2): [Film!]!
        search(text: String!): [SearchResult]
        crash: String
    }

    type Mutation {
        rateFilm(id: ID!, stars: Int!): Film
    }

    interface Node { id: ID! }

    type Film implements Node {
        id: ID!
        title: String!
        releaseDate: DateTime
        director: String
    }

    type Person implements Node {
        id: ID!
        name: String
    }

    union SearchResult = Film | Person
"#;

fn films() -> Value {
    json!([
        {"id": "1", "title": "A New Hope", "releaseDate": "1977-05-25", "director": "George Lucas"},
        {"id": "2", "title": "The Empire Strikes Back", "releaseDate": "1980-05-21", "director": "Irvin Kershner"},
        {"id": "3", "title": "Return of the Jedi", "releaseDate": "1983-05-25", "director": "Richard Marquand"}
    ])
}

fn executor() -> Executor {
    let mut resolvers = ResolverMap::new();
    resolvers.register_fn("Query", "film", |_parent, args, _ctx, _info| {
        let id: String = args.require("id")?;
        Ok(films()
            .as_array()
            .and_then(|films| films.iter().find(|f| f["id"] == id.as_str()))
            .cloned()
            .unwrap_or(Value::Null))
    });
    resolvers.register_fn("Query", "films", |_parent, args, _ctx, _info| {
        let first: usize = args.require("first")?;
        let films = films();
        let all = films.as_array().cloned().unwrap_or_default();
        Ok(Value::Array(all.into_iter().take(first).collect()))
    });
    resolvers.register_fn("Query", "search", |_parent, _args, _ctx, _info| {
        Ok(json!([
            {"__typename": "Film", "id": "1", "title": "A New Hope"},
            {"__typename": "Person", "id": "p1", "name": "Luke Skywalker"}
        ]))
    });
    resolvers.register_fn("Query", "crash", |_parent, _args, _ctx, _info| {
        Err(ResolverError::Custom("the reactor core is unstable".to_string()))
    });
    resolvers.register_async("Mutation", "rateFilm", |_parent, args, ctx, _info| async move {
        let stars: i64 = args.require("stars")?;
        let user: String = ctx.get("user").unwrap_or_default();
        Ok(json!({"id": args.get("id"), "title": format!("rated {stars} by {user}")}))
    });
    Executor::with_resolvers(resolvers)
}

fn schema() -> Schema {
    build_ast_schema(SDL).expect("valid schema")
}

async fn run(query: &str, variables: Value) -> gql_runtime::Response {
    let variables: HashMap<String, Value> =
        serde_json::from_value(variables).expect("variables object");
    executor()
        .execute(
            &schema(),
            query,
            None,
            &Context::with_variables(variables),
            &Value::Null,
        )
        .await
}

#[tokio::test]
async fn test_arguments_variables_and_aliases() {
    let response = run(
        r#"
        query Films($id: ID!) {
            hope: film(id: $id) { title releaseDate }
            empire: film(id: "2") { title }
            films { id }
            three: films(first: 3) { id }
        }
        "#,
        json!({"id": "1"}),
    )
    .await;

    assert!(!response.has_errors(), "{:?}", response.errors);
    assert_eq!(
        response.data,
        Some(json!({
            "hope": {"title": "A New Hope", "releaseDate": "1977-05-25"},
            "empire": {"title": "The Empire Strikes Back"},
            "films": [{"id": "1"}, {"id": "2"}],
            "three": [{"id": "1"}, {"id": "2"}, {"id": "3"}]
        }))
    );
}

#[tokio::test]
async fn test_fragments_and_type_conditions() {
    let response = run(
        r#"
        {
            search(text: "sky") {
                __typename
                ... on Node { id }
                ...FilmTitle
                ... on Person { name }
            }
        }
        fragment FilmTitle on Film { title }
        "#,
        json!({}),
    )
    .await;

    assert_eq!(
        response.data,
        Some(json!({
            "search": [
                {"__typename": "Film", "id": "1", "title": "A New Hope"},
                {"__typename": "Person", "id": "p1", "name": "Luke Skywalker"}
            ]
        }))
    );
}

#[tokio::test]
async fn test_skip_and_include() {
    let response = run(
        r#"
        query ($withDirector: Boolean!) {
            film(id: "1") {
                title @skip(if: true)
                director @include(if: $withDirector)
                id
            }
        }
        "#,
        json!({"withDirector": false}),
    )
    .await;

    assert_eq!(response.data, Some(json!({"film": {"id": "1"}})));
}

#[tokio::test]
async fn test_resolver_error_nulls_field() {
    let response = run("{ crash film(id: \"3\") { title } }", json!({})).await;

    assert_eq!(
        response.data,
        Some(json!({"crash": null, "film": {"title": "Return of the Jedi"}}))
    );
    let errors = response.errors.expect("errors");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "the reactor core is unstable");
    assert_eq!(errors[0].path, Some(vec![PathSegment::Field("crash".into())]));
}

#[tokio::test]
async fn test_missing_required_variable() {
    let response = run("query ($id: ID!) { film(id: $id) { title } }", json!({})).await;

    assert!(response.data.is_none());
    insta::assert_snapshot!(
        response.errors.expect("errors")[0].message,
        @r#"Variable "$id" of required type "ID!" was not provided."#
    );
}

#[tokio::test]
async fn test_mutation_with_context() {
    let mut ctx = Context::with_variables(HashMap::new());
    ctx.set("user", "leia");
    let response = executor()
        .execute(
            &schema(),
            "mutation { rateFilm(id: \"1\", stars: 5) { id title } }",
            None,
            &ctx,
            &Value::Null,
        )
        .await;

    assert_eq!(
        response.data,
        Some(json!({"rateFilm": {"id": "1", "title": "rated 5 by leia"}}))
    );
}

#[tokio::test]
async fn test_introspection_rebuilds_schema() {
    let response = run(INTROSPECTION_QUERY, json!({})).await;
    assert!(!response.has_errors(), "{:?}", response.errors);

    let data = response.data.expect("data");
    let rebuilt = build_client_schema(&data).expect("valid introspection");
    assert_eq!(rebuilt.query_type.as_deref(), Some("Query"));
    assert_eq!(rebuilt.mutation_type.as_deref(), Some("Mutation"));
    assert_eq!(
        rebuilt.lookup_scalar_type(&["film", "releaseDate"]),
        Some("DateTime")
    );
    assert_eq!(rebuilt.possible_types("SearchResult"), vec!["Film", "Person"]);
}

#[tokio::test]
async fn test_type_introspection() {
    let response = run(
        r#"{ __type(name: "Film") { name kind fields { name type { kind name ofType { name } } } } }"#,
        json!({}),
    )
    .await;

    let data = response.data.expect("data");
    assert_eq!(data["__type"]["kind"], "OBJECT");
    assert_eq!(
        data["__type"]["fields"][0],
        json!({"name": "id", "type": {"kind": "NON_NULL", "name": null, "ofType": {"name": "ID"}}})
    );
}

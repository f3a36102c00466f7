//! End-to-end translation scenarios through the engine facade.

use std::sync::Arc;

use cyphergen::{
    CallbackRegistry, CallbackValue, EngineConfig, Operation, RequestContext, ResolveTree,
    SchemaModel, TranslateError, TranslationEngine,
};
use serde_json::{json, Map, Value};

const MOVIES: &str = r#"
nodes:
  - name: Movie
    fields:
      - { name: id, type: ID, id: true }
      - { name: title, type: String, required: true }
      - { name: released, type: Int }
      - { name: updatedAt, type: DateTime, timestamp: [CREATE, UPDATE] }
      - { name: slug, type: String, populated_by: { callback: slugify } }
    relationships:
      - { field: actors, type: ACTED_IN, direction: IN, target: Actor }
  - name: Actor
    fields:
      - { name: name, type: String }
    relationships:
      - { field: movies, type: ACTED_IN, direction: OUT, target: Movie }
"#;

fn slugify(parent: &Map<String, Value>, _: &Value, _: &RequestContext) -> CallbackValue {
    match parent.get("title").and_then(Value::as_str) {
        Some(title) => CallbackValue::Value(json!(title.to_lowercase().replace(' ', "-"))),
        None => CallbackValue::Undefined,
    }
}

fn engine(config: EngineConfig) -> TranslationEngine {
    let model = SchemaModel::from_yaml_str(MOVIES).unwrap();
    TranslationEngine::new(Arc::new(model), config)
        .with_callbacks(CallbackRegistry::new().register("slugify", slugify))
}

#[test]
fn test_movie_actors_aggregate_count() {
    let operation = Operation::Read {
        target: "Movie".to_string(),
        selection: ResolveTree::field("movies")
            .with_where(json!({ "title": "Matrix" }))
            .with_fields(vec![
                ResolveTree::field("actorsAggregate").with_fields(vec![ResolveTree::field("count")])
            ]),
    };
    let query = engine(EngineConfig::default())
        .translate(&operation, &RequestContext::anonymous())
        .unwrap();

    let expected = [
        "MATCH (this:Movie)",
        "WHERE this.title = $param0",
        "CALL {",
        "    WITH this",
        "    MATCH (this)<-[this0:ACTED_IN]-(this1:Actor)",
        "    RETURN { count: count(this1) } AS var2",
        "}",
        "RETURN this { actorsAggregate: var2 } AS this",
    ]
    .join("\n");
    assert_eq!(query.text, expected);
    assert_eq!(query.params["param0"], json!("Matrix"));
    assert_eq!(query.params.len(), 1);
}

#[test]
fn test_repeated_aggregate_shares_one_subquery() {
    let aggregate =
        ResolveTree::field("moviesAggregate").with_fields(vec![ResolveTree::field("count")]);
    let operation = Operation::Read {
        target: "Actor".to_string(),
        selection: ResolveTree::field("actors")
            .with_fields(vec![aggregate.clone(), aggregate.aliased("again")]),
    };
    let query = engine(EngineConfig::default())
        .translate(&operation, &RequestContext::anonymous())
        .unwrap();

    let expected = [
        "MATCH (this:Actor)",
        "CALL {",
        "    WITH this",
        "    MATCH (this)-[this0:ACTED_IN]->(this1:Movie)",
        "    RETURN { count: count(this1) } AS var2",
        "}",
        "RETURN this { moviesAggregate: var2, again: var2 } AS this",
    ]
    .join("\n");
    assert_eq!(query.text, expected);
    assert_eq!(query.text.matches("CALL {").count(), 1);
}

#[test]
fn test_operation_from_json() {
    let operation: Operation = serde_json::from_value(json!({
        "operation": "read",
        "target": "Actor",
        "selection": {
            "name": "actors",
            "args": { "where": { "name_STARTS_WITH": "K" }, "sort": [{ "name": "DESC" }], "limit": 2 },
            "fields": [{ "name": "name", "alias": "fullName" }]
        }
    }))
    .unwrap();
    let query = engine(EngineConfig::default())
        .translate(&operation, &RequestContext::anonymous())
        .unwrap();

    let expected = [
        "MATCH (this:Actor)",
        "WHERE this.name STARTS WITH $param0",
        "WITH *",
        "ORDER BY this.name DESC",
        "LIMIT $param1",
        "RETURN this { fullName: this.name } AS this",
    ]
    .join("\n");
    assert_eq!(query.text, expected);
}

#[test]
fn test_create_with_generated_values_and_events() {
    let config = EngineConfig {
        subscriptions_enabled: true,
        ..Default::default()
    };
    let operation = Operation::Create {
        target: "Movie".to_string(),
        input: vec![json!({ "title": "The Matrix", "released": 1999 })
            .as_object()
            .cloned()
            .unwrap()],
        selection: ResolveTree::field("createMovies").with_fields(vec![ResolveTree::field("slug")]),
    };
    let query = engine(config)
        .translate(&operation, &RequestContext::anonymous())
        .unwrap();

    let expected = [
        "CALL {",
        "    CREATE (this0:Movie)",
        "    SET this0.title = $param0, this0.released = $param1, this0.id = randomUUID(), this0.updatedAt = datetime(), this0.slug = $param2",
        "    RETURN this0 AS this",
        "}",
        "RETURN collect(DISTINCT this { .slug }) AS data, collect({ event: \"create\", typename: \"Movie\", id: elementId(this), timestamp: timestamp() }) AS events",
    ]
    .join("\n");
    assert_eq!(query.text, expected);
    assert_eq!(query.params["param2"], json!("the-matrix"));
}

#[test]
fn test_create_rejects_null_for_required_field() {
    let operation = Operation::Create {
        target: "Movie".to_string(),
        input: vec![json!({ "title": null }).as_object().cloned().unwrap()],
        selection: ResolveTree::field("createMovies"),
    };
    let err = engine(EngineConfig::default())
        .translate(&operation, &RequestContext::anonymous())
        .unwrap_err();
    assert_eq!(
        err,
        TranslateError::ValueCoercion(
            "Expected non-nullable type \"String!\" not to be null.".to_string()
        )
    );
}

#[test]
fn test_coercion_message() {
    let operation = Operation::Read {
        target: "Movie".to_string(),
        selection: ResolveTree::field("movies").with_where(json!({ "released": 1.5 })),
    };
    let err = engine(EngineConfig::default())
        .translate(&operation, &RequestContext::anonymous())
        .unwrap_err();
    assert_eq!(err.to_string(), "Int cannot represent non-integer value: 1.5");
}

/// Movie fields nesting `actors { movies { ... } }` `levels` times.
fn movie_chain(levels: usize) -> Vec<ResolveTree> {
    let mut fields = vec![ResolveTree::field("title")];
    if levels > 0 {
        let movies = ResolveTree::field("movies").with_fields(movie_chain(levels - 1));
        fields.push(
            ResolveTree::field("actors").with_fields(vec![ResolveTree::field("name"), movies]),
        );
    }
    fields
}

#[test]
fn test_max_depth_bounds_nesting() {
    let read = |levels: usize| Operation::Read {
        target: "Movie".to_string(),
        selection: ResolveTree::field("movies").with_fields(movie_chain(levels)),
    };
    let engine = engine(EngineConfig {
        max_depth: 4,
        ..Default::default()
    });

    assert!(engine.translate(&read(1), &RequestContext::anonymous()).is_ok());
    let err = engine
        .translate(&read(4), &RequestContext::anonymous())
        .unwrap_err();
    assert!(matches!(err, TranslateError::MaxDepthExceeded(4)));
}

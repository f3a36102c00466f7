//! Update operations applied to a pre-seeded fixture graph.

use cyphergen::config::EngineConfig;
use cyphergen::request::{Operation, RequestContext, ResolveTree};
use cyphergen::schema_model::SchemaModel;
use cyphergen::translate::{CallbackRegistry, CallbackValue, Translation};
use serde_json::{json, Map, Value};
use test_case::test_case;

use super::fixture_graph::FixtureGraph;

const SCHEMA: &str = r#"
nodes:
  - name: Movie
    fields:
      - { name: title, type: String }
      - { name: views, type: Int }
      - { name: score, type: Float }
      - { name: tags, type: String, list: true }
      - { name: slug, type: String, populated_by: { callback: slug, operations: [UPDATE] } }
"#;

fn seeded() -> FixtureGraph {
    let mut graph = FixtureGraph::new();
    graph.add_node(
        "Movie",
        json!({
            "title": "Matrix",
            "views": 10,
            "score": 2.0,
            "tags": ["a", "b", "c"],
            "slug": "matrix"
        }),
    );
    graph.add_node("Movie", json!({ "title": "Speed", "views": 1, "slug": "speed" }));
    graph
}

fn update(update: Value) -> Operation {
    Operation::Update {
        target: "Movie".to_string(),
        filter: json!({ "title": "Matrix" }).as_object().cloned(),
        update: update.as_object().cloned().unwrap(),
        selection: ResolveTree::field("updateMovies")
            .with_fields(vec![ResolveTree::field("title")]),
    }
}

fn run(graph: &mut FixtureGraph, operation: &Operation, callback: fn() -> CallbackValue) {
    let model = SchemaModel::from_yaml_str(SCHEMA).unwrap();
    let config = EngineConfig::default();
    let callbacks = CallbackRegistry::new()
        .register("slug", move |_: &Map<String, Value>, _: &Value, _: &RequestContext| callback());
    let request = RequestContext::anonymous();
    let query = Translation::new(&model, &config, &callbacks, &request)
        .translate(operation)
        .unwrap();
    graph.execute(&query).unwrap();
}

fn property(graph: &FixtureGraph, node: usize, key: &str) -> Option<Value> {
    graph.nodes[node].properties.get(key).cloned()
}

#[test]
fn test_populated_by_null_removes_property() {
    let mut graph = seeded();
    run(&mut graph, &update(json!({ "title": "The Matrix" })), || CallbackValue::Null);
    assert_eq!(property(&graph, 0, "title"), Some(json!("The Matrix")));
    assert_eq!(property(&graph, 0, "slug"), None);
    assert_eq!(property(&graph, 1, "slug"), Some(json!("speed")));
}

#[test]
fn test_populated_by_undefined_leaves_property() {
    let mut graph = seeded();
    run(&mut graph, &update(json!({ "title": "The Matrix" })), || CallbackValue::Undefined);
    assert_eq!(property(&graph, 0, "slug"), Some(json!("matrix")));
}

#[test]
fn test_populated_by_value_overwrites_property() {
    let mut graph = seeded();
    run(&mut graph, &update(json!({ "title": "The Matrix" })), || {
        CallbackValue::Value(json!("the-matrix"))
    });
    assert_eq!(property(&graph, 0, "slug"), Some(json!("the-matrix")));
}

#[test_case(json!({ "views_INCREMENT": 5 }), "views", json!(15) ; "increment")]
#[test_case(json!({ "views_DECREMENT": 3 }), "views", json!(7) ; "decrement")]
#[test_case(json!({ "score_MULTIPLY": 1.5 }), "score", json!(3.0) ; "multiply")]
#[test_case(json!({ "tags_PUSH": ["d"] }), "tags", json!(["a", "b", "c", "d"]) ; "push")]
#[test_case(json!({ "tags_POP": 2 }), "tags", json!(["a"]) ; "pop")]
fn test_update_operators(input: Value, field: &str, expected: Value) {
    let mut graph = seeded();
    run(&mut graph, &update(input), || CallbackValue::Undefined);
    assert_eq!(property(&graph, 0, field), Some(expected));
}

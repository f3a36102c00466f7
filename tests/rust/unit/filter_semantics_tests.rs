//! Compiled filters evaluated against a fixture graph.

use cyphergen::config::EngineConfig;
use cyphergen::cypher::Variable;
use cyphergen::request::RequestContext;
use cyphergen::schema_model::SchemaModel;
use cyphergen::translate::filter::{compile_where, parse_filter_key, FilterOperator, FilterTarget};
use cyphergen::translate::{CallbackRegistry, Translation};
use serde_json::{json, Map, Value};
use test_case::test_case;

use super::fixture_graph::FixtureGraph;

const SCHEMA: &str = r#"
nodes:
  - name: Movie
    fields:
      - { name: title, type: String }
      - { name: runtime, type: Int }
      - { name: rating, type: Float }
    relationships:
      - { field: actors, type: ACTED_IN, direction: IN, target: Actor, properties: ActedIn }
  - name: Actor
    fields:
      - { name: name, type: String }
      - { name: age, type: Int }
relationship_properties:
  - name: ActedIn
    fields:
      - { name: screenTime, type: Int }
"#;

fn model() -> SchemaModel {
    SchemaModel::from_yaml_str(SCHEMA).unwrap()
}

fn movies() -> FixtureGraph {
    let mut graph = FixtureGraph::new();
    graph.add_node("Movie", json!({ "title": "The Matrix", "runtime": 136, "rating": 8.7 }));
    graph.add_node("Movie", json!({ "title": "Matrix Reloaded", "runtime": 138, "rating": 7.2 }));
    graph.add_node("Movie", json!({ "title": "Cloud Atlas", "runtime": 172, "rating": 7.4 }));
    graph.add_node("Movie", json!({ "title": "Speed", "runtime": 116, "rating": 7.3 }));
    graph
}

/// Cast with screen times; movie index to `(actor age, screen time)` pairs.
fn cast() -> (FixtureGraph, Vec<usize>) {
    let mut graph = FixtureGraph::new();
    let casts: Vec<Vec<(i64, i64)>> = vec![
        vec![],
        vec![(30, 20)],
        vec![(30, 20), (50, 5)],
        vec![(25, 20), (35, 25)],
        vec![(60, 5), (70, 5)],
    ];
    let mut movies = Vec::new();
    for (i, members) in casts.iter().enumerate() {
        let movie = graph.add_node("Movie", json!({ "title": format!("Movie {}", i) }));
        for (j, (age, screen_time)) in members.iter().enumerate() {
            let name = format!("Actor {}-{}", i, j);
            let actor = graph.add_node("Actor", json!({ "name": name, "age": age }));
            graph.add_edge(actor, "ACTED_IN", movie, json!({ "screenTime": screen_time }));
        }
        movies.push(movie);
    }
    (graph, movies)
}

/// Direct evaluation of an AND/OR filter tree over plain properties.
fn oracle(filter: &Map<String, Value>, properties: &Map<String, Value>) -> bool {
    filter.iter().all(|(key, value)| match key.as_str() {
        "AND" => value
            .as_array()
            .unwrap()
            .iter()
            .all(|f| oracle(f.as_object().unwrap(), properties)),
        "OR" => value
            .as_array()
            .unwrap()
            .iter()
            .any(|f| oracle(f.as_object().unwrap(), properties)),
        _ => {
            let (field, op) = parse_filter_key(key);
            let actual = &properties[field];
            let number = |v: &Value| v.as_f64().unwrap();
            match op {
                FilterOperator::Eq => actual == value,
                FilterOperator::Not => actual != value,
                FilterOperator::Gt => number(actual) > number(value),
                FilterOperator::Gte => number(actual) >= number(value),
                FilterOperator::Lt => number(actual) < number(value),
                FilterOperator::Lte => number(actual) <= number(value),
                FilterOperator::Contains => {
                    actual.as_str().unwrap().contains(value.as_str().unwrap())
                }
                FilterOperator::StartsWith => {
                    actual.as_str().unwrap().starts_with(value.as_str().unwrap())
                }
                FilterOperator::In => value.as_array().unwrap().contains(actual),
                other => panic!("oracle does not model {:?}", other),
            }
        }
    })
}

fn evaluate(
    graph: &FixtureGraph,
    model: &SchemaModel,
    type_name: &str,
    filter: &Value,
    node: usize,
) -> Option<bool> {
    let config = EngineConfig::default();
    let callbacks = CallbackRegistry::new();
    let request = RequestContext::anonymous();
    let tx = Translation::new(model, &config, &callbacks, &request);
    let this = Variable::named("this");
    let target = FilterTarget::Node(model.node(type_name).unwrap());
    let compiled = compile_where(&tx, filter.as_object(), &this, target).unwrap();
    match compiled.predicate {
        Some(predicate) => graph.holds(&predicate, &this, node).unwrap(),
        None => Some(true),
    }
}

#[test_case(json!({ "title_CONTAINS": "Matrix" }) ; "leaf")]
#[test_case(json!({ "title_CONTAINS": "Matrix", "runtime_GT": 137 }) ; "implicit and")]
#[test_case(json!({ "OR": [{ "runtime_LT": 120 }, { "rating_GTE": 8.0 }] }) ; "or")]
#[test_case(json!({ "AND": [{ "OR": [{ "title": "Speed" }, { "title_STARTS_WITH": "Cloud" }] }, { "rating_LTE": 7.35 }] }) ; "nested")]
#[test_case(json!({ "OR": [{ "AND": [{ "runtime_GTE": 136 }, { "runtime_LTE": 138 }] }, { "title_IN": ["Speed"] }] }) ; "and inside or")]
#[test_case(json!({ "AND": [] }) ; "empty and")]
#[test_case(json!({ "OR": [{ "title_NOT": "Speed" }, { "rating_GT": 100.0 }] }) ; "negated leaf")]
fn test_and_or_matches_oracle(filter: Value) {
    let graph = movies();
    let model = model();
    for (id, node) in graph.nodes.iter().enumerate() {
        let expected = oracle(filter.as_object().unwrap(), &node.properties);
        let actual = evaluate(&graph, &model, "Movie", &filter, id);
        assert_eq!(actual, Some(expected), "node {} under {}", id, filter);
    }
}

#[test]
fn test_empty_or_is_false() {
    let graph = movies();
    let model = model();
    assert_eq!(evaluate(&graph, &model, "Movie", &json!({ "OR": [] }), 0), Some(false));
}

fn quantified(quantifier: &str, filter: Value) -> Value {
    json!({ format!("actors_{}", quantifier): filter })
}

#[test_case(json!({ "age_GT": 28 }) ; "age")]
#[test_case(json!({ "age_LT": 40, "name_CONTAINS": "Actor" }) ; "two leaves")]
#[test_case(json!({ "OR": [{ "age": 60 }, { "age": 25 }] }) ; "or")]
fn test_all_none_complements(filter: Value) {
    let (graph, movies) = cast();
    let model = model();
    let negated = json!({ "NOT": filter.clone() });
    for movie in movies {
        let some = evaluate(&graph, &model, "Movie", &quantified("SOME", filter.clone()), movie);
        let none = evaluate(&graph, &model, "Movie", &quantified("NONE", filter.clone()), movie);
        let all = evaluate(&graph, &model, "Movie", &quantified("ALL", filter.clone()), movie);
        let none_violating =
            evaluate(&graph, &model, "Movie", &quantified("NONE", negated.clone()), movie);

        assert_eq!(none, some.map(|b| !b), "NONE is NOT SOME for movie {}", movie);
        let related = graph.edges.iter().any(|e| e.to == movie);
        assert_eq!(
            all,
            none_violating.map(|b| b && related),
            "ALL is NONE(NOT f) over a non-empty set for movie {}",
            movie
        );
    }
}

#[test]
fn test_all_without_constraints_holds_on_empty_set() {
    let (graph, movies) = cast();
    let model = model();
    assert_eq!(
        evaluate(&graph, &model, "Movie", &quantified("ALL", json!({})), movies[0]),
        Some(true)
    );
    assert_eq!(
        evaluate(&graph, &model, "Movie", &quantified("ALL", json!({ "age_GT": 0 })), movies[0]),
        Some(false)
    );
}

#[test_case(0, false ; "no related actors")]
#[test_case(1, true ; "one match")]
#[test_case(2, true ; "one of two matches")]
#[test_case(3, false ; "two matches")]
#[test_case(4, false ; "no match")]
fn test_single(movie: usize, expected: bool) {
    let (graph, movies) = cast();
    let model = model();
    let filter = json!({ "actors_SINGLE": { "age_LT": 40 } });
    assert_eq!(evaluate(&graph, &model, "Movie", &filter, movies[movie]), Some(expected));
}

#[test_case(0, false ; "no related actors")]
#[test_case(1, true ; "one long role")]
#[test_case(2, true ; "one long and one short role")]
#[test_case(3, false ; "two long roles")]
#[test_case(4, false ; "short roles only")]
fn test_single_respects_edge_properties(movie: usize, expected: bool) {
    let (graph, movies) = cast();
    let model = model();
    let filter = json!({ "actorsConnection_SINGLE": { "edge": { "screenTime_GTE": 20 } } });
    assert_eq!(evaluate(&graph, &model, "Movie", &filter, movies[movie]), Some(expected));
}

#[test]
fn test_connection_node_and_edge_constraints() {
    let (graph, movies) = cast();
    let model = model();
    let filter = json!({
        "actorsConnection_SOME": { "node": { "age_GT": 30 }, "edge": { "screenTime_GT": 10 } }
    });
    let matching: Vec<bool> = movies
        .iter()
        .map(|m| evaluate(&graph, &model, "Movie", &filter, *m) == Some(true))
        .collect();
    assert_eq!(matching, vec![false, false, false, true, false]);
}

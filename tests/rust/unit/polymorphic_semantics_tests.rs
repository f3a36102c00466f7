//! Interface reads and interface relationship filters evaluated against a
//! fixture graph.

use cyphergen::config::EngineConfig;
use cyphergen::cypher::{Query, Variable};
use cyphergen::request::{Operation, RequestContext, ResolveTree};
use cyphergen::schema_model::SchemaModel;
use cyphergen::translate::filter::{compile_where, FilterTarget};
use cyphergen::translate::{CallbackRegistry, Translation};
use serde_json::{json, Value};
use test_case::test_case;

use super::fixture_graph::FixtureGraph;

const SCHEMA: &str = r#"
nodes:
  - name: Movie
    labels: [Film, Movie]
    fields:
      - { name: title, type: String }
      - { name: runtime, type: Int }
  - name: Series
    fields:
      - { name: title, type: String }
      - { name: episodes, type: Int }
  - name: Actor
    fields:
      - { name: name, type: String }
    relationships:
      - { field: actedIn, type: ACTED_IN, direction: OUT, target: Production }
interfaces:
  - name: Production
    implementations: [Movie, Series]
    fields:
      - { name: title, type: String }
"#;

fn model() -> SchemaModel {
    SchemaModel::from_yaml_str(SCHEMA).unwrap()
}

fn movie(graph: &mut FixtureGraph, title: &str, runtime: i64) -> usize {
    graph.add_labelled_node(&["Film", "Movie"], json!({ "title": title, "runtime": runtime }))
}

fn series(graph: &mut FixtureGraph, title: &str, episodes: i64) -> usize {
    graph.add_node("Series", json!({ "title": title, "episodes": episodes }))
}

fn read_productions(model: &SchemaModel, selection: ResolveTree) -> Query {
    let config = EngineConfig::default();
    let callbacks = CallbackRegistry::new();
    let request = RequestContext::anonymous();
    let operation = Operation::Read {
        target: "Production".to_string(),
        selection,
    };
    Translation::new(model, &config, &callbacks, &request)
        .translate(&operation)
        .unwrap()
}

fn sorted_titles(rows: &[Value]) -> Vec<String> {
    let mut titles: Vec<String> = rows
        .iter()
        .map(|row| row["title"].as_str().unwrap().to_string())
        .collect();
    titles.sort();
    titles
}

#[test]
fn test_interface_read_keeps_rows_with_equal_projections() {
    let mut graph = FixtureGraph::new();
    movie(&mut graph, "Heat", 170);
    movie(&mut graph, "Heat", 102);
    series(&mut graph, "Heat", 6);

    let model = model();
    let query = read_productions(
        &model,
        ResolveTree::field("productions").with_fields(vec![ResolveTree::field("title")]),
    );
    assert!(query.render().text.contains("\n    UNION ALL\n"));

    let rows = graph.read(&query).unwrap();
    assert_eq!(rows.len(), 3);
    let movies = rows.iter().filter(|r| r["__resolveType"] == json!("Movie")).count();
    assert_eq!(movies, 2);
}

#[test]
fn test_on_filter_applies_per_implementation() {
    let mut graph = FixtureGraph::new();
    movie(&mut graph, "Heat", 170);
    movie(&mut graph, "Hook", 90);
    movie(&mut graph, "Alien", 117);
    series(&mut graph, "Hill Street", 146);
    series(&mut graph, "Lost", 121);

    let model = model();
    let query = read_productions(
        &model,
        ResolveTree::field("productions")
            .with_where(json!({
                "title_STARTS_WITH": "H",
                "_on": { "Movie": { "runtime_GT": 100 } }
            }))
            .with_fields(vec![ResolveTree::field("title")]),
    );
    let rows = graph.read(&query).unwrap();
    assert_eq!(sorted_titles(&rows), vec!["Heat", "Hill Street"]);
}

/// Actors and their productions:
/// 0: long movie; 1: long and short movie; 2: long movie and a series;
/// 3: series only; 4: nothing.
fn filmography() -> (FixtureGraph, Vec<usize>) {
    let mut graph = FixtureGraph::new();
    let long = movie(&mut graph, "Heat", 170);
    let short = movie(&mut graph, "Hook", 90);
    let show = series(&mut graph, "Lost", 121);
    let credits: Vec<Vec<usize>> =
        vec![vec![long], vec![long, short], vec![long, show], vec![show], vec![]];

    let mut actors = Vec::new();
    for (i, productions) in credits.iter().enumerate() {
        let actor = graph.add_node("Actor", json!({ "name": format!("Actor {}", i) }));
        for production in productions {
            graph.add_edge(actor, "ACTED_IN", *production, json!({}));
        }
        actors.push(actor);
    }
    (graph, actors)
}

fn evaluate_actor(
    graph: &FixtureGraph,
    model: &SchemaModel,
    filter: &Value,
    actor: usize,
) -> Option<bool> {
    let config = EngineConfig::default();
    let callbacks = CallbackRegistry::new();
    let request = RequestContext::anonymous();
    let tx = Translation::new(model, &config, &callbacks, &request);
    let this = Variable::named("this");
    let target = FilterTarget::Node(model.node("Actor").unwrap());
    let compiled = compile_where(&tx, filter.as_object(), &this, target).unwrap();
    match compiled.predicate {
        Some(predicate) => graph.holds(&predicate, &this, actor).unwrap(),
        None => Some(true),
    }
}

#[test_case("ALL", [true, false, true, false, false] ; "all constrains named implementation only")]
#[test_case("SOME", [true, true, true, true, false] ; "some accepts any unnamed implementation")]
#[test_case("NONE", [false, false, false, false, true] ; "none is not some")]
fn test_quantifier_with_partial_on(quantifier: &str, expected: [bool; 5]) {
    let (graph, actors) = filmography();
    let model = model();
    let filter = json!({
        format!("actedIn_{}", quantifier): { "_on": { "Movie": { "runtime_GT": 100 } } }
    });
    let actual: Vec<bool> = actors
        .iter()
        .map(|a| evaluate_actor(&graph, &model, &filter, *a) == Some(true))
        .collect();
    assert_eq!(actual, expected.to_vec(), "{}", filter);
}

#[test]
fn test_interface_traversal_uses_custom_labels() {
    let (graph, actors) = filmography();
    let model = model();
    let filter = json!({ "actedIn_SOME": { "title": "Heat" } });
    assert_eq!(evaluate_actor(&graph, &model, &filter, actors[0]), Some(true));
    assert_eq!(evaluate_actor(&graph, &model, &filter, actors[3]), Some(false));

    let config = EngineConfig::default();
    let callbacks = CallbackRegistry::new();
    let request = RequestContext::anonymous();
    let operation = Operation::Read {
        target: "Actor".to_string(),
        selection: ResolveTree::field("actors")
            .with_where(filter)
            .with_fields(vec![
                ResolveTree::field("actedIn").with_fields(vec![ResolveTree::field("title")])
            ]),
    };
    let text = Translation::new(&model, &config, &callbacks, &request)
        .translate(&operation)
        .unwrap()
        .render()
        .text;
    assert!(text.contains("MATCH (this)-[:ACTED_IN]->(this0:Film:Movie)"), "{}", text);
    assert_eq!(text.matches(":Film:Movie)").count(), 2, "{}", text);
    assert!(!text.contains("(this0:Movie)"), "{}", text);
}

//! Rendering is deterministic and parameter names are consistent.

use std::collections::BTreeSet;
use std::sync::Arc;

use cyphergen::request::{SortField, SortTarget};
use cyphergen::{
    EngineConfig, Operation, RequestContext, ResolveTree, SchemaModel, TranslationEngine,
};
use regex::Regex;
use serde_json::json;

const SCHEMA: &str = r#"
nodes:
  - name: Movie
    fields:
      - { name: title, type: String }
      - { name: released, type: Int }
    relationships:
      - { field: actors, type: ACTED_IN, direction: IN, target: Actor, properties: ActedIn }
      - { field: director, type: DIRECTED, direction: IN, target: Person, list: false }
    authorization:
      filter:
        - requireAuthentication: false
          where: { node: { released_GT: 1900 } }
  - name: Actor
    fields:
      - { name: name, type: String }
      - { name: born, type: Int }
  - name: Person
    fields:
      - { name: name, type: String }
relationship_properties:
  - name: ActedIn
    fields:
      - { name: roles, type: String, list: true }
"#;

fn engine() -> TranslationEngine {
    let model = SchemaModel::from_yaml_str(SCHEMA).unwrap();
    let config = EngineConfig {
        authorization_enabled: true,
        ..Default::default()
    };
    TranslationEngine::new(Arc::new(model), config)
}

fn nested_read() -> Operation {
    let actors = ResolveTree::field("actors")
        .with_where(json!({ "born_LT": 1970, "name_STARTS_WITH": "K" }))
        .with_sort(vec![SortField::desc("born")])
        .with_limit(3)
        .with_fields(vec![ResolveTree::field("name")]);
    let connection = ResolveTree::field("actorsConnection")
        .with_where(json!({ "edge": { "roles_INCLUDES": "Neo" } }))
        .with_fields(vec![
            ResolveTree::field("totalCount"),
            ResolveTree::field("edges").with_fields(vec![
                ResolveTree::field("properties").with_fields(vec![ResolveTree::field("roles")]),
                ResolveTree::field("node").with_fields(vec![ResolveTree::field("name")]),
            ]),
        ]);
    let aggregate =
        ResolveTree::field("actorsAggregate").with_fields(vec![ResolveTree::field("count")]);
    Operation::Read {
        target: "Movie".to_string(),
        selection: ResolveTree::field("movies")
            .with_where(json!({
                "OR": [{ "title": "The Matrix" }, { "released_GTE": 1999 }],
                "actors_SOME": { "name": "Keanu Reeves" },
                "director": { "name_NOT": "Nobody" }
            }))
            .with_sort(vec![SortField::asc("title")])
            .with_offset(1)
            .with_fields(vec![
                ResolveTree::field("title"),
                actors,
                connection,
                aggregate,
                ResolveTree::field("director").with_fields(vec![ResolveTree::field("name")]),
            ]),
    }
}

#[test]
fn test_rendering_is_byte_identical() {
    let engine = engine();
    let request = RequestContext::anonymous();
    let first = engine.translate(&nested_read(), &request).unwrap();
    let second = engine.translate(&nested_read(), &request).unwrap();
    assert_eq!(first.text, second.text);
    assert_eq!(first.params, second.params);
    assert_eq!(
        serde_json::to_string(&first.params).unwrap(),
        serde_json::to_string(&second.params).unwrap()
    );
}

#[test]
fn test_parameter_names_match_map() {
    let engine = engine();
    let query = engine
        .translate(&nested_read(), &RequestContext::anonymous())
        .unwrap();

    let reference = Regex::new(r"\$(param\d+)").unwrap();
    let referenced: BTreeSet<String> = reference
        .captures_iter(&query.text)
        .map(|c| c[1].to_string())
        .collect();
    let declared: BTreeSet<String> = query.params.keys().cloned().collect();

    assert_eq!(referenced, declared);
    assert_eq!(declared.len(), query.params.len());
    assert!(declared.len() >= 8, "expected every literal to be bound: {}", query.text);
}

#[test]
fn test_sort_targets_default_to_node() {
    let sort = SortField::desc("born");
    assert_eq!(sort.target, SortTarget::Node);
    assert_eq!(sort.on_edge().target, SortTarget::Edge);
}

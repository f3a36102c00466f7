//! Interface and union targets, at the root and behind relationships.

use std::sync::Arc;

use cyphergen::{
    EngineConfig, Operation, RequestContext, ResolveTree, SchemaModel, TranslateError,
    TranslationEngine,
};
use serde_json::json;

const SCHEMA: &str = r#"
nodes:
  - name: Movie
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
      - { field: favourite, type: LIKES, direction: OUT, target: Media, list: false }
interfaces:
  - name: Production
    implementations: [Movie, Series]
    fields:
      - { name: title, type: String }
unions:
  - name: Media
    members: [Movie, Series]
"#;

fn engine() -> TranslationEngine {
    let model = SchemaModel::from_yaml_str(SCHEMA).unwrap();
    TranslationEngine::new(Arc::new(model), EngineConfig::default())
}

fn translate(operation: &Operation) -> Result<String, TranslateError> {
    engine()
        .translate(operation, &RequestContext::anonymous())
        .map(|q| q.text)
}

#[test]
fn test_union_root_read_selects_named_members() {
    let operation = Operation::Read {
        target: "Media".to_string(),
        selection: ResolveTree::field("media")
            .with_where(json!({ "Series": { "episodes_GT": 10 } }))
            .on_type("Series", vec![ResolveTree::field("title")]),
    };
    let text = translate(&operation).unwrap();
    let expected = [
        "CALL {",
        "    MATCH (this0:Series)",
        "    WHERE this0.episodes > $param0",
        "    RETURN this0 { __resolveType: \"Series\", .title } AS this",
        "}",
        "RETURN this",
    ]
    .join("\n");
    assert_eq!(text, expected);
}

#[test]
fn test_union_filter_rejects_unknown_member() {
    let operation = Operation::Read {
        target: "Media".to_string(),
        selection: ResolveTree::field("media").with_where(json!({ "Actor": {} })),
    };
    let err = translate(&operation).unwrap_err();
    assert!(err.is_schema_reference());
}

#[test]
fn test_interface_relationship_filter_covers_every_implementation() {
    let operation = Operation::Read {
        target: "Actor".to_string(),
        selection: ResolveTree::field("actors")
            .with_where(json!({ "actedIn_SOME": { "title": "Heat" } }))
            .with_fields(vec![ResolveTree::field("name")]),
    };
    let text = translate(&operation).unwrap();
    assert!(text.contains("MATCH (this)-[:ACTED_IN]->(this0:Movie)"), "{}", text);
    assert!(text.contains("MATCH (this)-[:ACTED_IN]->(this1:Series)"), "{}", text);
    assert!(text.contains(" OR "), "{}", text);
}

#[test]
fn test_interface_relationship_projection_is_a_union_subquery() {
    let operation = Operation::Read {
        target: "Actor".to_string(),
        selection: ResolveTree::field("actors").with_fields(vec![ResolveTree::field("actedIn")
            .with_fields(vec![ResolveTree::field("title")])
            .on_type("Movie", vec![ResolveTree::field("runtime")])]),
    };
    let text = translate(&operation).unwrap();
    assert!(text.contains("\n        UNION ALL\n"), "{}", text);
    assert!(text.contains("__resolveType: \"Movie\", .title, .runtime"), "{}", text);
    assert!(text.contains("__resolveType: \"Series\", .title"), "{}", text);
    assert!(text.contains("RETURN collect(var"), "{}", text);
    assert!(text.contains("\nRETURN this { actedIn: var"), "{}", text);
}

#[test]
fn test_polymorphic_aggregation_rejects_where() {
    let operation = Operation::Read {
        target: "Actor".to_string(),
        selection: ResolveTree::field("actors").with_fields(vec![ResolveTree::field(
            "actedInAggregate",
        )
        .with_where(json!({ "title": "Heat" }))
        .with_fields(vec![ResolveTree::field("count")])]),
    };
    assert!(matches!(
        translate(&operation),
        Err(TranslateError::UnsupportedSelection(_))
    ));
}

#[test]
fn test_interface_root_read_unions_all_rows() {
    let operation = Operation::Read {
        target: "Production".to_string(),
        selection: ResolveTree::field("productions").with_fields(vec![ResolveTree::field("title")]),
    };
    let text = translate(&operation).unwrap();
    let expected = [
        "CALL {",
        "    MATCH (this0:Movie)",
        "    RETURN this0 { __resolveType: \"Movie\", .title } AS this",
        "    UNION ALL",
        "    MATCH (this1:Series)",
        "    RETURN this1 { __resolveType: \"Series\", .title } AS this",
        "}",
        "RETURN this",
    ]
    .join("\n");
    assert_eq!(text, expected);
}

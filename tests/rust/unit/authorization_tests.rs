//! Authorization rules executed against a fixture graph.

use cyphergen::config::EngineConfig;
use cyphergen::request::{Operation, RequestContext, ResolveTree};
use cyphergen::schema_model::SchemaModel;
use cyphergen::translate::{CallbackRegistry, TranslateError, Translation};
use serde_json::json;

use super::fixture_graph::{EvalError, FixtureGraph};

const SCHEMA: &str = r#"
nodes:
  - name: Post
    fields:
      - { name: title, type: String }
      - { name: ownerId, type: String }
    authorization:
      validate:
        - operations: [READ]
          where: { node: { ownerId: "$jwt.id" } }
  - name: Draft
    fields:
      - { name: title, type: String }
      - { name: ownerId, type: String }
    authorization:
      filter:
        - where: { node: { ownerId: "$jwt.sub" } }
  - name: Secret
    fields:
      - { name: title, type: String }
    authentication:
      operations: [READ]
      jwt: { roles_INCLUDES: admin }
  - name: Report
    fields:
      - { name: title, type: String }
    authorization:
      validate:
        - operations: [READ]
          where: { jwt: { roles_INCLUDES: admin } }
  - name: Note
    fields:
      - { name: title, type: String }
      - { name: ownerId, type: String }
      - { name: public, type: Boolean }
    authorization:
      filter:
        - where: { node: { ownerId: "$jwt.sub" } }
        - where: { node: { public: true } }
  - name: Ledger
    fields:
      - { name: title, type: String }
      - { name: ownerId, type: String }
      - { name: locked, type: Boolean }
    authorization:
      validate:
        - operations: [READ]
          where: { node: { ownerId: "$jwt.sub" } }
        - operations: [READ]
          where: { node: { locked: false } }
"#;

fn config() -> EngineConfig {
    let mut config = EngineConfig {
        authorization_enabled: true,
        ..Default::default()
    };
    config
        .jwt_claims
        .insert("roles".to_string(), "realm_access.roles".to_string());
    config
}

fn read(target: &str) -> Operation {
    Operation::Read {
        target: target.to_string(),
        selection: ResolveTree::field("items").with_fields(vec![ResolveTree::field("title")]),
    }
}

fn translate(
    operation: &Operation,
    request: &RequestContext,
) -> Result<cyphergen::cypher::Query, TranslateError> {
    let model = SchemaModel::from_yaml_str(SCHEMA).unwrap();
    let config = config();
    let callbacks = CallbackRegistry::new();
    Translation::new(&model, &config, &callbacks, request).translate(operation)
}

fn graph_with(label: &str, owner: &str) -> FixtureGraph {
    let mut graph = FixtureGraph::new();
    graph.add_node(label, json!({ "title": "Hello", "ownerId": owner }));
    graph
}

#[test]
fn test_validate_forbids_other_owner() {
    let request = RequestContext::authenticated(json!({ "id": "u1" }));
    let query = translate(&read("Post"), &request).unwrap();

    let mut foreign = graph_with("Post", "u2");
    assert_eq!(foreign.execute(&query), Err(EvalError::Raised("Forbidden".to_string())));

    let mut own = graph_with("Post", "u1");
    let rows = own.execute(&query).unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn test_validate_requires_authentication() {
    let err = translate(&read("Post"), &RequestContext::anonymous()).unwrap_err();
    assert_eq!(err, TranslateError::Unauthenticated);
}

#[test]
fn test_filter_rule_hides_foreign_rows() {
    let mut graph = FixtureGraph::new();
    graph.add_node("Draft", json!({ "title": "Mine", "ownerId": "u1" }));
    graph.add_node("Draft", json!({ "title": "Theirs", "ownerId": "u2" }));

    let request = RequestContext::authenticated(json!({ "sub": "u1" }));
    let query = translate(&read("Draft"), &request).unwrap();
    assert_eq!(graph.execute(&query).unwrap().len(), 1);

    let anonymous = translate(&read("Draft"), &RequestContext::anonymous()).unwrap();
    assert!(anonymous.render().text.contains("WHERE false"));
    assert!(graph.execute(&anonymous).unwrap().is_empty());
}

#[test]
fn test_authentication_with_aliased_claim() {
    let admin = RequestContext::authenticated(json!({ "realm_access": { "roles": ["admin"] } }));
    assert!(translate(&read("Secret"), &admin).is_ok());

    let reader = RequestContext::authenticated(json!({ "realm_access": { "roles": ["reader"] } }));
    assert_eq!(
        translate(&read("Secret"), &reader).unwrap_err(),
        TranslateError::Unauthenticated
    );
    assert_eq!(
        translate(&read("Secret"), &RequestContext::anonymous()).unwrap_err(),
        TranslateError::Unauthenticated
    );
}

#[test]
fn test_validate_failing_on_claims_only_fires_on_rows() {
    let user = RequestContext::authenticated(json!({ "realm_access": { "roles": ["user"] } }));
    let query = translate(&read("Report"), &user).unwrap();

    let mut empty = FixtureGraph::new();
    assert_eq!(empty.execute(&query), Ok(vec![]));

    let mut reports = graph_with("Report", "u1");
    assert_eq!(reports.execute(&query), Err(EvalError::Raised("Forbidden".to_string())));

    let admin = RequestContext::authenticated(json!({ "realm_access": { "roles": ["admin"] } }));
    let query = translate(&read("Report"), &admin).unwrap();
    assert_eq!(reports.execute(&query).unwrap().len(), 1);
}

#[test]
fn test_filter_rules_are_alternatives() {
    let mut graph = FixtureGraph::new();
    graph.add_node("Note", json!({ "title": "Mine", "ownerId": "u1", "public": false }));
    graph.add_node("Note", json!({ "title": "Shared", "ownerId": "u2", "public": true }));
    graph.add_node("Note", json!({ "title": "Hidden", "ownerId": "u2", "public": false }));

    let request = RequestContext::authenticated(json!({ "sub": "u1" }));
    let query = translate(&read("Note"), &request).unwrap();
    assert!(query.render().text.contains(" OR "));
    assert_eq!(graph.execute(&query).unwrap().len(), 2);

    let other = RequestContext::authenticated(json!({ "sub": "u3" }));
    let query = translate(&read("Note"), &other).unwrap();
    assert_eq!(graph.execute(&query).unwrap().len(), 1);
}

#[test]
fn test_validate_rules_must_all_hold() {
    let request = RequestContext::authenticated(json!({ "sub": "u1" }));
    let query = translate(&read("Ledger"), &request).unwrap();
    let forbidden = Err(EvalError::Raised("Forbidden".to_string()));

    let mut open_own = FixtureGraph::new();
    open_own.add_node("Ledger", json!({ "title": "Q1", "ownerId": "u1", "locked": false }));
    assert_eq!(open_own.execute(&query).unwrap().len(), 1);

    let mut locked_own = FixtureGraph::new();
    locked_own.add_node("Ledger", json!({ "title": "Q2", "ownerId": "u1", "locked": true }));
    assert_eq!(locked_own.execute(&query), forbidden);

    let mut open_foreign = FixtureGraph::new();
    open_foreign.add_node("Ledger", json!({ "title": "Q3", "ownerId": "u2", "locked": false }));
    assert_eq!(open_foreign.execute(&query), forbidden);
}

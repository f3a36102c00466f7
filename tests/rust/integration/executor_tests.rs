//! Engine execution through a mocked executor, with schema and
//! configuration loaded from files.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use cyphergen::{
    CypherExecutor, CypherQuery, EngineConfig, EngineError, ExecutorError, Operation,
    RequestContext, ResolveTree, SchemaModel, TranslateError, TranslationEngine,
};
use mockall::mock;
use serde_json::{json, Value};

mock! {
    pub Executor {}

    #[async_trait]
    impl CypherExecutor for Executor {
        async fn run(&self, query: &CypherQuery) -> Result<Vec<Value>, ExecutorError>;
    }
}

const SCHEMA: &str = r#"
nodes:
  - name: Post
    fields:
      - { name: title, type: String }
      - { name: authorId, type: String }
    authorization:
      filter:
        - where: { node: { authorId: "$jwt.sub" } }
"#;

const CONFIG: &str = "authorization_enabled: true\nmax_depth: 8\n";

fn engine_from_files() -> TranslationEngine {
    let mut schema = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    schema.write_all(SCHEMA.as_bytes()).unwrap();
    let mut config = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    config.write_all(CONFIG.as_bytes()).unwrap();

    let model = SchemaModel::from_file(schema.path()).unwrap();
    let config = EngineConfig::from_yaml_file(config.path()).unwrap();
    TranslationEngine::new(Arc::new(model), config)
}

fn read_posts() -> Operation {
    Operation::Read {
        target: "Post".to_string(),
        selection: ResolveTree::field("posts").with_fields(vec![ResolveTree::field("title")]),
    }
}

#[tokio::test]
async fn test_execute_sends_authorized_query() {
    let engine = engine_from_files();
    assert_eq!(engine.config().max_depth, 8);

    let mut executor = MockExecutor::new();
    executor
        .expect_run()
        .withf(|query: &CypherQuery| {
            query.text.starts_with("MATCH (this:Post)\nWHERE this.authorId = $param")
                && query.text.ends_with("RETURN this { .title } AS this")
                && query.params.values().any(|v| v == &json!("user-1"))
        })
        .times(1)
        .returning(|_| Ok(vec![json!({ "this": { "title": "Hello" } })]));

    let request = RequestContext::authenticated(json!({ "sub": "user-1" }));
    let records = engine.execute(&executor, &read_posts(), &request).await.unwrap();
    assert_eq!(records, vec![json!({ "this": { "title": "Hello" } })]);
}

#[tokio::test]
async fn test_execute_propagates_database_errors() {
    let engine = engine_from_files();
    let mut executor = MockExecutor::new();
    executor.expect_run().returning(|_| {
        Err(ExecutorError::Query(
            "Neo.ClientError.Statement.SyntaxError".to_string(),
        ))
    });

    let request = RequestContext::authenticated(json!({ "sub": "user-1" }));
    let err = engine.execute(&executor, &read_posts(), &request).await.unwrap_err();
    assert!(matches!(err, EngineError::Executor(ExecutorError::Query(_))));
}

#[tokio::test]
async fn test_translation_errors_never_reach_executor() {
    let engine = engine_from_files();
    let mut executor = MockExecutor::new();
    executor.expect_run().times(0);

    let operation = Operation::Read {
        target: "Post".to_string(),
        selection: ResolveTree::field("posts").with_fields(vec![ResolveTree::field("body")]),
    };
    let err = engine
        .execute(&executor, &operation, &RequestContext::anonymous())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Translate(TranslateError::unknown_field("Post", "body"))
    );
}

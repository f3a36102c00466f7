//! Cyphergen - graph API to Cypher translation engine
//!
//! This crate compiles a directive-annotated graph schema plus a parsed client
//! request into a single parameterized Cypher query:
//! - Nested filtering with relationship quantifiers and aggregates
//! - Interface and union traversal
//! - Authorization and authentication rule injection
//! - Projections, aggregations and connections

pub mod config;
pub mod cypher;
pub mod engine;
pub mod executor;
pub mod request;
pub mod schema_model;
pub mod translate;

pub use config::EngineConfig;
pub use cypher::CypherQuery;
pub use engine::{EngineError, TranslationEngine};
pub use executor::{CypherExecutor, ExecutorError};
pub use request::{Operation, RequestContext, ResolveTree};
pub use schema_model::{SchemaDefinition, SchemaModel};
pub use translate::{CallbackRegistry, CallbackValue, TranslateError};

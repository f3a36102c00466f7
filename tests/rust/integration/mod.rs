//! Integration tests - translations through the public engine API
//!
//! Schemas are loaded from YAML (inline or from temporary files) and the
//! database side is mocked; no Neo4j instance is required.

mod executor_tests;
mod polymorphic_tests;
mod scenario_tests;

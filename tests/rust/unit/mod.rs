//! Unit tests - semantic checks of translated queries
//!
//! Translated predicates and writes are evaluated against an in-memory
//! fixture graph; no database is required.


mod authorization_tests;
mod determinism_tests;
mod filter_semantics_tests;
mod polymorphic_semantics_tests;
mod write_semantics_tests;

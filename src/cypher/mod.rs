//! Cypher AST and renderer.
//!
//! Translators build a tree of clauses, predicates and expressions; the tree
//! is rendered exactly once into text plus a parameter map.

pub mod clause;
pub mod expr;
pub mod pattern;
pub mod predicate;
pub mod render;
pub mod variable;

pub use clause::{Call, Clause, Match, Order, OrderItem, Projection, Query, ReturnItem, With};
pub use expr::{ArithmeticOp, CaseExpr, Expr, FunctionCall, MapProjectionEntry};
pub use pattern::{NodePattern, Pattern, PatternDirection, RelationshipPattern};
pub use predicate::{CompareOp, Predicate};
pub use render::{escape_name, CypherQuery, RenderEnv, ToCypher};
pub use variable::{Param, Variable};

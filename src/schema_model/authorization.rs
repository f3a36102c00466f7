//! Declarative authorization rules attached to node types.
//!
//! Rules are resolved once into these closed variants when the model is
//! built; the translation layer never inspects raw directive arguments.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationOperation {
    Read,
    Aggregate,
    Create,
    Update,
    Delete,
    CreateRelationship,
    DeleteRelationship,
}

impl AuthorizationOperation {
    pub fn all() -> Vec<AuthorizationOperation> {
        vec![
            AuthorizationOperation::Read,
            AuthorizationOperation::Aggregate,
            AuthorizationOperation::Create,
            AuthorizationOperation::Update,
            AuthorizationOperation::Delete,
            AuthorizationOperation::CreateRelationship,
            AuthorizationOperation::DeleteRelationship,
        ]
    }

    /// Filter rules cannot narrow a CREATE: there is nothing to match yet.
    pub fn filterable() -> Vec<AuthorizationOperation> {
        AuthorizationOperation::all()
            .into_iter()
            .filter(|op| *op != AuthorizationOperation::Create)
            .collect()
    }
}

/// When a validate rule is asserted relative to the write it guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationPhase {
    Before,
    After,
}

/// Where-shaped condition of a rule. `node` is compiled against the node
/// being authorized, `jwt` is evaluated against the decoded claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationWhere {
    #[serde(default)]
    pub node: Option<Map<String, Value>>,
    #[serde(default)]
    pub jwt: Option<Map<String, Value>>,
    #[serde(default, rename = "AND")]
    pub and: Option<Vec<AuthorizationWhere>>,
    #[serde(default, rename = "OR")]
    pub or: Option<Vec<AuthorizationWhere>>,
    #[serde(default, rename = "NOT")]
    pub not: Option<Box<AuthorizationWhere>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    #[serde(default = "AuthorizationOperation::filterable")]
    pub operations: Vec<AuthorizationOperation>,
    #[serde(default = "default_true")]
    pub require_authentication: bool,
    #[serde(rename = "where")]
    pub condition: AuthorizationWhere,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRule {
    #[serde(default = "AuthorizationOperation::all")]
    pub operations: Vec<AuthorizationOperation>,
    #[serde(default = "default_phases")]
    pub when: Vec<ValidationPhase>,
    #[serde(default = "default_true")]
    pub require_authentication: bool,
    #[serde(rename = "where")]
    pub condition: AuthorizationWhere,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Authorization {
    #[serde(default)]
    pub filter: Vec<FilterRule>,
    #[serde(default)]
    pub validate: Vec<ValidateRule>,
}

impl Authorization {
    pub fn filter_rules(&self, operation: AuthorizationOperation) -> Vec<&FilterRule> {
        self.filter
            .iter()
            .filter(|rule| rule.operations.contains(&operation))
            .collect()
    }

    pub fn validate_rules(
        &self,
        operation: AuthorizationOperation,
        phase: ValidationPhase,
    ) -> Vec<&ValidateRule> {
        self.validate
            .iter()
            .filter(|rule| rule.operations.contains(&operation) && rule.when.contains(&phase))
            .collect()
    }
}

/// `@authentication`: the operation requires a valid authentication context,
/// optionally with claims matching `jwt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticationRule {
    #[serde(default = "AuthorizationOperation::all")]
    pub operations: Vec<AuthorizationOperation>,
    #[serde(default)]
    pub jwt: Option<Map<String, Value>>,
}

fn default_true() -> bool {
    true
}

fn default_phases() -> Vec<ValidationPhase> {
    vec![ValidationPhase::Before, ValidationPhase::After]
}

//! Relationship and connection filters with list quantifiers.
//!
//! Every concrete type behind the relationship target gets its own branch:
//! a pattern from the parent plus the predicate compiled for that type.
//! A plain node target has exactly one branch.

use serde_json::{Map, Value};

use super::{expect_object, CompiledFilter, FilterCompiler, FilterOperator, FilterTarget};
use crate::cypher::{
    ArithmeticOp, CompareOp, Expr, Match, Pattern, Predicate, Query, Variable,
};
use crate::schema_model::{EntityRef, Node, Relationship, RelationshipProperties};
use crate::translate::errors::TranslateError;
use crate::translate::planner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipQuantifier {
    Some,
    All,
    None,
    Single,
}

impl RelationshipQuantifier {
    pub(super) fn from_operator(op: FilterOperator, key: &str) -> Result<Self, TranslateError> {
        match op {
            FilterOperator::Eq | FilterOperator::Some => Ok(RelationshipQuantifier::Some),
            FilterOperator::Not | FilterOperator::None => Ok(RelationshipQuantifier::None),
            FilterOperator::All => Ok(RelationshipQuantifier::All),
            FilterOperator::Single => Ok(RelationshipQuantifier::Single),
            other => Err(TranslateError::unsupported_filter(format!(
                "{:?} cannot be applied to relationship filter '{}'",
                other, key
            ))),
        }
    }
}

struct Branch {
    pattern: Pattern,
    target: Variable,
    filter: CompiledFilter,
}

impl Branch {
    fn constrained(&self) -> bool {
        self.filter.predicate.is_some()
    }

    /// `EXISTS { MATCH pattern WHERE [NOT] predicate }`
    fn exists(&self, negate: bool) -> Predicate {
        let predicate = match (&self.filter.predicate, negate) {
            (Some(p), true) => Some(Predicate::not(p.clone())),
            (p, _) => p.clone(),
        };
        let filter = CompiledFilter {
            predicate,
            preceding: self.filter.preceding.clone(),
        };
        Predicate::exists(Query::new(filter.apply(Match::new(self.pattern.clone()))))
    }

    /// `[pattern WHERE predicate | projection]`
    fn comprehension(&self, projection: Expr) -> Expr {
        Expr::pattern_comprehension(
            self.pattern.clone(),
            self.filter.predicate.clone(),
            projection,
        )
    }
}

impl<'t, 'a> FilterCompiler<'t, 'a> {
    pub(super) fn compile_relationship(
        &mut self,
        rel: &'a Relationship,
        quantifier: RelationshipQuantifier,
        value: &Value,
        parent: &Variable,
        connection: bool,
    ) -> Result<Predicate, TranslateError> {
        let _guard = self.tx.enter()?;

        if value.is_null() {
            let branches = self.branches(rel, None, parent, connection)?;
            let any = Predicate::or(branches.iter().map(|b| b.exists(false)));
            return match quantifier {
                RelationshipQuantifier::Some => Ok(Predicate::not(any)),
                RelationshipQuantifier::None => Ok(any),
                other => Err(TranslateError::unsupported_filter(format!(
                    "{:?} on '{}' does not accept null",
                    other, rel.field_name
                ))),
            };
        }

        let filter = expect_object(&rel.field_name, value)?;
        let branches = self.branches(rel, Some(filter), parent, connection)?;
        log::debug!(
            "Relationship filter {}.{} {:?} over {} branch(es)",
            rel.source,
            rel.field_name,
            quantifier,
            branches.len()
        );

        let predicate = match quantifier {
            RelationshipQuantifier::Some => some(&branches),
            RelationshipQuantifier::None => Predicate::not(some(&branches)),
            RelationshipQuantifier::All => all(&branches),
            RelationshipQuantifier::Single => single(&branches, connection, &rel.field_name)?,
        };
        Ok(predicate)
    }

    fn branches(
        &self,
        rel: &'a Relationship,
        filter: Option<&Map<String, Value>>,
        parent: &Variable,
        connection: bool,
    ) -> Result<Vec<Branch>, TranslateError> {
        let edge_properties = self.tx.model.edge_properties(rel);
        let target = self.tx.entity(&rel.target)?;

        let mut branches = Vec::new();
        match target {
            EntityRef::Node(node) => {
                branches.push(self.branch(
                    rel,
                    node,
                    FilterTarget::Node(node),
                    filter,
                    parent,
                    connection,
                    edge_properties,
                )?);
            }
            EntityRef::Composite(composite) if composite.is_interface() => {
                for node in self.tx.model.concrete_nodes(&composite.name) {
                    let target = FilterTarget::Implementation {
                        interface: composite,
                        node,
                    };
                    branches.push(self.branch(
                        rel,
                        node,
                        target,
                        filter,
                        parent,
                        connection,
                        edge_properties,
                    )?);
                }
            }
            EntityRef::Composite(union) => {
                if let Some(filter) = filter {
                    for member in filter.keys() {
                        if !union.members.contains(member) {
                            return Err(TranslateError::unknown_field(&union.name, member));
                        }
                    }
                }
                let named_only = filter.is_some_and(|f| !f.is_empty());
                for node in self.tx.model.concrete_nodes(&union.name) {
                    let member_filter = match filter.and_then(|f| f.get(&node.name)) {
                        Some(value) => Some(expect_object(&node.name, value)?),
                        None if named_only => continue,
                        None => None,
                    };
                    branches.push(self.branch(
                        rel,
                        node,
                        FilterTarget::Node(node),
                        member_filter,
                        parent,
                        connection,
                        edge_properties,
                    )?);
                }
            }
        }
        Ok(branches)
    }

    #[allow(clippy::too_many_arguments)]
    fn branch(
        &self,
        rel: &Relationship,
        node: &'a Node,
        target: FilterTarget<'a>,
        filter: Option<&Map<String, Value>>,
        parent: &Variable,
        connection: bool,
        edge_properties: Option<&'a RelationshipProperties>,
    ) -> Result<Branch, TranslateError> {
        let target_var = Variable::node();
        let edge_var = connection.then(Variable::relationship);
        let pattern = planner::relationship_pattern(
            parent,
            rel,
            edge_var.as_ref(),
            &target_var,
            &node.labels,
        );

        let mut nested = self.nested();
        let predicate = match (filter, &edge_var) {
            (None, _) => None,
            (Some(filter), Some(edge_var)) => {
                nested.compile_connection(filter, &target_var, target, edge_var, edge_properties)?
            }
            (Some(filter), None) => nested.compile(filter, &target_var, target)?,
        };
        Ok(Branch {
            pattern,
            target: target_var,
            filter: nested.finish(predicate),
        })
    }

    /// `{ node: {...}, edge: {...}, AND, OR, NOT }`
    pub(super) fn compile_connection(
        &mut self,
        filter: &Map<String, Value>,
        node_var: &Variable,
        node_target: FilterTarget<'a>,
        edge_var: &Variable,
        edge_properties: Option<&'a RelationshipProperties>,
    ) -> Result<Option<Predicate>, TranslateError> {
        let mut predicates = Vec::new();
        for (key, value) in filter {
            let predicate = match key.as_str() {
                "node" => self.compile(expect_object(key, value)?, node_var, node_target)?,
                "edge" => {
                    let properties = edge_properties.ok_or_else(|| {
                        TranslateError::unknown_field(node_target.type_name(), "edge")
                    })?;
                    let nested = expect_object(key, value)?;
                    self.compile(nested, edge_var, FilterTarget::Edge(properties))?
                }
                "AND" | "OR" => {
                    let items = value.as_array().ok_or_else(|| {
                        TranslateError::unsupported_filter(format!("{} expects a list", key))
                    })?;
                    let mut operands = Vec::new();
                    for item in items {
                        let operand = self.compile_connection(
                            expect_object(key, item)?,
                            node_var,
                            node_target,
                            edge_var,
                            edge_properties,
                        )?;
                        operands.push(operand.unwrap_or(Predicate::Literal(true)));
                    }
                    Some(if key == "AND" {
                        Predicate::and(operands)
                    } else {
                        Predicate::or(operands)
                    })
                }
                "NOT" => self
                    .compile_connection(
                        expect_object(key, value)?,
                        node_var,
                        node_target,
                        edge_var,
                        edge_properties,
                    )?
                    .map(Predicate::not),
                other => return Err(TranslateError::unknown_field(node_target.type_name(), other)),
            };
            predicates.extend(predicate);
        }
        Ok(Predicate::and_opt(predicates.into_iter().map(Some)))
    }
}

fn some(branches: &[Branch]) -> Predicate {
    Predicate::or(branches.iter().map(|b| b.exists(false)))
}

/// At least one constrained branch has a match, and no constrained branch has
/// a related entity violating its predicate. Unconstrained branches impose
/// nothing; with no constraint at all the quantifier holds trivially.
fn all(branches: &[Branch]) -> Predicate {
    let constrained: Vec<&Branch> = branches.iter().filter(|b| b.constrained()).collect();
    if constrained.is_empty() {
        return Predicate::Literal(true);
    }
    let exists_any = Predicate::or(constrained.iter().map(|b| b.exists(false)));
    let none_violating = Predicate::and(constrained.iter().map(|b| Predicate::not(b.exists(true))));
    Predicate::and([exists_any, none_violating])
}

fn single(branches: &[Branch], connection: bool, field: &str) -> Result<Predicate, TranslateError> {
    if branches.iter().any(|b| b.filter.has_preceding()) {
        return Err(TranslateError::unsupported_filter(format!(
            "SINGLE on '{}' cannot contain aggregation filters",
            field
        )));
    }

    if let [branch] = branches {
        if !connection {
            let element = Variable::value();
            return Ok(Predicate::single(
                element,
                branch.comprehension(branch.target.expr()),
                Predicate::Literal(true),
            ));
        }
    }

    // Edge properties are invisible to single(); count matches instead
    let total = branches
        .iter()
        .map(|b| b.comprehension(Expr::literal(1)).size())
        .reduce(|lhs, rhs| Expr::arithmetic(ArithmeticOp::Add, lhs, rhs))
        .unwrap_or(Expr::literal(0));
    Ok(Predicate::compare(CompareOp::Eq, total, Expr::literal(1)))
}

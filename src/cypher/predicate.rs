use super::clause::Query;
use super::expr::Expr;
use super::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::In => "IN",
            CompareOp::Contains => "CONTAINS",
            CompareOp::StartsWith => "STARTS WITH",
            CompareOp::EndsWith => "ENDS WITH",
            CompareOp::Matches => "=~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Literal(bool),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        op: CompareOp,
        lhs: Expr,
        rhs: Expr,
    },
    IsNull(Expr),
    IsNotNull(Expr),
    /// `variable:Label1:Label2`
    HasLabels {
        variable: Variable,
        labels: Vec<String>,
    },
    /// `EXISTS { ... }`
    Exists(Box<Query>),
    /// `single(variable IN list WHERE condition)`
    Single {
        variable: Variable,
        list: Expr,
        condition: Box<Predicate>,
    },
    /// Boolean-valued expression, e.g. a function call
    Expr(Expr),
}

impl Predicate {
    /// Conjunction with constant folding. An empty input is `true`.
    pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut operands = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::Literal(true) => {}
                Predicate::Literal(false) => return Predicate::Literal(false),
                Predicate::And(inner) => operands.extend(inner),
                other => operands.push(other),
            }
        }
        match operands.len() {
            0 => Predicate::Literal(true),
            1 => operands.remove(0),
            _ => Predicate::And(operands),
        }
    }

    /// Disjunction with constant folding. An empty input is `false`.
    pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        let mut operands = Vec::new();
        for predicate in predicates {
            match predicate {
                Predicate::Literal(false) => {}
                Predicate::Literal(true) => return Predicate::Literal(true),
                Predicate::Or(inner) => operands.extend(inner),
                other => operands.push(other),
            }
        }
        match operands.len() {
            0 => Predicate::Literal(false),
            1 => operands.remove(0),
            _ => Predicate::Or(operands),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(predicate: Predicate) -> Predicate {
        match predicate {
            Predicate::Literal(value) => Predicate::Literal(!value),
            Predicate::Not(inner) => *inner,
            Predicate::IsNull(expr) => Predicate::IsNotNull(expr),
            Predicate::IsNotNull(expr) => Predicate::IsNull(expr),
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// AND over optional operands; `None` when every operand is absent.
    pub fn and_opt(predicates: impl IntoIterator<Item = Option<Predicate>>) -> Option<Predicate> {
        let present: Vec<Predicate> = predicates.into_iter().flatten().collect();
        if present.is_empty() {
            None
        } else {
            Some(Predicate::and(present))
        }
    }

    pub fn compare(op: CompareOp, lhs: Expr, rhs: Expr) -> Predicate {
        Predicate::Compare { op, lhs, rhs }
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Predicate {
        Predicate::compare(CompareOp::Eq, lhs, rhs)
    }

    pub fn exists(query: Query) -> Predicate {
        Predicate::Exists(Box::new(query))
    }

    pub fn single(variable: Variable, list: Expr, condition: Predicate) -> Predicate {
        Predicate::Single {
            variable,
            list,
            condition: Box::new(condition),
        }
    }
}

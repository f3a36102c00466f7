use super::expr::Expr;
use super::pattern::Pattern;
use super::predicate::Predicate;
use super::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub expr: Expr,
    pub alias: Option<Variable>,
}

impl ReturnItem {
    pub fn new(expr: Expr) -> Self {
        ReturnItem { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: &Variable) -> Self {
        ReturnItem {
            expr,
            alias: Some(alias.clone()),
        }
    }
}

/// Shared body of `WITH` and `RETURN`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub star: bool,
    pub distinct: bool,
    pub items: Vec<ReturnItem>,
    pub order_by: Vec<OrderItem>,
    pub skip: Option<Expr>,
    pub limit: Option<Expr>,
}

impl Projection {
    pub fn star() -> Self {
        Projection {
            star: true,
            ..Default::default()
        }
    }

    pub fn items(items: Vec<ReturnItem>) -> Self {
        Projection {
            items,
            ..Default::default()
        }
    }

    pub fn variables(variables: &[&Variable]) -> Self {
        Projection::items(
            variables
                .iter()
                .map(|v| ReturnItem::new(v.expr()))
                .collect(),
        )
    }

    pub fn item(mut self, item: ReturnItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn order_by(mut self, order_by: Vec<OrderItem>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn skip(mut self, skip: Option<Expr>) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: Option<Expr>) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_paginated(&self) -> bool {
        !self.order_by.is_empty() || self.skip.is_some() || self.limit.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub patterns: Vec<Pattern>,
    pub condition: Option<Predicate>,
}

impl Match {
    pub fn new(pattern: Pattern) -> Self {
        Match {
            patterns: vec![pattern],
            condition: None,
        }
    }

    pub fn filter(mut self, condition: Option<Predicate>) -> Self {
        self.condition = condition;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct With {
    pub projection: Projection,
    pub condition: Option<Predicate>,
}

impl With {
    pub fn new(projection: Projection) -> Self {
        With {
            projection,
            condition: None,
        }
    }

    /// `WITH * WHERE condition`
    pub fn filter_all(condition: Predicate) -> Self {
        With {
            projection: Projection::star(),
            condition: Some(condition),
        }
    }

    pub fn filter(mut self, condition: Option<Predicate>) -> Self {
        self.condition = condition;
        self
    }
}

/// `CALL { WITH imports ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub imports: Vec<Variable>,
    pub body: Query,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Match(Match),
    With(With),
    Return(Projection),
    Call(Call),
    Unwind { expr: Expr, alias: Variable },
    Create(Pattern),
    Set(Vec<(Expr, Expr)>),
    Remove(Vec<Expr>),
    Delete { detach: bool, variables: Vec<Variable> },
    Union { all: bool, branches: Vec<Query> },
}

impl Clause {
    pub fn call(imports: &[&Variable], body: Query) -> Self {
        Clause::Call(Call {
            imports: imports.iter().map(|v| (*v).clone()).collect(),
            body,
        })
    }

    pub fn with_star_where(condition: Predicate) -> Self {
        Clause::With(With::filter_all(condition))
    }
}

/// An ordered clause sequence. Also the body of CALL and EXISTS subqueries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    pub fn new(clauses: Vec<Clause>) -> Self {
        Query { clauses }
    }

    pub fn then(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn then_all(mut self, clauses: impl IntoIterator<Item = Clause>) -> Self {
        self.clauses.extend(clauses);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl From<Match> for Clause {
    fn from(m: Match) -> Self {
        Clause::Match(m)
    }
}

impl From<With> for Clause {
    fn from(w: With) -> Self {
        Clause::With(w)
    }
}

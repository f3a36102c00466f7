use serde_json::Value;

use super::pattern::Pattern;
use super::predicate::Predicate;
use super::variable::{Param, Variable};

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapProjectionEntry {
    /// `.name` shorthand
    Property(String),
    /// `key: expr`
    Entry(String, Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseExpr {
    pub branches: Vec<(Predicate, Expr)>,
    pub default: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Inline constant generated by the engine itself, never client input
    Literal(Value),

    Param(Param),

    Var(Variable),

    Property(Box<Expr>, String),

    Function(FunctionCall),

    List(Vec<Expr>),

    Map(Vec<(String, Expr)>),

    MapProjection {
        variable: Variable,
        entries: Vec<MapProjectionEntry>,
    },

    Case(CaseExpr),

    /// `[pattern WHERE condition | projection]`
    PatternComprehension {
        pattern: Box<Pattern>,
        condition: Option<Box<Predicate>>,
        projection: Box<Expr>,
    },

    /// `[variable IN list WHERE condition | projection]`
    ListComprehension {
        variable: Variable,
        list: Box<Expr>,
        condition: Option<Box<Predicate>>,
        projection: Option<Box<Expr>>,
    },

    /// `reduce(accumulator = init, variable IN list | step)`
    Reduce {
        accumulator: Variable,
        init: Box<Expr>,
        variable: Variable,
        list: Box<Expr>,
        step: Box<Expr>,
    },

    Arithmetic {
        op: ArithmeticOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// `list[from..to]`
    Slice {
        list: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
    },

    /// Boolean-valued predicate used in expression position
    Predicate(Box<Predicate>),
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn param(value: impl Into<Value>) -> Self {
        Expr::Param(Param::new(value))
    }

    pub fn null() -> Self {
        Expr::Literal(Value::Null)
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function(FunctionCall {
            name: name.into(),
            args,
            distinct: false,
        })
    }

    pub fn property(self, name: impl Into<String>) -> Self {
        Expr::Property(Box::new(self), name.into())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Expr::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn predicate(predicate: Predicate) -> Self {
        Expr::Predicate(Box::new(predicate))
    }

    pub fn pattern_comprehension(
        pattern: Pattern,
        condition: Option<Predicate>,
        projection: Expr,
    ) -> Self {
        Expr::PatternComprehension {
            pattern: Box::new(pattern),
            condition: condition.map(Box::new),
            projection: Box::new(projection),
        }
    }

    pub fn count(self) -> Self {
        Expr::function("count", vec![self])
    }

    pub fn collect(self) -> Self {
        Expr::function("collect", vec![self])
    }

    pub fn size(self) -> Self {
        Expr::function("size", vec![self])
    }

    pub fn head(self) -> Self {
        Expr::function("head", vec![self])
    }

    pub fn arithmetic(op: ArithmeticOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Arithmetic {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn case_when(condition: Predicate, then: Expr, otherwise: Expr) -> Self {
        Expr::Case(CaseExpr {
            branches: vec![(condition, then)],
            default: Some(Box::new(otherwise)),
        })
    }
}

impl From<Variable> for Expr {
    fn from(variable: Variable) -> Self {
        Expr::Var(variable)
    }
}

impl From<&Variable> for Expr {
    fn from(variable: &Variable) -> Self {
        Expr::Var(variable.clone())
    }
}

impl From<Param> for Expr {
    fn from(param: Param) -> Self {
        Expr::Param(param)
    }
}

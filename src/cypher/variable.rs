use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::expr::Expr;

#[derive(Debug)]
enum VariableName {
    Named(String),
    Anonymous(&'static str),
}

/// A query-scoped slot (node, relationship or plain value).
///
/// Identity is the allocation, not the name: two variables created with the
/// same preferred name are distinct and get disambiguated at render time.
/// Cloning shares the identity.
#[derive(Clone)]
pub struct Variable(Rc<VariableName>);

impl Variable {
    /// Variable rendered with exactly this name unless it collides.
    pub fn named(name: impl Into<String>) -> Self {
        Variable(Rc::new(VariableName::Named(name.into())))
    }

    /// Anonymous node variable (`this0`, `this1`, ...).
    pub fn node() -> Self {
        Variable(Rc::new(VariableName::Anonymous("this")))
    }

    /// Anonymous relationship variable; shares the node prefix.
    pub fn relationship() -> Self {
        Variable(Rc::new(VariableName::Anonymous("this")))
    }

    /// Anonymous value variable (`var0`, ...).
    pub fn value() -> Self {
        Variable(Rc::new(VariableName::Anonymous("var")))
    }

    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Preferred name and whether it must be numbered even without collision.
    pub(crate) fn preferred(&self) -> (&str, bool) {
        match self.0.as_ref() {
            VariableName::Named(name) => (name, false),
            VariableName::Anonymous(prefix) => (prefix, true),
        }
    }

    pub fn expr(&self) -> Expr {
        Expr::Var(self.clone())
    }

    pub fn property(&self, name: impl Into<String>) -> Expr {
        Expr::Property(Box::new(self.expr()), name.into())
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, anonymous) = self.preferred();
        if anonymous {
            write!(f, "Variable({}#{:x})", name, self.id())
        } else {
            write!(f, "Variable({})", name)
        }
    }
}

/// A literal bound as a query parameter. Each `Param` owns one entry in the
/// rendered parameter map; occurrences of the same `Param` share it.
#[derive(Clone)]
pub struct Param(Rc<Value>);

impl Param {
    pub fn new(value: impl Into<Value>) -> Self {
        Param(Rc::new(value.into()))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn expr(&self) -> Expr {
        Expr::Param(self.clone())
    }
}

impl PartialEq for Param {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Param({})", self.0)
    }
}

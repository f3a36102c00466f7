use super::expr::Expr;
use super::variable::Variable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternDirection {
    /// `<-[]-`
    Left,
    /// `-[]->`
    Right,
    /// `-[]-`
    Undirected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: Option<Variable>,
    pub labels: Vec<String>,
    pub properties: Vec<(String, Expr)>,
}

impl NodePattern {
    pub fn new(variable: &Variable) -> Self {
        NodePattern {
            variable: Some(variable.clone()),
            labels: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        NodePattern {
            variable: None,
            labels: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn labels(mut self, labels: &[String]) -> Self {
        self.labels = labels.to_vec();
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: Expr) -> Self {
        self.properties.push((key.into(), value));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipPattern {
    pub variable: Option<Variable>,
    pub types: Vec<String>,
    pub direction: PatternDirection,
}

impl RelationshipPattern {
    pub fn new(variable: Option<&Variable>, rel_type: &str, direction: PatternDirection) -> Self {
        RelationshipPattern {
            variable: variable.cloned(),
            types: vec![rel_type.to_string()],
            direction,
        }
    }
}

/// A linear path: a start node followed by relationship/node hops.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub start: NodePattern,
    pub hops: Vec<(RelationshipPattern, NodePattern)>,
}

impl Pattern {
    pub fn node(start: NodePattern) -> Self {
        Pattern {
            start,
            hops: Vec::new(),
        }
    }

    pub fn related(mut self, relationship: RelationshipPattern, node: NodePattern) -> Self {
        self.hops.push((relationship, node));
        self
    }

    /// Variables bound by this pattern, in pattern order.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut vars: Vec<&Variable> = self.start.variable.iter().collect();
        for (rel, node) in &self.hops {
            vars.extend(rel.variable.iter());
            vars.extend(node.variable.iter());
        }
        vars
    }

    pub fn end_variable(&self) -> Option<&Variable> {
        match self.hops.last() {
            Some((_, node)) => node.variable.as_ref(),
            None => self.start.variable.as_ref(),
        }
    }
}

//! Single-pass rendering of the Cypher AST.
//!
//! Variable and parameter names are assigned on first encounter while the
//! tree is walked, so the same tree always renders to the same text and
//! parameter map.

use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use super::clause::{Call, Clause, Match, Order, OrderItem, Projection, Query, ReturnItem, With};
use super::expr::{ArithmeticOp, CaseExpr, Expr, FunctionCall, MapProjectionEntry};
use super::pattern::{NodePattern, Pattern, PatternDirection, RelationshipPattern};
use super::predicate::Predicate;
use super::variable::{Param, Variable};

/// Rendered query text plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    pub text: String,
    pub params: Map<String, Value>,
}

/// Naming state for one render.
#[derive(Debug, Default)]
pub struct RenderEnv {
    variables: HashMap<usize, String>,
    used: HashSet<String>,
    next_variable: usize,
    params: HashMap<usize, String>,
    values: Map<String, Value>,
}

impl RenderEnv {
    pub fn new() -> Self {
        RenderEnv::default()
    }

    pub fn variable_name(&mut self, variable: &Variable) -> String {
        if let Some(name) = self.variables.get(&variable.id()) {
            return name.clone();
        }
        let (preferred, numbered) = variable.preferred();
        let name = if !numbered && !self.used.contains(preferred) {
            preferred.to_string()
        } else {
            loop {
                let candidate = format!("{}{}", preferred, self.next_variable);
                self.next_variable += 1;
                if !self.used.contains(&candidate) {
                    break candidate;
                }
            }
        };
        self.used.insert(name.clone());
        self.variables.insert(variable.id(), name.clone());
        name
    }

    pub fn param_name(&mut self, param: &Param) -> String {
        if let Some(name) = self.params.get(&param.id()) {
            return name.clone();
        }
        let name = format!("param{}", self.params.len());
        self.params.insert(param.id(), name.clone());
        self.values.insert(name.clone(), param.value().clone());
        name
    }

    pub fn into_params(self) -> Map<String, Value> {
        self.values
    }
}

pub trait ToCypher {
    fn to_cypher(&self, env: &mut RenderEnv) -> String;
}

impl Query {
    /// Render the whole tree once.
    pub fn render(&self) -> CypherQuery {
        let mut env = RenderEnv::new();
        let text = self.to_cypher(&mut env);
        CypherQuery {
            text,
            params: env.into_params(),
        }
    }
}

/// Escape a string for a double-quoted Cypher literal.
fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\") // Must be first!
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Backtick-quote labels, types and keys that are not plain identifiers.
pub fn escape_name(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('`', "``"))
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", escape_string(s)),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(render_literal).collect::<Vec<_>>().join(", ")
        ),
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let entries: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", escape_name(k), render_literal(v)))
                .collect();
            format!("{{ {} }}", entries.join(", "))
        }
    }
}

impl ToCypher for Variable {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        env.variable_name(self)
    }
}

impl ToCypher for Expr {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        match self {
            Expr::Literal(value) => render_literal(value),
            Expr::Param(param) => format!("${}", env.param_name(param)),
            Expr::Var(variable) => variable.to_cypher(env),
            Expr::Property(base, name) => format!("{}.{}", base.to_cypher(env), escape_name(name)),
            Expr::Function(call) => call.to_cypher(env),
            Expr::List(items) => {
                let items: Vec<String> = items.iter().map(|e| e.to_cypher(env)).collect();
                format!("[{}]", items.join(", "))
            }
            Expr::Map(entries) => render_map(entries, env),
            Expr::MapProjection { variable, entries } => {
                let name = variable.to_cypher(env);
                if entries.is_empty() {
                    return format!("{} {{ }}", name);
                }
                let rendered: Vec<String> = entries
                    .iter()
                    .map(|entry| match entry {
                        MapProjectionEntry::Property(prop) => format!(".{}", escape_name(prop)),
                        MapProjectionEntry::Entry(key, expr) => {
                            format!("{}: {}", escape_name(key), expr.to_cypher(env))
                        }
                    })
                    .collect();
                format!("{} {{ {} }}", name, rendered.join(", "))
            }
            Expr::Case(case) => case.to_cypher(env),
            Expr::PatternComprehension {
                pattern,
                condition,
                projection,
            } => {
                let mut out = format!("[{}", pattern.to_cypher(env));
                if let Some(condition) = condition {
                    out.push_str(&format!(" WHERE {}", condition.to_cypher(env)));
                }
                out.push_str(&format!(" | {}]", projection.to_cypher(env)));
                out
            }
            Expr::ListComprehension {
                variable,
                list,
                condition,
                projection,
            } => {
                let mut out = format!("[{} IN {}", variable.to_cypher(env), list.to_cypher(env));
                if let Some(condition) = condition {
                    out.push_str(&format!(" WHERE {}", condition.to_cypher(env)));
                }
                if let Some(projection) = projection {
                    out.push_str(&format!(" | {}", projection.to_cypher(env)));
                }
                out.push(']');
                out
            }
            Expr::Reduce {
                accumulator,
                init,
                variable,
                list,
                step,
            } => format!(
                "reduce({} = {}, {} IN {} | {})",
                accumulator.to_cypher(env),
                init.to_cypher(env),
                variable.to_cypher(env),
                list.to_cypher(env),
                step.to_cypher(env)
            ),
            Expr::Arithmetic { op, lhs, rhs } => format!(
                "{} {} {}",
                render_arithmetic_operand(lhs, *op, env),
                op.symbol(),
                render_arithmetic_operand(rhs, *op, env)
            ),
            Expr::Slice { list, from, to } => {
                let list = list.to_cypher(env);
                let from = from.as_ref().map(|e| e.to_cypher(env)).unwrap_or_default();
                let to = to.as_ref().map(|e| e.to_cypher(env)).unwrap_or_default();
                format!("{}[{}..{}]", list, from, to)
            }
            Expr::Predicate(predicate) => match predicate.as_ref() {
                Predicate::Compare { .. } | Predicate::IsNull(_) | Predicate::IsNotNull(_) => {
                    format!("({})", predicate.to_cypher(env))
                }
                other => render_operand(other, env),
            },
        }
    }
}

fn render_arithmetic_operand(expr: &Expr, parent: ArithmeticOp, env: &mut RenderEnv) -> String {
    match expr {
        Expr::Arithmetic { op, .. } if *op != parent => format!("({})", expr.to_cypher(env)),
        other => other.to_cypher(env),
    }
}

fn render_map(entries: &[(String, Expr)], env: &mut RenderEnv) -> String {
    if entries.is_empty() {
        return "{}".to_string();
    }
    let rendered: Vec<String> = entries
        .iter()
        .map(|(key, expr)| format!("{}: {}", escape_name(key), expr.to_cypher(env)))
        .collect();
    format!("{{ {} }}", rendered.join(", "))
}

impl ToCypher for FunctionCall {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let args: Vec<String> = self.args.iter().map(|a| a.to_cypher(env)).collect();
        if self.distinct {
            format!("{}(DISTINCT {})", self.name, args.join(", "))
        } else {
            format!("{}({})", self.name, args.join(", "))
        }
    }
}

impl ToCypher for CaseExpr {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let mut out = String::from("CASE");
        for (condition, value) in &self.branches {
            out.push_str(&format!(
                " WHEN {} THEN {}",
                condition.to_cypher(env),
                value.to_cypher(env)
            ));
        }
        if let Some(default) = &self.default {
            out.push_str(&format!(" ELSE {}", default.to_cypher(env)));
        }
        out.push_str(" END");
        out
    }
}

fn render_operand(predicate: &Predicate, env: &mut RenderEnv) -> String {
    match predicate {
        Predicate::And(_) | Predicate::Or(_) => format!("({})", predicate.to_cypher(env)),
        other => other.to_cypher(env),
    }
}

impl ToCypher for Predicate {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        match self {
            Predicate::Literal(value) => value.to_string(),
            Predicate::And(operands) => {
                let parts: Vec<String> = operands.iter().map(|p| render_operand(p, env)).collect();
                parts.join(" AND ")
            }
            Predicate::Or(operands) => {
                let parts: Vec<String> = operands.iter().map(|p| render_operand(p, env)).collect();
                parts.join(" OR ")
            }
            Predicate::Not(inner) => format!("NOT ({})", inner.to_cypher(env)),
            Predicate::Compare { op, lhs, rhs } => {
                format!("{} {} {}", lhs.to_cypher(env), op.symbol(), rhs.to_cypher(env))
            }
            Predicate::IsNull(expr) => format!("{} IS NULL", expr.to_cypher(env)),
            Predicate::IsNotNull(expr) => format!("{} IS NOT NULL", expr.to_cypher(env)),
            Predicate::HasLabels { variable, labels } => {
                let mut out = variable.to_cypher(env);
                for label in labels {
                    out.push(':');
                    out.push_str(&escape_name(label));
                }
                out
            }
            Predicate::Exists(query) => format!("EXISTS {{\n{}\n}}", indent(&query.to_cypher(env))),
            Predicate::Single {
                variable,
                list,
                condition,
            } => format!(
                "single({} IN {} WHERE {})",
                variable.to_cypher(env),
                list.to_cypher(env),
                condition.to_cypher(env)
            ),
            Predicate::Expr(expr) => expr.to_cypher(env),
        }
    }
}

/// Render a top-level WHERE condition; compound conditions are parenthesized.
fn render_condition(condition: &Predicate, env: &mut RenderEnv) -> String {
    render_operand(condition, env)
}

impl ToCypher for NodePattern {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let mut out = String::from("(");
        if let Some(variable) = &self.variable {
            out.push_str(&variable.to_cypher(env));
        }
        for label in &self.labels {
            out.push(':');
            out.push_str(&escape_name(label));
        }
        if !self.properties.is_empty() {
            out.push(' ');
            out.push_str(&render_map(&self.properties, env));
        }
        out.push(')');
        out
    }
}

impl ToCypher for RelationshipPattern {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let mut inner = String::new();
        if let Some(variable) = &self.variable {
            inner.push_str(&variable.to_cypher(env));
        }
        if !self.types.is_empty() {
            let types: Vec<String> = self.types.iter().map(|t| escape_name(t)).collect();
            inner.push(':');
            inner.push_str(&types.join("|"));
        }
        match self.direction {
            PatternDirection::Left => format!("<-[{}]-", inner),
            PatternDirection::Right => format!("-[{}]->", inner),
            PatternDirection::Undirected => format!("-[{}]-", inner),
        }
    }
}

impl ToCypher for Pattern {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let mut out = self.start.to_cypher(env);
        for (relationship, node) in &self.hops {
            out.push_str(&relationship.to_cypher(env));
            out.push_str(&node.to_cypher(env));
        }
        out
    }
}

impl ToCypher for ReturnItem {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let expr = self.expr.to_cypher(env);
        match &self.alias {
            Some(alias) => {
                let alias = alias.to_cypher(env);
                if alias == expr {
                    expr
                } else {
                    format!("{} AS {}", expr, alias)
                }
            }
            None => expr,
        }
    }
}

impl ToCypher for OrderItem {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let order = match self.order {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        };
        format!("{} {}", self.expr.to_cypher(env), order)
    }
}

fn render_projection(keyword: &str, projection: &Projection, env: &mut RenderEnv) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    if projection.star {
        items.push("*".to_string());
    }
    items.extend(projection.items.iter().map(|item| item.to_cypher(env)));

    let mut head = keyword.to_string();
    if projection.distinct {
        head.push_str(" DISTINCT");
    }
    let mut lines = vec![format!("{} {}", head, items.join(", "))];
    if !projection.order_by.is_empty() {
        let order: Vec<String> = projection.order_by.iter().map(|o| o.to_cypher(env)).collect();
        lines.push(format!("ORDER BY {}", order.join(", ")));
    }
    if let Some(skip) = &projection.skip {
        lines.push(format!("SKIP {}", skip.to_cypher(env)));
    }
    if let Some(limit) = &projection.limit {
        lines.push(format!("LIMIT {}", limit.to_cypher(env)));
    }
    lines
}

impl ToCypher for Match {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let patterns: Vec<String> = self.patterns.iter().map(|p| p.to_cypher(env)).collect();
        let mut out = format!("MATCH {}", patterns.join(", "));
        if let Some(condition) = &self.condition {
            out.push_str(&format!("\nWHERE {}", render_condition(condition, env)));
        }
        out
    }
}

impl ToCypher for With {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let mut lines = render_projection("WITH", &self.projection, env);
        if let Some(condition) = &self.condition {
            lines.push(format!("WHERE {}", render_condition(condition, env)));
        }
        lines.join("\n")
    }
}

impl ToCypher for Call {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let mut body = Vec::new();
        if !self.imports.is_empty() {
            let imports: Vec<String> = self.imports.iter().map(|v| v.to_cypher(env)).collect();
            body.push(format!("WITH {}", imports.join(", ")));
        }
        body.push(self.body.to_cypher(env));
        format!("CALL {{\n{}\n}}", indent(&body.join("\n")))
    }
}

impl ToCypher for Clause {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        match self {
            Clause::Match(m) => m.to_cypher(env),
            Clause::With(w) => w.to_cypher(env),
            Clause::Return(projection) => render_projection("RETURN", projection, env).join("\n"),
            Clause::Call(call) => call.to_cypher(env),
            Clause::Unwind { expr, alias } => {
                format!("UNWIND {} AS {}", expr.to_cypher(env), alias.to_cypher(env))
            }
            Clause::Create(pattern) => format!("CREATE {}", pattern.to_cypher(env)),
            Clause::Set(assignments) => {
                let items: Vec<String> = assignments
                    .iter()
                    .map(|(target, value)| {
                        format!("{} = {}", target.to_cypher(env), value.to_cypher(env))
                    })
                    .collect();
                format!("SET {}", items.join(", "))
            }
            Clause::Remove(targets) => {
                let items: Vec<String> = targets.iter().map(|t| t.to_cypher(env)).collect();
                format!("REMOVE {}", items.join(", "))
            }
            Clause::Delete { detach, variables } => {
                let vars: Vec<String> = variables.iter().map(|v| v.to_cypher(env)).collect();
                let keyword = if *detach { "DETACH DELETE" } else { "DELETE" };
                format!("{} {}", keyword, vars.join(", "))
            }
            Clause::Union { all, branches } => {
                let separator = if *all { "\nUNION ALL\n" } else { "\nUNION\n" };
                let rendered: Vec<String> = branches.iter().map(|b| b.to_cypher(env)).collect();
                rendered.join(separator)
            }
        }
    }
}

impl ToCypher for Query {
    fn to_cypher(&self, env: &mut RenderEnv) -> String {
        let clauses: Vec<String> = self.clauses.iter().map(|c| c.to_cypher(env)).collect();
        clauses.join("\n")
    }
}

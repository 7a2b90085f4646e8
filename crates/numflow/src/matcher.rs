//! Structural AST matching with placeholders
//!
//! `matches` walks a pattern and a candidate in lock-step. Placeholders on
//! either side capture the opposing subtree and report it through the
//! `on_bind` callback; operators never act as placeholders. Operator chains
//! are delegated to [`crate::precedence`], which decides how much of a chain
//! one placeholder absorbs.
//!
//! Matching has no error path. A failed sub-match aborts with `false` and
//! bindings already reported stay with the caller.

use indexmap::IndexMap;
use log::trace;

use crate::ast::{Expression, FunctionCall, Identifier, Operand, Placeholder, PrimaryExpr};
use crate::precedence;

/// Placeholder captures from one successful match, in traversal order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(IndexMap<String, Vec<Expression>>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: &str, expr: Expression) {
        self.0.entry(name.to_string()).or_default().push(expr);
    }

    /// Captures for `name`; empty when the placeholder matched nothing.
    pub fn get(&self, name: &str) -> &[Expression] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Expression])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Match `pattern` against `candidate`.
///
/// `on_bind` is called once per capture; returning `false` vetoes the capture
/// and fails the match.
pub fn matches(
    pattern: &Expression,
    candidate: &Expression,
    on_bind: &mut dyn FnMut(&str, Expression) -> bool,
) -> bool {
    Matcher { on_bind }.expression(pattern, candidate)
}

/// Match and collect the captures, discarding them on failure.
pub fn match_bindings(pattern: &Expression, candidate: &Expression) -> Option<Bindings> {
    let mut bindings = Bindings::new();
    let matched = matches(pattern, candidate, &mut |name, expr| {
        bindings.push(name, expr);
        true
    });
    matched.then_some(bindings)
}

pub(crate) struct Matcher<'b> {
    on_bind: &'b mut dyn FnMut(&str, Expression) -> bool,
}

impl Matcher<'_> {
    pub(crate) fn bind(&mut self, name: &str, captured: Expression) -> bool {
        let captured = captured.into_normalized();
        trace!("bind {name} <- {captured}");
        (self.on_bind)(name, captured)
    }

    pub(crate) fn expression(&mut self, pattern: &Expression, candidate: &Expression) -> bool {
        let pattern = pattern.normalized();
        let candidate = candidate.normalized();
        if let Some(holder) = pattern.placeholder() {
            return self.bind(holder.name, candidate.clone());
        }
        if let Some(holder) = candidate.placeholder() {
            return self.bind(holder.name, pattern.clone());
        }
        precedence::match_chains(self, pattern, candidate)
    }

    pub(crate) fn operand(&mut self, pattern: &Operand, candidate: &Operand) -> bool {
        match (pattern.normalized(), candidate.normalized()) {
            (Operand::Primary(p), Operand::Primary(c)) => self.primary(p, c),
            (Operand::Unary(p), Operand::Unary(c)) => {
                p.op == c.op && self.operand(&p.operand, &c.operand)
            }
            (p, c) => {
                if let Some(holder) = p.placeholder() {
                    self.bind(holder.name, c.clone().into())
                } else if let Some(holder) = c.placeholder() {
                    self.bind(holder.name, p.clone().into())
                } else {
                    trace!("shape mismatch: {p} vs {c}");
                    false
                }
            }
        }
    }

    fn primary(&mut self, pattern: &PrimaryExpr, candidate: &PrimaryExpr) -> bool {
        if let Some(holder) = primary_placeholder(pattern) {
            return self.bind(holder.name, candidate.clone().into());
        }
        if let Some(holder) = primary_placeholder(candidate) {
            return self.bind(holder.name, pattern.clone().into());
        }
        match (pattern, candidate) {
            (PrimaryExpr::Identifier(p), PrimaryExpr::Identifier(c)) => p.name == c.name,
            (PrimaryExpr::Literal(p), PrimaryExpr::Literal(c)) => p == c,
            (PrimaryExpr::Call(p), PrimaryExpr::Call(c)) => self.call(p, c),
            (PrimaryExpr::Paren(p), PrimaryExpr::Paren(c)) => self.expression(p, c),
            _ => false,
        }
    }

    fn identifier(&mut self, pattern: &Identifier, candidate: &Identifier) -> bool {
        if let Some(holder) = pattern.placeholder() {
            return self.bind(holder.name, Expression::identifier(candidate.name.clone()));
        }
        if let Some(holder) = candidate.placeholder() {
            return self.bind(holder.name, Expression::identifier(pattern.name.clone()));
        }
        pattern.name == candidate.name
    }

    fn call(&mut self, pattern: &FunctionCall, candidate: &FunctionCall) -> bool {
        self.identifier(&pattern.name, &candidate.name)
            && self.arguments(&pattern.args, &candidate.args)
    }

    /// Lock-step walk over two argument lists. An ellipsis captures the
    /// current element of the other list and only that list advances.
    fn arguments(&mut self, pattern: &[Expression], candidate: &[Expression]) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < pattern.len() && j < candidate.len() {
            let (p, c) = (&pattern[i], &candidate[j]);
            if let Some(holder) = ellipsis(p) {
                if !self.bind(holder.name, c.clone()) {
                    return false;
                }
                j += 1;
            } else if let Some(holder) = ellipsis(c) {
                if !self.bind(holder.name, p.clone()) {
                    return false;
                }
                i += 1;
            } else {
                if !self.expression(p, c) {
                    return false;
                }
                i += 1;
                j += 1;
            }
        }
        exhausted(&pattern[i..]) && exhausted(&candidate[j..])
    }
}

fn primary_placeholder(primary: &PrimaryExpr) -> Option<Placeholder<'_>> {
    match primary {
        PrimaryExpr::Identifier(ident) => ident.placeholder(),
        _ => None,
    }
}

fn ellipsis(expr: &Expression) -> Option<Placeholder<'_>> {
    expr.placeholder().filter(Placeholder::is_ellipsis)
}

/// Nothing left, or only an ellipsis that may capture nothing.
fn exhausted(rest: &[Expression]) -> bool {
    match rest {
        [] => true,
        [only] => ellipsis(only).is_some(),
        _ => false,
    }
}

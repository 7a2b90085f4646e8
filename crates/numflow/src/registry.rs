//! Registry of primitive call patterns
//!
//! Each entry pairs textual patterns with a factory that builds an
//! execution node from the compiled captures. Patterns are parsed once when
//! registered; entries are tried in registration order.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use log::error;

use crate::ast::{Expression, Operand, PrimaryExpr};
use crate::compile::CompileError;
use crate::parse::{ParseError, parse};
use crate::runtime::Node;

/// Builds a node from `(captures, primitive name, debug label)`
pub type Factory =
    Arc<dyn Fn(&CompiledBindings, &str, &str) -> Result<Node, CompileError> + Send + Sync>;

/// A parsed pattern and the placeholder names it can bind
#[derive(Debug, Clone)]
pub struct Pattern {
    pub expr: Expression,
    placeholders: Vec<String>,
}

impl Pattern {
    pub fn new(expr: Expression) -> Self {
        let mut placeholders = Vec::new();
        collect_placeholders(&expr, &mut placeholders);
        Self { expr, placeholders }
    }

    /// Whether `name` is one of this pattern's own placeholders
    pub fn binds(&self, name: &str) -> bool {
        self.placeholders.iter().any(|p| p == name)
    }
}

fn collect_placeholders(expr: &Expression, out: &mut Vec<String>) {
    collect_from_operand(&expr.first, out);
    for operation in &expr.rest {
        collect_from_operand(&operation.operand, out);
    }
}

fn collect_from_operand(operand: &Operand, out: &mut Vec<String>) {
    match operand {
        Operand::Unary(unary) => collect_from_operand(&unary.operand, out),
        Operand::Primary(PrimaryExpr::Identifier(ident)) => {
            if ident.placeholder().is_some() && !out.contains(&ident.name) {
                out.push(ident.name.clone());
            }
        }
        Operand::Primary(PrimaryExpr::Call(call)) => {
            collect_from_operand(&Operand::Primary(PrimaryExpr::Identifier(call.name.clone())), out);
            for arg in &call.args {
                collect_placeholders(arg, out);
            }
        }
        Operand::Primary(PrimaryExpr::Paren(inner)) => collect_placeholders(inner, out),
        Operand::Primary(PrimaryExpr::Literal(_)) => {}
    }
}

pub struct PatternEntry {
    pub name: String,
    pub patterns: Vec<Pattern>,
    pub factory: Factory,
    pub help: String,
}

#[derive(Default)]
pub struct Registry {
    entries: Vec<PatternEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in primitives, built on first use and shared afterwards.
    pub fn standard() -> Arc<Registry> {
        static STANDARD: OnceLock<Arc<Registry>> = OnceLock::new();
        STANDARD
            .get_or_init(|| Arc::new(crate::primitives::standard()))
            .clone()
    }

    /// Register a primitive under one or more textual patterns.
    pub fn register<F>(
        &mut self,
        name: impl Into<String>,
        patterns: &[&str],
        help: impl Into<String>,
        factory: F,
    ) -> Result<(), ParseError>
    where
        F: Fn(&CompiledBindings, &str, &str) -> Result<Node, CompileError> + Send + Sync + 'static,
    {
        let patterns = patterns
            .iter()
            .map(|text| parse(text).map(Pattern::new))
            .collect::<Result<Vec<_>, _>>()?;
        self.entries.push(PatternEntry {
            name: name.into(),
            patterns,
            factory: Arc::new(factory),
            help: help.into(),
        });
        Ok(())
    }

    /// Register, logging instead of failing; used for built-in tables.
    pub(crate) fn register_builtin<F>(&mut self, name: &str, patterns: &[&str], help: &str, factory: F)
    where
        F: Fn(&CompiledBindings, &str, &str) -> Result<Node, CompileError> + Send + Sync + 'static,
    {
        if let Err(e) = self.register(name, patterns, help, factory) {
            error!("built-in pattern for '{name}' does not parse: {e}");
        }
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Help text of every entry registered under `name`
    pub fn help(&self, name: &str) -> Option<String> {
        let lines: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.name == name)
            .map(|entry| {
                let forms: Vec<String> = entry.patterns.iter().map(|p| p.expr.to_string()).collect();
                format!("{}: {}", forms.join(" | "), entry.help)
            })
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    }

    /// Whether some pattern is a call to `name`
    pub fn is_call_name(&self, name: &str) -> bool {
        self.entries
            .iter()
            .flat_map(|entry| &entry.patterns)
            .filter_map(|pattern| pattern.expr.as_call())
            .any(|call| call.name.name == name)
    }
}

/// Captures of a successful match, compiled to nodes
pub struct CompiledBindings {
    primitive: String,
    nodes: IndexMap<String, Vec<Node>>,
}

impl CompiledBindings {
    pub fn new(primitive: impl Into<String>) -> Self {
        Self {
            primitive: primitive.into(),
            nodes: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, nodes: Vec<Node>) {
        self.nodes.insert(name.into(), nodes);
    }

    /// The single node captured by `name`
    pub fn one(&self, name: &str) -> Result<Node, CompileError> {
        self.nodes
            .get(name)
            .and_then(|nodes| nodes.first())
            .cloned()
            .ok_or_else(|| CompileError::MissingBinding {
                primitive: self.primitive.clone(),
                placeholder: name.to_string(),
            })
    }

    /// Every node captured by `name`; empty for an ellipsis that matched nothing
    pub fn many(&self, name: &str) -> Vec<Node> {
        self.nodes.get(name).cloned().unwrap_or_default()
    }

    /// All captured nodes in match order
    pub fn ordered(&self) -> Vec<Node> {
        self.nodes.values().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Constant;
    use crate::value::Value;

    fn nil_factory(_: &CompiledBindings, _: &str, _: &str) -> Result<Node, CompileError> {
        Ok(Constant::new(Value::Nil))
    }

    #[test]
    fn pattern_lists_its_placeholders() {
        let pattern = Pattern::new(parse("f(_1, -_2, (_3 + x), __rest)").unwrap());
        assert!(pattern.binds("_1"));
        assert!(pattern.binds("_2"));
        assert!(pattern.binds("_3"));
        assert!(pattern.binds("__rest"));
        assert!(!pattern.binds("x"));
        assert!(!pattern.binds("f"));
    }

    #[test]
    fn register_rejects_bad_pattern_text() {
        let mut registry = Registry::new();
        assert!(registry.register("bad", &["f(,"], "", nil_factory).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn help_and_call_names() {
        let mut registry = Registry::new();
        registry
            .register("norm", &["norm(_v)", "abs(_v)"], "vector norm", nil_factory)
            .unwrap();
        registry.register("pi", &["pi"], "π", nil_factory).unwrap();

        assert_eq!(
            registry.help("norm").as_deref(),
            Some("norm(_v) | abs(_v): vector norm")
        );
        assert!(registry.help("nope").is_none());
        assert!(registry.is_call_name("abs"));
        assert!(!registry.is_call_name("pi"));
    }

    #[test]
    fn standard_registry_is_shared_and_complete() {
        let a = Registry::standard();
        let b = Registry::standard();
        assert!(Arc::ptr_eq(&a, &b));
        for name in ["if", "error", "fma", "+", "-", "neg", "array", "sum", "pi", "fetch"] {
            assert!(a.help(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn missing_binding_names_primitive() {
        let bindings = CompiledBindings::new("fma");
        let err = bindings.one("_a").err().unwrap();
        assert_eq!(
            err,
            CompileError::MissingBinding {
                primitive: "fma".into(),
                placeholder: "_a".into()
            }
        );
        assert!(bindings.many("__rest").is_empty());
    }
}

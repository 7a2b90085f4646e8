//! Compiler from AST to execution tree
//!
//! Resolution order for a call: special form (`define`, `lambda`, `block`),
//! then a user binding, then the pattern registry. Identifiers resolve
//! through the environment first and fall back to bare-identifier patterns
//! such as `pi`. Operator chains always go to the registry; a chain no
//! pattern accepts is regrouped at its last lowest-precedence operator and
//! retried.

use std::sync::Arc;

use log::{debug, trace};
use thiserror::Error;

use crate::ast::{Expression, FunctionCall, Identifier, Literal, Operand, PrimaryExpr};
use crate::env::{Binding, Environment};
use crate::matcher::{Bindings, match_bindings, matches};
use crate::precedence::regroup;
use crate::registry::{CompiledBindings, Registry};
use crate::runtime::{
    Apply, CompiledFunction, Constant, Frame, FunctionDef, FunctionRef, Invoke, Lambda, Node,
    ParamRef, Sequence, describe,
};
use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("no pattern matches `{fragment}`")]
    NoMatchingPattern { fragment: String },

    #[error("unbound name '{name}' in `{fragment}`")]
    Unbound { name: String, fragment: String },

    #[error("invalid {form}: {reason} in `{fragment}`")]
    InvalidForm {
        form: String,
        reason: String,
        fragment: String,
    },

    #[error("{primitive}: pattern did not bind {placeholder}")]
    MissingBinding {
        primitive: String,
        placeholder: String,
    },

    #[error("internal compiler error: {0}")]
    Internal(String),
}

type Result<T> = std::result::Result<T, CompileError>;

fn invalid(form: &str, reason: &str, expr: &Expression) -> CompileError {
    CompileError::InvalidForm {
        form: form.to_string(),
        reason: reason.to_string(),
        fragment: expr.to_string(),
    }
}

/// Outcome of compiling one statement
pub enum Statement {
    Defined(String),
    Expr(Node),
}

struct SpecialForms {
    define: Expression,
    lambda: Expression,
    block: Expression,
}

impl SpecialForms {
    fn new() -> Self {
        let holes = |names: &[&str]| -> Vec<Expression> {
            names.iter().map(|n| Expression::identifier(*n)).collect()
        };
        Self {
            define: Expression::call("define", holes(&["_name", "_value"])),
            lambda: Expression::call("lambda", holes(&["__params"])),
            block: Expression::call("block", holes(&["__statements"])),
        }
    }
}

pub struct Compiler<'r> {
    registry: &'r Registry,
    forms: SpecialForms,
}

impl<'r> Compiler<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            forms: SpecialForms::new(),
        }
    }

    /// Compile an expression in expression position.
    pub fn compile(&self, expr: &Expression, env: &Environment) -> Result<Node> {
        let expr = expr.normalized();
        if !expr.is_chain() {
            return self.operand(&expr.first, expr, env);
        }
        if let Some(node) = self.from_registry(expr, env)? {
            return Ok(node);
        }
        if let Some(grouped) = regroup(expr) {
            debug!("no pattern for `{expr}`, regrouping as `{grouped}`");
            if let Some(node) = self.from_registry(&grouped, env)? {
                return Ok(node);
            }
        }
        Err(CompileError::NoMatchingPattern {
            fragment: expr.to_string(),
        })
    }

    /// Compile a statement: a definition binds into `env`, anything else
    /// compiles as an expression.
    pub fn statement(&self, expr: &Expression, env: &Environment) -> Result<Statement> {
        match expr.as_call() {
            Some(call) if call.name.name == "define" => {
                self.define(expr, env).map(|(name, _)| Statement::Defined(name))
            }
            _ => self.compile(expr, env).map(Statement::Expr),
        }
    }

    /// Compile statements in order into a zero-parameter `main` function
    /// that evaluates the expression statements and yields the last value.
    ///
    /// The unit binds all or nothing: if any statement fails, definitions
    /// made by earlier statements are undone.
    pub fn program(&self, statements: &[Expression], env: &Environment) -> Result<CompiledFunction> {
        let mut body = Vec::new();
        let mut undo: Vec<(String, Option<Binding>)> = Vec::new();
        for statement in statements {
            let compiled = match statement.as_call() {
                Some(call) if call.name.name == "define" => {
                    self.define(statement, env).map(|defined| undo.push(defined))
                }
                _ => self.compile(statement, env).map(|node| body.push(node)),
            };
            if let Err(e) = compiled {
                for (name, previous) in undo.into_iter().rev() {
                    env.restore(&name, previous);
                }
                debug!("compilation failed, earlier definitions rolled back");
                return Err(e);
            }
        }
        let body = Sequence::new("main", body);
        trace!("compiled program:\n{}", describe(&body));
        let def = FunctionDef::new("main", Vec::new(), env.depth() + 1).with_body(body);
        Ok(CompiledFunction::new(Arc::new(def), Frame::root()))
    }

    fn operand(&self, operand: &Operand, expr: &Expression, env: &Environment) -> Result<Node> {
        match operand.normalized() {
            Operand::Unary(_) => self.from_registry(expr, env)?.ok_or_else(|| {
                CompileError::NoMatchingPattern {
                    fragment: expr.to_string(),
                }
            }),
            Operand::Primary(PrimaryExpr::Literal(lit)) => Ok(Constant::new(literal_value(lit))),
            Operand::Primary(PrimaryExpr::Identifier(ident)) => self.identifier(ident, expr, env),
            Operand::Primary(PrimaryExpr::Paren(inner)) => self.compile(inner, env),
            Operand::Primary(PrimaryExpr::Call(call)) => self.call(call, expr, env),
        }
    }

    fn identifier(&self, ident: &Identifier, expr: &Expression, env: &Environment) -> Result<Node> {
        let name = ident.name.as_str();
        match env.lookup(name) {
            // the node itself: the value is captured as of this definition
            Some(Binding::Value(node)) => Ok(node),
            Some(Binding::Param { depth, index }) => Ok(ParamRef::new(name, depth, index)),
            Some(Binding::Function(_)) => Ok(FunctionRef::new(name, env.clone())),
            None if ident.placeholder().is_some() => Err(unbound(name, expr)),
            None => self
                .from_registry(expr, env)?
                .ok_or_else(|| unbound(name, expr)),
        }
    }

    fn call(&self, call: &FunctionCall, expr: &Expression, env: &Environment) -> Result<Node> {
        let name = call.name.name.as_str();
        match name {
            "define" => {
                return Err(invalid(
                    "define",
                    "definitions are only allowed at top level or directly inside block",
                    expr,
                ));
            }
            "lambda" => {
                let bindings = self.special_form(&self.forms.lambda, expr)?;
                return self.lambda(bindings.get("__params"), expr, env);
            }
            "block" => {
                let bindings = self.special_form(&self.forms.block, expr)?;
                return self.block(bindings.get("__statements"), expr, env);
            }
            _ => {}
        }

        let site = expr.to_string();
        match env.lookup(name) {
            Some(Binding::Function(_)) => {
                let args = self.compile_all(&call.args, env)?;
                Ok(Invoke::new(name, site, env.clone(), args))
            }
            Some(Binding::Value(callee)) => {
                let args = self.compile_all(&call.args, env)?;
                Ok(Apply::new(site, callee, args))
            }
            Some(Binding::Param { depth, index }) => {
                let args = self.compile_all(&call.args, env)?;
                Ok(Apply::new(site, ParamRef::new(name, depth, index), args))
            }
            None => self.from_registry(expr, env)?.ok_or_else(|| {
                if self.registry.is_call_name(name) {
                    CompileError::NoMatchingPattern { fragment: site }
                } else {
                    unbound(name, expr)
                }
            }),
        }
    }

    fn special_form(&self, form: &Expression, expr: &Expression) -> Result<Bindings> {
        match_bindings(form, expr).ok_or_else(|| {
            CompileError::Internal(format!("special form `{form}` did not match `{expr}`"))
        })
    }

    /// Bind a definition into `env`; returns the name and what it replaced.
    fn define(&self, expr: &Expression, env: &Environment) -> Result<(String, Option<Binding>)> {
        let bindings = match_bindings(&self.forms.define, expr).ok_or_else(|| {
            invalid(
                "define",
                "expected define(name, value) or define(name(params...), body)",
                expr,
            )
        })?;
        let target = single(&bindings, "_name")?;
        let value = single(&bindings, "_value")?;

        if let Some(ident) = target.as_identifier() {
            let node = self.compile(value, env)?;
            let previous = env.define(ident.name.clone(), Binding::Value(node));
            debug!("defined variable {}", ident.name);
            return Ok((ident.name.clone(), previous));
        }

        let Some(signature) = target.as_call() else {
            return Err(invalid(
                "define",
                "the name must be an identifier or a call signature",
                expr,
            ));
        };
        let name = signature.name.name.clone();
        let params = params(&signature.args, "define", expr)?;
        let scope = env.function_scope(&params);
        let def = Arc::new(FunctionDef::new(name.clone(), params, scope.depth()));

        // bound before the body compiles, so the body can call itself
        let previous = env.define(name.clone(), Binding::Function(def.clone()));
        match self.compile(value, &scope) {
            Ok(body) => {
                def.set_body(body).map_err(|_| {
                    CompileError::Internal(format!("body of '{name}' compiled twice"))
                })?;
                debug!("defined function {name}/{}", def.params.len());
                Ok((name, previous))
            }
            Err(e) => {
                env.restore(&name, previous);
                Err(e)
            }
        }
    }

    fn lambda(&self, args: &[Expression], expr: &Expression, env: &Environment) -> Result<Node> {
        let Some((body, declared)) = args.split_last() else {
            return Err(invalid("lambda", "missing body", expr));
        };
        let params = params(declared, "lambda", expr)?;
        let scope = env.function_scope(&params);
        let body = self.compile(body, &scope)?;
        let def = FunctionDef::new("lambda", params, scope.depth()).with_body(body);
        Ok(Lambda::new(Arc::new(def)))
    }

    fn block(&self, statements: &[Expression], expr: &Expression, env: &Environment) -> Result<Node> {
        let scope = env.child_scope();
        let mut nodes = Vec::with_capacity(statements.len());
        let mut ends_with_expr = false;
        for statement in statements {
            match self.statement(statement, &scope)? {
                Statement::Defined(_) => ends_with_expr = false,
                Statement::Expr(node) => {
                    nodes.push(node);
                    ends_with_expr = true;
                }
            }
        }
        if !ends_with_expr {
            return Err(invalid(
                "block",
                "the last statement must be an expression",
                expr,
            ));
        }
        Ok(Sequence::new(expr.to_string(), nodes))
    }

    fn compile_all(&self, exprs: &[Expression], env: &Environment) -> Result<Vec<Node>> {
        exprs.iter().map(|e| self.compile(e, env)).collect()
    }

    /// First registry pattern matching `candidate`, built by its factory.
    fn from_registry(&self, candidate: &Expression, env: &Environment) -> Result<Option<Node>> {
        for entry in self.registry.entries() {
            for pattern in &entry.patterns {
                let mut bindings = Bindings::new();
                let matched = matches(&pattern.expr, candidate, &mut |name, captured| {
                    // a capture of the whole candidate would recurse forever
                    if !pattern.binds(name) || &captured == candidate {
                        return false;
                    }
                    bindings.push(name, captured);
                    true
                });
                if !matched {
                    continue;
                }
                debug!("`{candidate}` -> {} via `{}`", entry.name, pattern.expr);

                let mut compiled = CompiledBindings::new(entry.name.as_str());
                for (name, exprs) in bindings.iter() {
                    compiled.insert(name, self.compile_all(exprs, env)?);
                }
                let label = candidate.to_string();
                return (entry.factory)(&compiled, &entry.name, &label).map(Some);
            }
        }
        Ok(None)
    }
}

fn unbound(name: &str, expr: &Expression) -> CompileError {
    CompileError::Unbound {
        name: name.to_string(),
        fragment: expr.to_string(),
    }
}

fn single<'b>(bindings: &'b Bindings, name: &str) -> Result<&'b Expression> {
    bindings
        .get(name)
        .first()
        .ok_or_else(|| CompileError::Internal(format!("special form did not bind {name}")))
}

fn params(args: &[Expression], form: &str, expr: &Expression) -> Result<Vec<String>> {
    args.iter()
        .map(|arg| {
            arg.as_identifier()
                .map(|ident| ident.name.clone())
                .ok_or_else(|| invalid(form, "parameters must be identifiers", expr))
        })
        .collect()
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(x) => Value::Float(*x),
        Literal::String(s) => Value::Str(s.as_str().into()),
    }
}

/// Compile a single expression into a zero-parameter function.
pub fn compile(
    expr: &Expression,
    env: &Environment,
    registry: &Registry,
) -> std::result::Result<CompiledFunction, CompileError> {
    Compiler::new(registry).program(std::slice::from_ref(expr), env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse, parse_program};

    fn compile_err(source: &str) -> CompileError {
        let registry = Registry::standard();
        let env = Environment::new();
        let program = parse_program(source).unwrap();
        Compiler::new(&registry)
            .program(&program, &env)
            .err()
            .unwrap()
    }

    #[test]
    fn unbound_names_are_reported() {
        assert!(matches!(
            compile_err("x + 1"),
            CompileError::Unbound { name, .. } if name == "x"
        ));
        assert!(matches!(
            compile_err("frobnicate(1)"),
            CompileError::Unbound { name, .. } if name == "frobnicate"
        ));
        assert!(matches!(compile_err("_x"), CompileError::Unbound { .. }));
    }

    #[test]
    fn wrong_arity_for_a_primitive_is_no_match() {
        assert!(matches!(
            compile_err("len(1, 2)"),
            CompileError::NoMatchingPattern { fragment } if fragment == "len(1, 2)"
        ));
    }

    #[test]
    fn define_outside_statement_position() {
        assert!(matches!(
            compile_err("1 + define(x, 2)"),
            CompileError::InvalidForm { form, .. } if form == "define"
        ));
        assert!(matches!(
            compile_err("define(f(1), 2)"),
            CompileError::InvalidForm { reason, .. } if reason.contains("parameters")
        ));
    }

    #[test]
    fn block_must_end_with_expression() {
        assert!(matches!(
            compile_err("block(define(x, 1))"),
            CompileError::InvalidForm { form, .. } if form == "block"
        ));
        assert!(matches!(
            compile_err("lambda()"),
            CompileError::InvalidForm { form, .. } if form == "lambda"
        ));
    }

    #[test]
    fn failed_function_definition_is_rolled_back() {
        let registry = Registry::standard();
        let env = Environment::new();
        let compiler = Compiler::new(&registry);
        let bad = parse("define(f(n), n + missing)").unwrap();
        assert!(compiler.statement(&bad, &env).is_err());
        assert!(env.lookup("f").is_none());
    }

    #[test]
    fn failed_unit_undoes_its_definitions() {
        let registry = Registry::standard();
        let env = Environment::new();
        let compiler = Compiler::new(&registry);
        let first = parse_program("define(x, 1)").unwrap();
        compiler.program(&first, &env).unwrap();

        let unit = parse_program("define(x, 2); define(sq(n), n * n); sq(x) + missing").unwrap();
        assert!(matches!(
            compiler.program(&unit, &env),
            Err(CompileError::Unbound { name, .. }) if name == "missing"
        ));
        assert!(env.lookup("sq").is_none());
        assert!(matches!(
            env.lookup("x"),
            Some(Binding::Value(node)) if node.label() == "1"
        ));
    }

    #[test]
    fn definitions_bind_in_the_given_scope() {
        let registry = Registry::standard();
        let env = Environment::new();
        let compiler = Compiler::new(&registry);
        let program = parse_program("define(x, 2); define(sq(n), n * n); sq(x)").unwrap();
        compiler.program(&program, &env).unwrap();
        assert!(matches!(env.lookup("x"), Some(Binding::Value(_))));
        assert!(matches!(env.lookup("sq"), Some(Binding::Function(def)) if def.body().is_some()));
    }

    #[test]
    fn chains_compile_to_registry_nodes() {
        let registry = Registry::standard();
        let env = Environment::new();
        let compiler = Compiler::new(&registry);
        let node = compiler.compile(&parse("1 * 2 + 3").unwrap(), &env).unwrap();
        assert_eq!(node.name(), "fma");
        let node = compiler.compile(&parse("1 - 2 + 3").unwrap(), &env).unwrap();
        assert_eq!(node.name(), "+");
        assert_eq!(node.operands()[0].name(), "-");
    }
}

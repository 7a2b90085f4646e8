//! numflow - dataflow evaluation for a small numeric language
//!
//! Source is parsed into flat operator chains, compiled into an execution
//! tree by matching it against a registry of textual patterns, and evaluated
//! asynchronously on tokio.
//!
//! ## Quick Start
//!
//! ```ignore
//! use numflow::Engine;
//!
//! let engine = Engine::new();
//! engine.run("define(fact(n), if(n <= 1, 1, n * fact(n - 1)))").await?;
//! assert_eq!(engine.run("fact(10)").await?, numflow::Value::Int(3628800));
//! ```
//!
//! ## Language
//!
//! - operators `|| && == != < <= > >= + - * / % ^` and unary `- !`
//! - `define(x, expr)`, `define(f(a, b), body)`
//! - `lambda(a, b, body)`, `block(s1, s2, ..., result)`
//! - `if(cond, then, else)` evaluates only the chosen branch
//!
//! ## Custom primitives
//!
//! ```ignore
//! let mut registry = Registry::new();
//! registry.register("double", &["double(_x)"], "twice _x", kernel(|args| {
//!     Ok(Value::Float(args[0].expect_f64()? * 2.0))
//! }))?;
//! let engine = Engine::new().with_registry(Arc::new(registry));
//! ```

mod ast;
mod compile;
mod config;
mod engine;
mod env;
mod matcher;
mod parse;
mod precedence;
mod pretty;
pub mod primitives;
mod registry;
mod runtime;
mod store;
mod value;

use thiserror::Error;

// ============ Primary Public API ============

pub use config::EngineConfig;
pub use engine::Engine;
pub use primitives::kernel;
pub use registry::{CompiledBindings, Registry};
pub use runtime::{
    CallTrace, CompiledFunction, EvalContext, EvalError, EvalErrorKind, Locality, TraceFrame,
};
pub use store::{ArrayStore, LocalStore, StoreError};
pub use value::Value;

/// Compile and run `source` once with a fresh engine
pub async fn run(source: &str) -> Result<Value, FlowError> {
    Engine::new().run(source).await
}

// ============ Errors ============

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Parse error: {0}")]
    Parse(#[from] parse::ParseError),
    #[error("Compile error: {0}")]
    Compile(#[from] compile::CompileError),
    #[error("Eval error: {0}")]
    Eval(#[from] runtime::EvalError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

pub use compile::CompileError;
pub use parse::ParseError;

// ============ Advanced: AST, matcher and execution tree ============

/// Lower-level pieces for custom primitives, tooling and tests
pub mod advanced {
    pub use crate::ast::{
        Expression, FunctionCall, Identifier, Literal, Operand, Operation, Operator, Placeholder,
        PlaceholderKind, PrimaryExpr, UnaryExpr,
    };
    pub use crate::compile::{Compiler, Statement, compile};
    pub use crate::env::{Binding, Environment};
    pub use crate::matcher::{Bindings, match_bindings, matches};
    pub use crate::parse::{parse, parse_program};
    pub use crate::precedence::regroup;
    pub use crate::registry::{Factory, Pattern, PatternEntry};
    pub use crate::runtime::{
        Apply, Conditional, Constant, Deferred, Frame, FunctionDef, FunctionRef, Invoke, Kernel,
        KernelFn, Lambda, Node, ParamRef, Primitive, Sequence, describe, evaluate, evaluate_all,
    };
}

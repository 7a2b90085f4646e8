use thiserror::Error;

use super::context::{CallTrace, EvalContext};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalErrorKind {
    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("type error: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("not callable: {0}")]
    NotCallable(String),

    #[error("call depth limit of {limit} exceeded")]
    StackOverflow { limit: usize },

    #[error("{0}")]
    Raised(String),

    #[error("store: {0}")]
    Store(String),

    #[error("unbound at run time: {0}")]
    Unbound(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl EvalErrorKind {
    pub fn type_mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

/// A failed evaluation: which node failed, why, and the call stack at the
/// point of failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{primitive}: {kind}")]
pub struct EvalError {
    pub primitive: String,
    pub kind: EvalErrorKind,
    pub trace: CallTrace,
}

impl EvalError {
    pub fn new(primitive: impl Into<String>, kind: EvalErrorKind, ctx: &EvalContext) -> Self {
        Self {
            primitive: primitive.into(),
            kind,
            trace: ctx.call_trace(),
        }
    }

    /// Frame names of the call trace, outermost first.
    pub fn frame_names(&self) -> Vec<&str> {
        self.trace.frames.iter().map(|f| f.name.as_str()).collect()
    }
}

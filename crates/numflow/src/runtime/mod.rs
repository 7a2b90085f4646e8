//! Execution tree: compiled nodes and their asynchronous evaluation
//!
//! Building a tree runs nothing. `evaluate` returns a boxed future that
//! first evaluates operands (siblings may run concurrently on the tokio
//! pool) and then applies the node's own computation. An operand failure
//! short-circuits the parent before its computation runs.

mod context;
mod error;
mod function;
mod nodes;

use std::fmt::Write;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tokio::runtime::Handle;

pub use context::{CallTrace, DEFAULT_MAX_CALL_DEPTH, EvalContext, Locality, TraceFrame};
pub use error::{EvalError, EvalErrorKind};
pub use function::{CompiledFunction, Frame, FunctionDef};
pub use nodes::{
    Apply, Conditional, Constant, FunctionRef, Invoke, Kernel, KernelFn, Lambda, ParamRef,
    Sequence,
};

use crate::value::Value;

/// A value not computed yet
pub type Deferred = BoxFuture<'static, Result<Value, EvalError>>;

pub type Node = Arc<dyn Primitive>;

/// A node of the execution tree
pub trait Primitive: Send + Sync {
    /// Stable name used in errors and backtraces
    fn name(&self) -> &str;

    /// Debug label, typically the source text the node was compiled from
    fn label(&self) -> &str {
        self.name()
    }

    fn operands(&self) -> Vec<Node> {
        Vec::new()
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred;
}

pub fn evaluate(node: Node, frame: Frame, ctx: EvalContext) -> Deferred {
    node.evaluate(frame, ctx)
}

/// Evaluate sibling operands, in parallel when a runtime is available.
///
/// Spawned siblings keep running if one of them fails; their results are
/// dropped.
pub fn evaluate_all(
    operands: &[Node],
    frame: &Frame,
    ctx: &EvalContext,
) -> BoxFuture<'static, Result<Vec<Value>, EvalError>> {
    let spawn = ctx.parallel() && operands.len() > 1 && Handle::try_current().is_ok();
    let pending: Vec<Deferred> = operands
        .iter()
        .map(|node| {
            let fut = evaluate(node.clone(), frame.clone(), ctx.clone());
            if !spawn {
                return fut;
            }
            let name = node.name().to_string();
            let ctx = ctx.clone();
            let task = tokio::spawn(fut);
            async move {
                task.await.map_err(|e| {
                    EvalError::new(name, EvalErrorKind::Internal(e.to_string()), &ctx)
                })?
            }
            .boxed()
        })
        .collect();
    future::try_join_all(pending).boxed()
}

/// Indented outline of a compiled tree, one node per line.
pub fn describe(node: &Node) -> String {
    let mut out = String::new();
    describe_into(node, 0, &mut out);
    out
}

fn describe_into(node: &Node, indent: usize, out: &mut String) {
    let _ = writeln!(out, "{:indent$}{} [{}]", "", node.name(), node.label());
    for operand in node.operands() {
        describe_into(&operand, indent + 2, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add() -> KernelFn {
        Arc::new(|args: &[Value]| match args {
            [Value::Int(a), Value::Int(b)] => Ok(Value::Int(a + b)),
            _ => Err(EvalErrorKind::type_mismatch("ints", "other")),
        })
    }

    fn fail() -> KernelFn {
        Arc::new(|_: &[Value]| Err(EvalErrorKind::Raised("boom".into())))
    }

    #[tokio::test]
    async fn kernel_waits_for_operands() {
        let node: Node = Kernel::new(
            "+",
            "1 + 2",
            vec![Constant::new(Value::Int(1)), Constant::new(Value::Int(2))],
            add(),
        );
        let value = evaluate(node, Frame::root(), EvalContext::new()).await.unwrap();
        assert_eq!(value, Value::Int(3));
    }

    #[tokio::test]
    async fn operand_failure_short_circuits_parent() {
        let failing: Node = Kernel::new("error", "error()", vec![], fail());
        let node: Node = Kernel::new(
            "+",
            "error() + 1",
            vec![failing, Constant::new(Value::Int(1))],
            add(),
        );
        let err = evaluate(node, Frame::root(), EvalContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.primitive, "error");
        assert_eq!(err.kind, EvalErrorKind::Raised("boom".into()));
    }

    #[test]
    fn evaluation_without_runtime_runs_inline() {
        let node: Node = Kernel::new(
            "+",
            "1 + 2",
            vec![Constant::new(Value::Int(1)), Constant::new(Value::Int(2))],
            add(),
        );
        let value = futures::executor::block_on(evaluate(node, Frame::root(), EvalContext::new()));
        assert_eq!(value.unwrap(), Value::Int(3));
    }

    #[test]
    fn describe_outlines_the_tree() {
        let node: Node = Kernel::new(
            "+",
            "1 + 2",
            vec![Constant::new(Value::Int(1)), Constant::new(Value::Int(2))],
            add(),
        );
        let outline = describe(&node);
        assert_eq!(outline.lines().count(), 3);
        assert!(outline.starts_with("+ [1 + 2]"));
        assert!(outline.contains("  constant [1]"));
    }
}

//! Built-in node kinds of the execution tree

use std::sync::Arc;

use futures::FutureExt;
use futures::future;
use log::debug;

use super::context::EvalContext;
use super::error::{EvalError, EvalErrorKind};
use super::function::{CompiledFunction, Frame, FunctionDef};
use super::{Deferred, Node, Primitive, evaluate, evaluate_all};
use crate::env::{Binding, Environment};
use crate::value::Value;

pub type KernelFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalErrorKind> + Send + Sync>;

// ============ Leaves ============

/// A value fixed at compile time
pub struct Constant {
    value: Value,
    label: String,
}

impl Constant {
    pub fn new(value: Value) -> Node {
        let label = value.to_string();
        Arc::new(Self { value, label })
    }
}

impl Primitive for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn evaluate(self: Arc<Self>, _frame: Frame, _ctx: EvalContext) -> Deferred {
        future::ready(Ok(self.value.clone())).boxed()
    }
}

/// Reads argument `index` of the enclosing function at scope `depth`
pub struct ParamRef {
    name: String,
    depth: usize,
    index: usize,
}

impl ParamRef {
    pub fn new(name: impl Into<String>, depth: usize, index: usize) -> Node {
        Arc::new(Self {
            name: name.into(),
            depth,
            index,
        })
    }
}

impl Primitive for ParamRef {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred {
        let result = frame.arg(self.depth, self.index).cloned().ok_or_else(|| {
            EvalError::new(
                self.name.as_str(),
                EvalErrorKind::Internal(format!(
                    "no argument {} at depth {}",
                    self.index, self.depth
                )),
                &ctx,
            )
        });
        future::ready(result).boxed()
    }
}

// ============ Computation ============

/// Evaluates its operands, then applies a pure function to their values
pub struct Kernel {
    name: String,
    label: String,
    operands: Vec<Node>,
    apply: KernelFn,
}

impl Kernel {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        operands: Vec<Node>,
        apply: KernelFn,
    ) -> Node {
        Arc::new(Self {
            name: name.into(),
            label: label.into(),
            operands,
            apply,
        })
    }
}

impl Primitive for Kernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn operands(&self) -> Vec<Node> {
        self.operands.clone()
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred {
        async move {
            let values = evaluate_all(&self.operands, &frame, &ctx).await?;
            (self.apply)(&values).map_err(|kind| {
                debug!("{} failed in `{}`: {kind}", self.name, self.label);
                EvalError::new(self.name.as_str(), kind, &ctx)
            })
        }
        .boxed()
    }
}

/// `if`: evaluates the condition, then only the chosen branch
pub struct Conditional {
    label: String,
    cond: Node,
    then: Node,
    otherwise: Node,
}

impl Conditional {
    pub fn new(label: impl Into<String>, cond: Node, then: Node, otherwise: Node) -> Node {
        Arc::new(Self {
            label: label.into(),
            cond,
            then,
            otherwise,
        })
    }
}

impl Primitive for Conditional {
    fn name(&self) -> &str {
        "if"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn operands(&self) -> Vec<Node> {
        vec![self.cond.clone(), self.then.clone(), self.otherwise.clone()]
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred {
        async move {
            let branch = match evaluate(self.cond.clone(), frame.clone(), ctx.clone()).await? {
                Value::Bool(true) => self.then.clone(),
                Value::Bool(false) => self.otherwise.clone(),
                other => {
                    return Err(EvalError::new(
                        "if",
                        EvalErrorKind::type_mismatch("bool", other.type_name()),
                        &ctx,
                    ));
                }
            };
            evaluate(branch, frame, ctx).await
        }
        .boxed()
    }
}

/// Statements evaluated one after another; yields the last value
pub struct Sequence {
    label: String,
    statements: Vec<Node>,
}

impl Sequence {
    pub fn new(label: impl Into<String>, statements: Vec<Node>) -> Node {
        Arc::new(Self {
            label: label.into(),
            statements,
        })
    }
}

impl Primitive for Sequence {
    fn name(&self) -> &str {
        "block"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn operands(&self) -> Vec<Node> {
        self.statements.clone()
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred {
        async move {
            let mut last = Value::Nil;
            for statement in &self.statements {
                last = evaluate(statement.clone(), frame.clone(), ctx.clone()).await?;
            }
            Ok(last)
        }
        .boxed()
    }
}

// ============ Functions ============

/// `lambda(...)`: a function value closing over the current frames
pub struct Lambda {
    def: Arc<FunctionDef>,
}

impl Lambda {
    pub fn new(def: Arc<FunctionDef>) -> Node {
        Arc::new(Self { def })
    }
}

impl Primitive for Lambda {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn operands(&self) -> Vec<Node> {
        self.def.body().cloned().into_iter().collect()
    }

    fn evaluate(self: Arc<Self>, frame: Frame, _ctx: EvalContext) -> Deferred {
        let captured = frame.truncate(self.def.depth.saturating_sub(1));
        let function = CompiledFunction::new(self.def.clone(), captured);
        future::ready(Ok(Value::Function(function))).boxed()
    }
}

/// Look `name` up in `scope` when the node runs, not when it was compiled.
async fn resolve(
    name: &str,
    scope: &Environment,
    frame: &Frame,
    ctx: &EvalContext,
) -> Result<Value, EvalError> {
    match scope.lookup(name) {
        Some(Binding::Function(def)) => {
            let captured = frame.truncate(def.depth.saturating_sub(1));
            Ok(Value::Function(CompiledFunction::new(def, captured)))
        }
        Some(Binding::Value(node)) => evaluate(node, frame.clone(), ctx.clone()).await,
        Some(Binding::Param { depth, index }) => frame.arg(depth, index).cloned().ok_or_else(|| {
            EvalError::new(
                name,
                EvalErrorKind::Internal(format!("no argument {index} at depth {depth}")),
                ctx,
            )
        }),
        None => Err(EvalError::new(
            name,
            EvalErrorKind::Unbound(name.to_string()),
            ctx,
        )),
    }
}

async fn apply(
    name: &str,
    callee: Value,
    args: Vec<Value>,
    ctx: EvalContext,
    site: String,
) -> Result<Value, EvalError> {
    match callee {
        Value::Function(function) => function.call_at(args, ctx, site).await,
        other => Err(EvalError::new(
            name,
            EvalErrorKind::NotCallable(other.type_name().to_string()),
            &ctx,
        )),
    }
}

/// A reference to a named function, resolved dynamically
pub struct FunctionRef {
    name: String,
    scope: Environment,
}

impl FunctionRef {
    pub fn new(name: impl Into<String>, scope: Environment) -> Node {
        Arc::new(Self {
            name: name.into(),
            scope,
        })
    }
}

impl Primitive for FunctionRef {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred {
        async move { resolve(&self.name, &self.scope, &frame, &ctx).await }.boxed()
    }
}

/// Call of a named function. The callee is looked up at call time, so
/// recursion and later redefinitions are observed.
pub struct Invoke {
    name: String,
    site: String,
    scope: Environment,
    args: Vec<Node>,
}

impl Invoke {
    pub fn new(
        name: impl Into<String>,
        site: impl Into<String>,
        scope: Environment,
        args: Vec<Node>,
    ) -> Node {
        Arc::new(Self {
            name: name.into(),
            site: site.into(),
            scope,
            args,
        })
    }
}

impl Primitive for Invoke {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.site
    }

    fn operands(&self) -> Vec<Node> {
        self.args.clone()
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred {
        async move {
            let (callee, args) = futures::try_join!(
                resolve(&self.name, &self.scope, &frame, &ctx),
                evaluate_all(&self.args, &frame, &ctx),
            )?;
            apply(&self.name, callee, args, ctx, self.site.clone()).await
        }
        .boxed()
    }
}

/// Call of a function-valued expression such as a variable or parameter
pub struct Apply {
    site: String,
    callee: Node,
    args: Vec<Node>,
}

impl Apply {
    pub fn new(site: impl Into<String>, callee: Node, args: Vec<Node>) -> Node {
        Arc::new(Self {
            site: site.into(),
            callee,
            args,
        })
    }
}

impl Primitive for Apply {
    fn name(&self) -> &str {
        self.callee.name()
    }

    fn label(&self) -> &str {
        &self.site
    }

    fn operands(&self) -> Vec<Node> {
        std::iter::once(self.callee.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred {
        async move {
            let (callee, args) = futures::try_join!(
                evaluate(self.callee.clone(), frame.clone(), ctx.clone()),
                evaluate_all(&self.args, &frame, &ctx),
            )?;
            apply(self.callee.name(), callee, args, ctx, self.site.clone()).await
        }
        .boxed()
    }
}

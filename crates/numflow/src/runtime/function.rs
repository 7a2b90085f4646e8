//! Callable values: definitions, argument frames and partial application

use std::fmt;
use std::sync::{Arc, OnceLock};

use futures::FutureExt;
use futures::future;
use log::trace;
use tokio::runtime::Handle;

use super::context::EvalContext;
use super::error::{EvalError, EvalErrorKind};
use super::{Deferred, Node, evaluate};
use crate::value::Value;

/// Argument frames of the functions currently being evaluated.
///
/// Frames are tagged with the absolute scope depth of the function that
/// pushed them, so a parameter reference `(depth, index)` resolves by walking
/// out to the innermost frame at that depth.
#[derive(Clone, Default)]
pub struct Frame(Option<Arc<FrameData>>);

struct FrameData {
    depth: usize,
    args: Vec<Value>,
    parent: Frame,
}

impl Frame {
    pub fn root() -> Self {
        Self(None)
    }

    pub fn enter(&self, depth: usize, args: Vec<Value>) -> Frame {
        Frame(Some(Arc::new(FrameData {
            depth,
            args,
            parent: self.clone(),
        })))
    }

    /// Drop every frame deeper than `depth`.
    pub fn truncate(&self, depth: usize) -> Frame {
        let mut current = self;
        while let Some(data) = &current.0 {
            if data.depth <= depth {
                break;
            }
            current = &data.parent;
        }
        current.clone()
    }

    pub fn arg(&self, depth: usize, index: usize) -> Option<&Value> {
        let mut current = self.0.as_deref();
        while let Some(data) = current {
            if data.depth == depth {
                return data.args.get(index);
            }
            if data.depth < depth {
                return None;
            }
            current = data.parent.0.as_deref();
        }
        None
    }
}

/// A user function: named by `define` or anonymous from `lambda`.
///
/// The body is filled in after the definition is bound, which lets the body
/// refer to the function itself.
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    /// Scope depth of the parameters
    pub depth: usize,
    body: OnceLock<Node>,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, params: Vec<String>, depth: usize) -> Self {
        Self {
            name: name.into(),
            params,
            depth,
            body: OnceLock::new(),
        }
    }

    pub fn with_body(self, body: Node) -> Self {
        // fresh OnceLock, cannot already be set
        let _ = self.body.set(body);
        self
    }

    /// Install the body; fails if one is already present.
    pub fn set_body(&self, body: Node) -> Result<(), Node> {
        self.body.set(body)
    }

    pub fn body(&self) -> Option<&Node> {
        self.body.get()
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("depth", &self.depth)
            .field("compiled", &self.body.get().is_some())
            .finish()
    }
}

/// A function value: a definition, the frames it closed over and any
/// arguments already supplied.
#[derive(Clone)]
pub struct CompiledFunction {
    def: Arc<FunctionDef>,
    captured: Frame,
    applied: Arc<[Value]>,
}

impl CompiledFunction {
    pub fn new(def: Arc<FunctionDef>, captured: Frame) -> Self {
        Self {
            def,
            captured,
            applied: Arc::from(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Parameters still missing
    pub fn arity(&self) -> usize {
        self.def.params.len().saturating_sub(self.applied.len())
    }

    pub fn ptr_eq(&self, other: &CompiledFunction) -> bool {
        Arc::ptr_eq(&self.def, &other.def) && self.applied == other.applied
    }

    /// Evaluate with no further arguments.
    pub async fn run(&self, ctx: EvalContext) -> Result<Value, EvalError> {
        self.call(Vec::new(), ctx).await
    }

    pub fn call(&self, args: Vec<Value>, ctx: EvalContext) -> Deferred {
        let site = self.def.name.clone();
        self.call_at(args, ctx, site)
    }

    /// Apply `args` after any already-applied ones. Too few arguments yields
    /// a curried function; extra arguments are applied to the result.
    pub fn call_at(&self, args: Vec<Value>, ctx: EvalContext, site: String) -> Deferred {
        let mut all: Vec<Value> = self.applied.iter().cloned().chain(args).collect();
        let arity = self.def.params.len();
        if all.len() < arity {
            trace!("curry {} with {}/{} args", self.def.name, all.len(), arity);
            let curried = CompiledFunction {
                def: self.def.clone(),
                captured: self.captured.clone(),
                applied: all.into(),
            };
            return future::ready(Ok(Value::Function(curried))).boxed();
        }

        let extra = all.split_off(arity);
        let def = self.def.clone();
        let captured = self.captured.clone();
        async move {
            let body = def.body().cloned().ok_or_else(|| {
                EvalError::new(
                    def.name.as_str(),
                    EvalErrorKind::Internal("function body was never compiled".into()),
                    &ctx,
                )
            })?;
            let inner = ctx.push_frame(def.name.as_str(), site.as_str())?;
            let frame = captured.enter(def.depth, all);
            let pending = evaluate(body, frame, inner);
            // one task per call, so nesting is limited by max_call_depth and
            // not by the native stack of the polling thread
            let result = match Handle::try_current() {
                Ok(handle) => handle.spawn(pending).await.map_err(|e| {
                    EvalError::new(
                        def.name.as_str(),
                        EvalErrorKind::Internal(e.to_string()),
                        &ctx,
                    )
                })??,
                Err(_) => pending.await?,
            };
            if extra.is_empty() {
                return Ok(result);
            }
            match result {
                Value::Function(next) => next.call_at(extra, ctx, site).await,
                other => Err(EvalError::new(
                    def.name.as_str(),
                    EvalErrorKind::NotCallable(other.type_name().to_string()),
                    &ctx,
                )),
            }
        }
        .boxed()
    }
}

impl fmt::Debug for CompiledFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledFunction")
            .field("name", &self.def.name)
            .field("arity", &self.arity())
            .field("applied", &self.applied.len())
            .finish()
    }
}

//! The evaluation context threaded through every `evaluate` call
//!
//! Cloning is cheap: the call stack is a persistent linked list, so pushing
//! a frame builds a new context and leaves the caller's untouched.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{EvalError, EvalErrorKind};
use crate::store::ArrayStore;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// Where this evaluation runs in a distributed job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locality {
    pub worker: usize,
    pub workers: usize,
    /// Half-open `(start, end)` span per tiled dimension owned by this worker
    #[serde(default)]
    pub spans: Vec<(usize, usize)>,
}

impl Locality {
    pub fn new(worker: usize, workers: usize) -> Self {
        Self {
            worker,
            workers,
            spans: Vec::new(),
        }
    }

    pub fn with_spans(mut self, spans: Vec<(usize, usize)>) -> Self {
        self.spans = spans;
        self
    }
}

#[derive(Debug)]
struct StackFrame {
    name: String,
    site: String,
    depth: usize,
    caller: Option<Arc<StackFrame>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceFrame {
    pub name: String,
    pub site: String,
}

/// Call stack snapshot, outermost frame first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallTrace {
    pub frames: Vec<TraceFrame>,
}

impl CallTrace {
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// One `at name (site)` line per frame
    pub fn lines(&self) -> Vec<String> {
        self.frames
            .iter()
            .map(|f| format!("at {} ({})", f.name, f.site))
            .collect()
    }
}

impl fmt::Display for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "  {line}")?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct EvalContext {
    stack: Option<Arc<StackFrame>>,
    locality: Option<Arc<Locality>>,
    store: Option<Arc<dyn ArrayStore>>,
    max_call_depth: usize,
    parallel: bool,
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EvalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalContext")
            .field("depth", &self.depth())
            .field("locality", &self.locality)
            .field("store", &self.store.is_some())
            .field("max_call_depth", &self.max_call_depth)
            .field("parallel", &self.parallel)
            .finish()
    }
}

impl EvalContext {
    pub fn new() -> Self {
        Self {
            stack: None,
            locality: None,
            store: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            parallel: true,
        }
    }

    pub fn with_locality(mut self, locality: Locality) -> Self {
        self.locality = Some(Arc::new(locality));
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ArrayStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_max_call_depth(mut self, limit: usize) -> Self {
        self.max_call_depth = limit;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn locality(&self) -> Option<&Locality> {
        self.locality.as_deref()
    }

    pub fn store(&self) -> Option<&Arc<dyn ArrayStore>> {
        self.store.as_ref()
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    pub fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }

    /// Number of function frames on the stack
    pub fn depth(&self) -> usize {
        self.stack.as_ref().map_or(0, |frame| frame.depth)
    }

    /// Extend the call stack with a new frame.
    pub fn push_frame(
        &self,
        name: impl Into<String>,
        site: impl Into<String>,
    ) -> Result<EvalContext, EvalError> {
        let name = name.into();
        let depth = self.depth() + 1;
        if depth > self.max_call_depth {
            return Err(EvalError::new(
                name,
                EvalErrorKind::StackOverflow {
                    limit: self.max_call_depth,
                },
                self,
            ));
        }
        let mut next = self.clone();
        next.stack = Some(Arc::new(StackFrame {
            name,
            site: site.into(),
            depth,
            caller: self.stack.clone(),
        }));
        Ok(next)
    }

    pub fn call_trace(&self) -> CallTrace {
        let mut frames = Vec::with_capacity(self.depth());
        let mut current = self.stack.as_deref();
        while let Some(frame) = current {
            frames.push(TraceFrame {
                name: frame.name.clone(),
                site: frame.site.clone(),
            });
            current = frame.caller.as_deref();
        }
        frames.reverse();
        CallTrace { frames }
    }
}

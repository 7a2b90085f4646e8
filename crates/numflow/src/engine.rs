//! Session object tying registry, globals and configuration together
//!
//! Statements compile in order against the engine's environment, so a
//! `define` in one `compile` call is visible to the next.

use std::sync::Arc;

use log::debug;

use crate::compile::Compiler;
use crate::config::EngineConfig;
use crate::env::{Binding, Environment};
use crate::parse::parse_program;
use crate::registry::Registry;
use crate::runtime::{CompiledFunction, Constant, EvalContext};
use crate::store::ArrayStore;
use crate::value::Value;
use crate::FlowError;

/// Compiles and runs numflow source
///
/// # Example
///
/// ```ignore
/// let engine = Engine::new();
/// engine.run("define(sq(x), x * x)").await?;
/// let nine = engine.run("sq(3)").await?;
/// ```
#[derive(Clone)]
pub struct Engine {
    registry: Arc<Registry>,
    globals: Environment,
    config: EngineConfig,
    store: Option<Arc<dyn ArrayStore>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            registry: Registry::standard(),
            globals: Environment::new(),
            config: EngineConfig::default(),
            store: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ArrayStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    /// Bind a host value under `name`
    pub fn define_value(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.globals
            .define(name, Binding::Value(Constant::new(value.into())));
    }

    /// Compile every statement of `source`. Definitions bind immediately;
    /// the remaining statements form the returned zero-parameter function.
    pub fn compile(&self, source: &str) -> Result<CompiledFunction, FlowError> {
        let statements = parse_program(source)?;
        let main = Compiler::new(&self.registry).program(&statements, &self.globals)?;
        debug!("compiled {} statement(s)", statements.len());
        Ok(main)
    }

    /// Fresh evaluation context carrying this engine's settings
    pub fn context(&self) -> EvalContext {
        let mut ctx = EvalContext::new()
            .with_max_call_depth(self.config.max_call_depth)
            .with_parallel(self.config.parallel_operands);
        if let Some(locality) = &self.config.locality {
            ctx = ctx.with_locality(locality.clone());
        }
        if let Some(store) = &self.store {
            ctx = ctx.with_store(store.clone());
        }
        ctx
    }

    pub async fn run(&self, source: &str) -> Result<Value, FlowError> {
        let main = self.compile(source)?;
        Ok(main.run(self.context()).await?)
    }

    /// Run on a dedicated multi-threaded runtime sized by `worker_threads`.
    pub fn run_blocking(&self, source: &str) -> Result<Value, FlowError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.worker_threads.max(1))
            .enable_all()
            .build()?;
        runtime.block_on(self.run(source))
    }

    /// An engine whose definitions live in a child scope of these globals
    pub fn session(&self) -> Engine {
        Engine {
            registry: self.registry.clone(),
            globals: self.globals.child_scope(),
            config: self.config.clone(),
            store: self.store.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LocalStore;

    #[tokio::test]
    async fn definitions_persist_across_runs() {
        let engine = Engine::new();
        assert_eq!(engine.run("define(sq(x), x * x)").await.unwrap(), Value::Nil);
        assert_eq!(engine.run("sq(7)").await.unwrap(), Value::Int(49));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let engine = Engine::new();
        engine.define_value("scale", 2i64);
        let a = engine.session();
        let b = engine.session();
        a.run("define(scale, 10)").await.unwrap();
        assert_eq!(a.run("scale").await.unwrap(), Value::Int(10));
        assert_eq!(b.run("scale").await.unwrap(), Value::Int(2));
        assert_eq!(engine.run("scale").await.unwrap(), Value::Int(2));
    }

    #[tokio::test]
    async fn context_carries_config_and_store() {
        let store = LocalStore::new();
        store.insert("xs", vec![1.0, 2.0, 3.0]);
        let engine = Engine::new()
            .with_config(EngineConfig::new().with_max_call_depth(5))
            .with_store(Arc::new(store));
        let ctx = engine.context();
        assert_eq!(ctx.max_call_depth(), 5);
        assert_eq!(engine.run("len(fetch('xs'))").await.unwrap(), Value::Int(3));
    }

    #[test]
    fn blocking_run() {
        let engine = Engine::new().with_config(EngineConfig::new().with_worker_threads(2));
        assert_eq!(engine.run_blocking("max(1, 5, 3)").unwrap(), Value::Int(5));
    }

    #[test]
    fn failed_source_binds_nothing() {
        let engine = Engine::new();
        assert!(engine.compile("define(a, 1); a + nope").is_err());
        assert!(matches!(engine.compile("a"), Err(FlowError::Compile(_))));
    }

    #[test]
    fn errors_are_staged() {
        let engine = Engine::new();
        assert!(matches!(engine.compile("1 +"), Err(FlowError::Parse(_))));
        assert!(matches!(engine.compile("nope"), Err(FlowError::Compile(_))));
        assert!(matches!(engine.run_blocking("error('x')"), Err(FlowError::Eval(_))));
    }
}

//! Distribution primitives: locality and the shared array store
//!
//! These nodes read the evaluation context instead of their operands, so
//! they implement [`Primitive`] directly rather than going through a kernel.

use std::sync::Arc;

use futures::FutureExt;
use futures::future;

use crate::registry::Registry;
use crate::runtime::{
    Deferred, EvalContext, EvalError, EvalErrorKind, Frame, Node, Primitive, evaluate,
};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalityField {
    WorkerId,
    WorkerCount,
}

/// `worker_id()` / `worker_count()`; a context without locality is worker 0 of 1
pub struct LocalityQuery {
    field: LocalityField,
    label: String,
}

impl LocalityQuery {
    pub fn new(field: LocalityField, label: impl Into<String>) -> Node {
        Arc::new(Self {
            field,
            label: label.into(),
        })
    }
}

impl Primitive for LocalityQuery {
    fn name(&self) -> &str {
        match self.field {
            LocalityField::WorkerId => "worker_id",
            LocalityField::WorkerCount => "worker_count",
        }
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn evaluate(self: Arc<Self>, _frame: Frame, ctx: EvalContext) -> Deferred {
        let (worker, workers) = ctx
            .locality()
            .map_or((0, 1), |locality| (locality.worker, locality.workers));
        let n = match self.field {
            LocalityField::WorkerId => worker,
            LocalityField::WorkerCount => workers,
        };
        future::ready(Ok(Value::Int(n as i64))).boxed()
    }
}

/// `fetch(key)`: read a named value from the context's array store
pub struct Fetch {
    label: String,
    key: Node,
}

impl Fetch {
    pub fn new(label: impl Into<String>, key: Node) -> Node {
        Arc::new(Self {
            label: label.into(),
            key,
        })
    }
}

impl Primitive for Fetch {
    fn name(&self) -> &str {
        "fetch"
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn operands(&self) -> Vec<Node> {
        vec![self.key.clone()]
    }

    fn evaluate(self: Arc<Self>, frame: Frame, ctx: EvalContext) -> Deferred {
        async move {
            let key = match evaluate(self.key.clone(), frame, ctx.clone()).await? {
                Value::Str(key) => key,
                other => {
                    return Err(EvalError::new(
                        "fetch",
                        EvalErrorKind::type_mismatch("string", other.type_name()),
                        &ctx,
                    ));
                }
            };
            let Some(store) = ctx.store() else {
                return Err(EvalError::new(
                    "fetch",
                    EvalErrorKind::Store("no array store configured".into()),
                    &ctx,
                ));
            };
            store
                .fetch(&key)
                .await
                .map_err(|e| EvalError::new("fetch", EvalErrorKind::Store(e.to_string()), &ctx))
        }
        .boxed()
    }
}

pub(super) fn register(registry: &mut Registry) {
    registry.register_builtin(
        "worker_id",
        &["worker_id()"],
        "index of the worker running this evaluation",
        |_, _, label| Ok(LocalityQuery::new(LocalityField::WorkerId, label)),
    );
    registry.register_builtin(
        "worker_count",
        &["worker_count()"],
        "number of workers in the job",
        |_, _, label| Ok(LocalityQuery::new(LocalityField::WorkerCount, label)),
    );
    registry.register_builtin(
        "fetch",
        &["fetch(_key)"],
        "value stored under _key in the shared array store",
        |bindings, _, label| Ok(Fetch::new(label, bindings.one("_key")?)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::testing::{eval, eval_with};
    use crate::runtime::Locality;
    use crate::store::LocalStore;

    #[tokio::test]
    async fn locality_defaults_to_single_worker() {
        assert_eq!(eval("worker_id()").await.unwrap(), Value::Int(0));
        assert_eq!(eval("worker_count()").await.unwrap(), Value::Int(1));
    }

    #[tokio::test]
    async fn locality_comes_from_context() {
        let ctx = EvalContext::new().with_locality(Locality::new(2, 4));
        assert_eq!(
            eval_with("worker_id() * 10 + worker_count()", ctx).await.unwrap(),
            Value::Int(24)
        );
    }

    #[tokio::test]
    async fn fetch_reads_the_store() {
        let store = LocalStore::new();
        store.insert("weights", vec![0.5, 1.5]);
        let ctx = EvalContext::new().with_store(Arc::new(store));
        assert_eq!(
            eval_with("sum(fetch('weights'))", ctx.clone()).await.unwrap(),
            Value::Float(2.0)
        );

        let err = eval_with("fetch('missing')", ctx).await.unwrap_err();
        assert!(matches!(err.kind, EvalErrorKind::Store(_)));
    }

    #[tokio::test]
    async fn fetch_without_store() {
        let err = eval("fetch('x')").await.unwrap_err();
        assert_eq!(err.primitive, "fetch");
    }
}

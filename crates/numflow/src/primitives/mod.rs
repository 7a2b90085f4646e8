//! Built-in primitives
//!
//! [`standard`] registers them in resolution order: control forms, the fused
//! multiply-add, operators, array functions, constants, then the
//! distribution queries.

mod arith;
mod array;
mod control;
mod dist;

use std::sync::Arc;

use crate::compile::CompileError;
use crate::registry::{CompiledBindings, Registry};
use crate::runtime::{Constant, EvalErrorKind, Kernel, KernelFn, Node};
use crate::value::Value;

pub use dist::{Fetch, LocalityField, LocalityQuery};

/// Factory for a [`Kernel`] applying `f` to every capture in match order.
pub fn kernel<F>(
    f: F,
) -> impl Fn(&CompiledBindings, &str, &str) -> Result<Node, CompileError> + Send + Sync + 'static
where
    F: Fn(&[Value]) -> Result<Value, EvalErrorKind> + Send + Sync + 'static,
{
    let apply: KernelFn = Arc::new(f);
    move |bindings: &CompiledBindings, name: &str, label: &str| {
        Ok(Kernel::new(name, label, bindings.ordered(), apply.clone()))
    }
}

/// Build the standard registry.
pub fn standard() -> Registry {
    let mut registry = Registry::new();
    control::register(&mut registry);
    arith::register_fused(&mut registry);
    arith::register(&mut registry);
    array::register(&mut registry);
    registry.register_builtin("pi", &["pi"], "the constant π", |_, _, _| {
        Ok(Constant::new(Value::Float(std::f64::consts::PI)))
    });
    dist::register(&mut registry);
    registry
}

//! Compilation environment: a persistent chain of lexical scopes
//!
//! A child scope holds a shared reference to its parent and never writes to
//! it. Defining a name in a scope shadows outer bindings of that name.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use log::warn;

use crate::runtime::{FunctionDef, Node};

/// What a name denotes at compile time
#[derive(Clone)]
pub enum Binding {
    /// A compiled expression; references reuse the node
    Value(Node),
    /// A named function, called through a lookup at call time
    Function(Arc<FunctionDef>),
    /// Argument `index` of the function whose parameters live at `depth`
    Param { depth: usize, index: usize },
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(node) => write!(f, "Value({})", node.label()),
            Binding::Function(def) => write!(f, "Function({}/{})", def.name, def.params.len()),
            Binding::Param { depth, index } => write!(f, "Param({depth}, {index})"),
        }
    }
}

#[derive(Clone)]
pub struct Environment(Arc<Scope>);

struct Scope {
    parent: Option<Environment>,
    depth: usize,
    bindings: RwLock<IndexMap<String, Binding>>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// A fresh global scope
    pub fn new() -> Self {
        Self::with_parent(None, 0)
    }

    fn with_parent(parent: Option<Environment>, depth: usize) -> Self {
        Self(Arc::new(Scope {
            parent,
            depth,
            bindings: RwLock::new(IndexMap::new()),
        }))
    }

    /// Nested lexical scope at the same function depth (`block`, sessions)
    pub fn child_scope(&self) -> Environment {
        Self::with_parent(Some(self.clone()), self.0.depth)
    }

    /// Scope for a function body with its parameters bound.
    pub fn function_scope(&self, params: &[String]) -> Environment {
        let depth = self.0.depth + 1;
        let scope = Self::with_parent(Some(self.clone()), depth);
        {
            let mut bindings = scope.write();
            for (index, param) in params.iter().enumerate() {
                bindings.insert(param.clone(), Binding::Param { depth, index });
            }
        }
        scope
    }

    /// Function nesting depth; the global scope is 0
    pub fn depth(&self) -> usize {
        self.0.depth
    }

    /// Bind `name` in this scope, returning what it replaced here.
    pub fn define(&self, name: impl Into<String>, binding: Binding) -> Option<Binding> {
        let name = name.into();
        let previous = self.write().insert(name.clone(), binding);
        if previous.is_some() {
            warn!("redefining '{name}' in the same scope");
        }
        previous
    }

    /// Put back what `define` returned, undoing it without a warning.
    pub(crate) fn restore(&self, name: &str, previous: Option<Binding>) {
        let mut bindings = self.write();
        match previous {
            Some(binding) => {
                bindings.insert(name.to_string(), binding);
            }
            None => {
                bindings.shift_remove(name);
            }
        }
    }

    /// Innermost binding of `name`, searching outward
    pub fn lookup(&self, name: &str) -> Option<Binding> {
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(binding) = env.read_local(name) {
                return Some(binding);
            }
            scope = env.0.parent.as_ref();
        }
        None
    }

    /// Names bound directly in this scope, in definition order
    pub fn names(&self) -> Vec<String> {
        self.0
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn read_local(&self, name: &str) -> Option<Binding> {
        self.0
            .bindings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<String, Binding>> {
        self.0
            .bindings
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("depth", &self.0.depth)
            .field("names", &self.names())
            .field("parent", &self.0.parent)
            .finish()
    }
}

//! Runtime values

use std::fmt;
use std::sync::Arc;

use crate::runtime::{CompiledFunction, EvalErrorKind};

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Array(Arc<[f64]>),
    Function(CompiledFunction),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
        }
    }

    /// Numeric scalar as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn expect_f64(&self) -> Result<f64, EvalErrorKind> {
        self.as_f64()
            .ok_or_else(|| EvalErrorKind::type_mismatch("number", self.type_name()))
    }

    pub fn expect_bool(&self) -> Result<bool, EvalErrorKind> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalErrorKind::type_mismatch("bool", other.type_name())),
        }
    }

    pub fn expect_array(&self) -> Result<&[f64], EvalErrorKind> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(EvalErrorKind::type_mismatch("array", other.type_name())),
        }
    }

    pub fn as_function(&self) -> Option<&CompiledFunction> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn array(items: impl Into<Arc<[f64]>>) -> Value {
        Value::Array(items.into())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x:?})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Array(items) => write!(f, "Array({items:?})"),
            Value::Function(func) => write!(f, "Function({}/{})", func.name(), func.arity()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, x) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x:?}")?;
                }
                write!(f, "]")
            }
            Value::Function(func) => write!(f, "<fn {}/{}>", func.name(), func.arity()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<Vec<f64>> for Value {
    fn from(items: Vec<f64>) -> Self {
        Value::Array(items.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_float_marker() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::from(vec![1.0, 2.5]).to_string(), "[1.0, 2.5]");
        assert_eq!(Value::from("hi").to_string(), "hi");
    }

    #[test]
    fn equality_is_type_strict() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::from(vec![1.0]), Value::array(vec![1.0]));
    }

    #[test]
    fn expectations_report_the_actual_type() {
        let err = Value::Bool(true).expect_f64().unwrap_err();
        assert_eq!(err, EvalErrorKind::type_mismatch("number", "bool"));
    }
}

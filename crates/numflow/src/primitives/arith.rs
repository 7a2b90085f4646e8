//! Operators: arithmetic, comparison and logic
//!
//! Int op Int stays Int while it fits; overflow falls back to Float. `/` is
//! always float division. Arrays broadcast against scalars and combine
//! elementwise with arrays of the same length.

use std::cmp::Ordering;

use super::kernel;
use crate::ast::Operator;
use crate::registry::Registry;
use crate::runtime::EvalErrorKind;
use crate::value::Value;

type Result<T> = std::result::Result<T, EvalErrorKind>;

const BINARY: [Operator; 14] = [
    Operator::Or,
    Operator::And,
    Operator::Eq,
    Operator::Ne,
    Operator::Lt,
    Operator::Le,
    Operator::Gt,
    Operator::Ge,
    Operator::Add,
    Operator::Sub,
    Operator::Mul,
    Operator::Div,
    Operator::Mod,
    Operator::Pow,
];

pub(super) fn register_fused(registry: &mut Registry) {
    registry.register_builtin(
        "fma",
        &["_a * _b + _c", "fma(_a, _b, _c)"],
        "fused multiply-add of scalars or arrays",
        kernel(|args| match args {
            [a, b, c] => binary(Operator::Add, &binary(Operator::Mul, a, b)?, c),
            _ => Err(arity("fma", 3, args.len())),
        }),
    );
}

pub(super) fn register(registry: &mut Registry) {
    for op in BINARY {
        let symbol = op.symbol();
        let pattern = format!("_1 {symbol} _2");
        registry.register_builtin(
            symbol,
            &[pattern.as_str()],
            help(op),
            kernel(move |args| match args {
                [lhs, rhs] => binary(op, lhs, rhs),
                _ => Err(arity(op.symbol(), 2, args.len())),
            }),
        );
    }

    registry.register_builtin(
        "neg",
        &["-_1"],
        "numeric negation, elementwise on arrays",
        kernel(|args| match args {
            [Value::Int(n)] => Ok(n
                .checked_neg()
                .map_or(Value::Float(-(*n as f64)), Value::Int)),
            [Value::Array(items)] => Ok(items.iter().map(|x| -x).collect::<Vec<_>>().into()),
            [other] => Ok(Value::Float(-other.expect_f64()?)),
            _ => Err(arity("neg", 1, args.len())),
        }),
    );

    registry.register_builtin(
        "not",
        &["!_1"],
        "logical negation",
        kernel(|args| match args {
            [value] => Ok(Value::Bool(!value.expect_bool()?)),
            _ => Err(arity("not", 1, args.len())),
        }),
    );
}

fn help(op: Operator) -> &'static str {
    match op {
        Operator::Or | Operator::And => "logical operator on bools",
        Operator::Eq | Operator::Ne => "equality; numbers compare by value across int and float",
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
            "ordering of numbers or strings"
        }
        Operator::Add => "addition; concatenates strings",
        Operator::Div => "float division",
        _ => "arithmetic, elementwise on arrays",
    }
}

fn arity(name: &str, expected: usize, got: usize) -> EvalErrorKind {
    EvalErrorKind::Internal(format!("{name} expects {expected} operands, got {got}"))
}

fn binary(op: Operator, lhs: &Value, rhs: &Value) -> Result<Value> {
    match op {
        Operator::Eq => Ok(Value::Bool(equal(lhs, rhs))),
        Operator::Ne => Ok(Value::Bool(!equal(lhs, rhs))),
        Operator::And => Ok(Value::Bool(lhs.expect_bool()? && rhs.expect_bool()?)),
        Operator::Or => Ok(Value::Bool(lhs.expect_bool()? || rhs.expect_bool()?)),
        Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => compare(op, lhs, rhs),
        _ => arithmetic(op, lhs, rhs),
    }
}

fn equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            lhs.as_f64() == rhs.as_f64()
        }
        _ => lhs == rhs,
    }
}

fn compare(op: Operator, lhs: &Value, rhs: &Value) -> Result<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => lhs.expect_f64()?.partial_cmp(&rhs.expect_f64()?),
    };
    // NaN is unordered: every comparison is false
    let holds = ordering.is_some_and(|ord| match op {
        Operator::Lt => ord == Ordering::Less,
        Operator::Le => ord != Ordering::Greater,
        Operator::Gt => ord == Ordering::Greater,
        Operator::Ge => ord != Ordering::Less,
        _ => false,
    });
    Ok(Value::Bool(holds))
}

fn arithmetic(op: Operator, lhs: &Value, rhs: &Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            if op == Operator::Mod && *b == 0 {
                return Err(EvalErrorKind::DivisionByZero);
            }
            Ok(int_op(op, *a, *b).map_or_else(
                || Value::Float(float_op(op, *a as f64, *b as f64)),
                Value::Int,
            ))
        }
        (Value::Str(a), Value::Str(b)) if op == Operator::Add => {
            Ok(Value::Str(format!("{a}{b}").into()))
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(EvalErrorKind::DimensionMismatch {
                    left: a.len(),
                    right: b.len(),
                });
            }
            let items: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| float_op(op, *x, *y)).collect();
            Ok(items.into())
        }
        (Value::Array(a), scalar) => {
            let s = scalar.expect_f64()?;
            Ok(a.iter().map(|x| float_op(op, *x, s)).collect::<Vec<_>>().into())
        }
        (scalar, Value::Array(b)) => {
            let s = scalar.expect_f64()?;
            Ok(b.iter().map(|y| float_op(op, s, *y)).collect::<Vec<_>>().into())
        }
        _ => Ok(Value::Float(float_op(op, lhs.expect_f64()?, rhs.expect_f64()?))),
    }
}

/// Integer result, or `None` when it does not fit or is not integral.
fn int_op(op: Operator, a: i64, b: i64) -> Option<i64> {
    match op {
        Operator::Add => a.checked_add(b),
        Operator::Sub => a.checked_sub(b),
        Operator::Mul => a.checked_mul(b),
        Operator::Mod => a.checked_rem(b),
        Operator::Pow => u32::try_from(b).ok().and_then(|e| a.checked_pow(e)),
        _ => None,
    }
}

fn float_op(op: Operator, a: f64, b: f64) -> f64 {
    match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mul => a * b,
        Operator::Div => a / b,
        Operator::Mod => a % b,
        Operator::Pow => a.powf(b),
        // only arithmetic operators reach here
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::testing::eval;

    #[test]
    fn ints_stay_ints_until_overflow() {
        assert_eq!(binary(Operator::Add, &Value::Int(2), &Value::Int(3)), Ok(Value::Int(5)));
        assert_eq!(
            binary(Operator::Mul, &Value::Int(i64::MAX), &Value::Int(2)),
            Ok(Value::Float(i64::MAX as f64 * 2.0))
        );
        assert_eq!(binary(Operator::Div, &Value::Int(7), &Value::Int(2)), Ok(Value::Float(3.5)));
        assert_eq!(binary(Operator::Pow, &Value::Int(2), &Value::Int(10)), Ok(Value::Int(1024)));
        assert_eq!(binary(Operator::Pow, &Value::Int(2), &Value::Int(-1)), Ok(Value::Float(0.5)));
    }

    #[test]
    fn modulo_by_zero() {
        assert_eq!(
            binary(Operator::Mod, &Value::Int(1), &Value::Int(0)),
            Err(EvalErrorKind::DivisionByZero)
        );
    }

    #[test]
    fn arrays_broadcast_and_zip() {
        let xs = Value::from(vec![1.0, 2.0]);
        assert_eq!(
            binary(Operator::Mul, &xs, &Value::Int(3)),
            Ok(Value::from(vec![3.0, 6.0]))
        );
        assert_eq!(
            binary(Operator::Sub, &Value::Int(1), &xs),
            Ok(Value::from(vec![0.0, -1.0]))
        );
        assert_eq!(binary(Operator::Add, &xs, &xs), Ok(Value::from(vec![2.0, 4.0])));
        assert_eq!(
            binary(Operator::Add, &xs, &Value::from(vec![1.0])),
            Err(EvalErrorKind::DimensionMismatch { left: 2, right: 1 })
        );
    }

    #[test]
    fn comparisons_and_equality() {
        assert_eq!(binary(Operator::Eq, &Value::Int(1), &Value::Float(1.0)), Ok(Value::Bool(true)));
        assert_eq!(binary(Operator::Ne, &Value::from("a"), &Value::Int(1)), Ok(Value::Bool(true)));
        assert_eq!(binary(Operator::Le, &Value::from("a"), &Value::from("b")), Ok(Value::Bool(true)));
        assert_eq!(
            binary(Operator::Gt, &Value::Float(f64::NAN), &Value::Int(1)),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            binary(Operator::And, &Value::Int(1), &Value::Bool(true)),
            Err(EvalErrorKind::type_mismatch("bool", "int"))
        );
    }

    #[tokio::test]
    async fn operators_follow_precedence_end_to_end() {
        assert_eq!(eval("1 + 2 * 3").await.unwrap(), Value::Int(7));
        assert_eq!(eval("10 - 4 - 3").await.unwrap(), Value::Int(3));
        assert_eq!(eval("2 * 3 + 4 * 5").await.unwrap(), Value::Int(26));
        assert_eq!(eval("1 + 2 < 4 && !false").await.unwrap(), Value::Bool(true));
        assert_eq!(eval("-2 ^ 2").await.unwrap(), Value::Int(4));
        assert_eq!(eval("'ab' + 'cd'").await.unwrap(), Value::from("abcd"));
    }

    #[tokio::test]
    async fn fused_multiply_add() {
        assert_eq!(eval("fma(2, 3, 4)").await.unwrap(), Value::Int(10));
        assert_eq!(eval("array(1, 2) * 2 + 1").await.unwrap(), Value::from(vec![3.0, 5.0]));
    }
}

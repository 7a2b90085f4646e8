use super::kernel;
use crate::registry::Registry;
use crate::runtime::EvalErrorKind;
use crate::value::Value;

pub(super) fn register(registry: &mut Registry) {
    registry.register_builtin(
        "array",
        &["array(_first, __rest)"],
        "array of the given numbers",
        kernel(|args| {
            let items = args
                .iter()
                .map(Value::expect_f64)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items.into())
        }),
    );

    registry.register_builtin(
        "len",
        &["len(_a)"],
        "number of elements of an array, or characters of a string",
        kernel(|args| match args {
            [Value::Array(items)] => Ok(Value::Int(items.len() as i64)),
            [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
            [other] => Err(EvalErrorKind::type_mismatch("array or string", other.type_name())),
            _ => Err(EvalErrorKind::Internal("len expects one operand".into())),
        }),
    );

    registry.register_builtin(
        "sum",
        &["sum(_a)"],
        "sum of an array",
        kernel(|args| match args {
            [value] => Ok(Value::Float(value.expect_array()?.iter().sum())),
            _ => Err(EvalErrorKind::Internal("sum expects one operand".into())),
        }),
    );

    registry.register_builtin(
        "max",
        &["max(_first, __rest)"],
        "largest of the arguments, or of a single array",
        kernel(max),
    );

    registry.register_builtin(
        "range",
        &["range(_n)"],
        "array [0, 1, ..., _n - 1]",
        kernel(|args| match args {
            [Value::Int(n)] if *n >= 0 => Ok((0..*n).map(|i| i as f64).collect::<Vec<_>>().into()),
            [other] => Err(EvalErrorKind::type_mismatch(
                "non-negative int",
                other.to_string(),
            )),
            _ => Err(EvalErrorKind::Internal("range expects one operand".into())),
        }),
    );
}

fn max(args: &[Value]) -> Result<Value, EvalErrorKind> {
    if let [Value::Array(items)] = args {
        return items
            .iter()
            .copied()
            .reduce(f64::max)
            .map(Value::Float)
            .ok_or_else(|| EvalErrorKind::type_mismatch("non-empty array", "empty array"));
    }
    if args.iter().all(|v| matches!(v, Value::Int(_))) {
        let largest = args
            .iter()
            .filter_map(|v| match v {
                Value::Int(n) => Some(*n),
                _ => None,
            })
            .max();
        if let Some(n) = largest {
            return Ok(Value::Int(n));
        }
    }
    let mut largest = f64::NEG_INFINITY;
    for value in args {
        largest = largest.max(value.expect_f64()?);
    }
    Ok(Value::Float(largest))
}

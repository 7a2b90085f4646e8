use super::kernel;
use crate::registry::Registry;
use crate::runtime::{Conditional, EvalErrorKind};

pub(super) fn register(registry: &mut Registry) {
    registry.register_builtin(
        "if",
        &["if(_cond, _then, _else)"],
        "evaluate _then when _cond is true, otherwise _else; the other branch never runs",
        |bindings, _, label| {
            Ok(Conditional::new(
                label,
                bindings.one("_cond")?,
                bindings.one("_then")?,
                bindings.one("_else")?,
            ))
        },
    );

    registry.register_builtin(
        "error",
        &["error(_message)"],
        "fail the evaluation with _message",
        kernel(|args| {
            let message = args.first().map(ToString::to_string).unwrap_or_default();
            Err(EvalErrorKind::Raised(message))
        }),
    );
}

#[cfg(test)]
mod tests {
    use crate::primitives::testing::eval;
    use crate::runtime::EvalErrorKind;
    use crate::value::Value;

    #[tokio::test]
    async fn if_runs_only_the_chosen_branch() {
        assert_eq!(eval("if(1 < 2, 10, error('no'))").await.unwrap(), Value::Int(10));
        assert_eq!(eval("if(false, error('no'), 'else')").await.unwrap(), Value::from("else"));
    }

    #[tokio::test]
    async fn if_requires_a_bool() {
        let err = eval("if(1, 2, 3)").await.unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::type_mismatch("bool", "int"));
    }

    #[tokio::test]
    async fn error_raises_its_message() {
        let err = eval("error('bad input')").await.unwrap_err();
        assert_eq!(err.primitive, "error");
        assert_eq!(err.kind, EvalErrorKind::Raised("bad input".into()));
        assert_eq!(err.frame_names(), vec!["main"]);
    }
}

use mb_core::{ErrorKind, KeyCode, MboxError, Modifiers};
use rhai::{Dynamic, EvalAltResult, FnPtr, Position, INT};

pub(crate) fn throw(error: MboxError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(Dynamic::from(error), Position::NONE))
}

pub(crate) fn from_rhai_error(error: &EvalAltResult) -> MboxError {
    match error {
        EvalAltResult::ErrorRuntime(value, position) => {
            match value.clone().flatten().try_cast::<MboxError>() {
                Some(inner) => inner,
                None => MboxError::new(
                    ErrorKind::ScriptRuntime,
                    format!("{} ({})", value, position),
                ),
            }
        }
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => from_rhai_error(inner),
        EvalAltResult::ErrorInModule(_, inner, _) => from_rhai_error(inner),
        EvalAltResult::ErrorTooManyOperations(position) => MboxError::new(
            ErrorKind::TooManyOperations,
            format!("Script exceeded its operation budget ({}).", position),
        ),
        EvalAltResult::ErrorStackOverflow(position) => MboxError::new(
            ErrorKind::StackRecursion,
            format!("Script call depth overflowed ({}).", position),
        ),
        other => MboxError::new(ErrorKind::ScriptRuntime, other.to_string()),
    }
}

pub(crate) fn describe(value: &Dynamic) -> String {
    if value.is_unit() {
        "()".to_string()
    } else {
        value.type_name().to_string()
    }
}

pub(crate) fn invalid_argument(verb: &str, message: impl AsRef<str>) -> MboxError {
    MboxError::new(
        ErrorKind::InvalidArgument,
        format!("mbox::{} {}", verb, message.as_ref()),
    )
}

pub(crate) fn int_arg(verb: &str, value: &Dynamic, what: &str) -> Result<INT, MboxError> {
    value.as_int().map_err(|found| {
        invalid_argument(verb, format!("expects {} as integer, got {}.", what, found))
    })
}

pub(crate) fn key_arg(verb: &str, value: &Dynamic) -> Result<KeyCode, MboxError> {
    let raw = int_arg(verb, value, "key")?;
    KeyCode::try_from(raw)
        .ok()
        .filter(|key| *key != 0)
        .ok_or_else(|| invalid_argument(verb, format!("key {} is not a virtual key code.", raw)))
}

pub(crate) fn modifiers_arg(verb: &str, value: &Dynamic) -> Result<Modifiers, MboxError> {
    let raw = int_arg(verb, value, "modifiers")?;
    u8::try_from(raw)
        .ok()
        .and_then(Modifiers::from_bits)
        .ok_or_else(|| {
            invalid_argument(
                verb,
                format!("modifiers {} are not a combination of SHIFT, CONTROL and ALT.", raw),
            )
        })
}

pub(crate) fn fn_ptr_arg(verb: &str, value: &Dynamic) -> Result<FnPtr, MboxError> {
    value.clone().try_cast::<FnPtr>().ok_or_else(|| {
        invalid_argument(
            verb,
            format!("expects a callback function, got {}.", describe(value)),
        )
    })
}

#[cfg(test)]
mod rhai_bridge_tests {
    use super::*;

    #[test]
    fn thrown_errors_keep_their_kind_through_call_wrappers() {
        let thrown = throw(MboxError::new(ErrorKind::StackRecursion, "a -> b"));
        let wrapped = EvalAltResult::ErrorInFunctionCall(
            "RunScript".to_string(),
            String::new(),
            thrown,
            Position::NONE,
        );
        let error = from_rhai_error(&wrapped);
        assert_eq!(error.kind, ErrorKind::StackRecursion);
        assert_eq!(error.message, "a -> b");
    }

    #[test]
    fn plain_throws_become_runtime_errors() {
        let error = from_rhai_error(&EvalAltResult::ErrorRuntime(
            Dynamic::from("boom"),
            Position::NONE,
        ));
        assert_eq!(error.kind, ErrorKind::ScriptRuntime);
        assert!(error.message.contains("boom"));
    }

    #[test]
    fn key_and_modifier_arguments_are_range_checked() {
        assert_eq!(key_arg("SendKeyPress", &Dynamic::from(0x70 as INT)).expect("key"), 0x70);
        let error = key_arg("SendKeyPress", &Dynamic::from(0x1_0000 as INT)).expect_err("range");
        assert_eq!(error.kind, ErrorKind::InvalidArgument);
        assert!(error.message.starts_with("mbox::SendKeyPress"));
        key_arg("SendKeyPress", &Dynamic::from("F1")).expect_err("type");

        let mods = modifiers_arg("OnKeyDown", &Dynamic::from(3 as INT)).expect("mods");
        assert_eq!(mods, Modifiers::SHIFT | Modifiers::CONTROL);
        modifiers_arg("OnKeyDown", &Dynamic::from(8 as INT)).expect_err("unknown bit");
    }
}

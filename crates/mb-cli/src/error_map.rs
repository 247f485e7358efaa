use std::fmt::Display;

use mb_core::{ErrorKind, MboxError};

fn map_error(kind: ErrorKind, error: impl Display) -> MboxError {
    MboxError::new(kind, error.to_string())
}

pub(crate) fn json_line<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

pub(crate) fn emit_errors(errors: &[MboxError]) -> i32 {
    println!("RESULT:ERROR");
    for error in errors {
        println!("ERROR_KIND:{}", error.kind);
        let message = match &error.path {
            Some(path) => format!("{}: {}", path, error.message),
            None => error.message.clone(),
        };
        println!("ERROR_MSG_JSON:{}", json_line(&message));
    }
    1
}

pub(crate) fn emit_error(error: MboxError) -> i32 {
    emit_errors(&[error])
}

pub(crate) fn map_cli_io(error: std::io::Error) -> MboxError {
    map_error(ErrorKind::CliIo, error)
}

pub(crate) fn map_cli_session_invalid(error: serde_json::Error) -> MboxError {
    map_error(ErrorKind::CliSessionInvalid, error)
}

#[cfg(test)]
mod error_map_tests {
    use super::*;

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(MboxError::new(ErrorKind::InvalidParty, "failed"));
        assert_eq!(code, 1);
    }

    #[test]
    fn mapping_helpers_keep_error_kinds() {
        assert_eq!(map_cli_io(std::io::Error::other("io")).kind, ErrorKind::CliIo);
        let invalid = serde_json::from_str::<u32>("nope").expect_err("bad json");
        assert_eq!(
            map_cli_session_invalid(invalid).kind,
            ErrorKind::CliSessionInvalid
        );
    }
}

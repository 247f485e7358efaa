use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidObjectName,
    InvalidObjectIndex,
    InvalidObjectParent,
    InvalidObjectAncestor,
    InvalidObjectReferences,
    SelfReference,
    DuplicateReference,
    InvalidReferenceName,
    InvalidParty,
    ScriptCompile,
    ScriptRuntime,
    InvalidArgument,
    NotEnoughMacros,
    TooManyActions,
    TooManyOperations,
    StackRecursion,
    CharacterNotAssembled,
    InvalidState,
    EngineStopped,
    CliIo,
    CliSessionInvalid,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidObjectName => "invalid_object_name",
            Self::InvalidObjectIndex => "invalid_object_index",
            Self::InvalidObjectParent => "invalid_object_parent",
            Self::InvalidObjectAncestor => "invalid_object_ancestor",
            Self::InvalidObjectReferences => "invalid_object_references",
            Self::SelfReference => "self_reference",
            Self::DuplicateReference => "duplicate_reference",
            Self::InvalidReferenceName => "invalid_reference_name",
            Self::InvalidParty => "invalid_party",
            Self::ScriptCompile => "script_compile",
            Self::ScriptRuntime => "script_runtime",
            Self::InvalidArgument => "invalid_argument",
            Self::NotEnoughMacros => "not_enough_macros",
            Self::TooManyActions => "too_many_actions",
            Self::TooManyOperations => "too_many_operations",
            Self::StackRecursion => "stack_recursion",
            Self::CharacterNotAssembled => "character_not_assembled",
            Self::InvalidState => "invalid_state",
            Self::EngineStopped => "engine_stopped",
            Self::CliIo => "cli_io",
            Self::CliSessionInvalid => "cli_session_invalid",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct MboxError {
    pub kind: ErrorKind,
    pub message: String,
    pub path: Option<String>,
}

impl MboxError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn display_uses_snake_case_kind() {
        let error = MboxError::new(ErrorKind::NotEnoughMacros, "need 4 macros, pool has 3");
        assert_eq!(error.to_string(), "not_enough_macros: need 4 macros, pool has 3");
        assert!(error.path.is_none());
    }

    #[test]
    fn serde_name_matches_display() {
        let json = serde_json::to_string(&ErrorKind::InvalidObjectReferences).expect("json");
        assert_eq!(json, "\"invalid_object_references\"");
    }

    #[test]
    fn with_path_attaches_object_path() {
        let error = MboxError::new(ErrorKind::ScriptCompile, "syntax").with_path("Main/Alice");
        assert_eq!(error.path.as_deref(), Some("Main/Alice"));
    }
}

use std::fs;
use std::path::Path;

use mb_api::{Input, Session};
use mb_core::{ErrorKind, MboxError, ObjectId};
use serde::{Deserialize, Serialize};

use crate::{map_cli_io, map_cli_session_invalid};

/// One recorded input and the window it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PostedInput {
    pub(crate) character: ObjectId,
    pub(crate) input: Input,
}

fn read_file(path: &Path) -> Result<String, MboxError> {
    if !path.exists() {
        return Err(MboxError::new(
            ErrorKind::CliIo,
            format!("File does not exist: {}", path.display()),
        ));
    }
    fs::read_to_string(path).map_err(map_cli_io)
}

pub(crate) fn load_session(path: &Path) -> Result<Session, MboxError> {
    let raw = read_file(path)?;
    serde_json::from_str(&raw).map_err(map_cli_session_invalid)
}

pub(crate) fn load_inputs(path: &Path) -> Result<Vec<PostedInput>, MboxError> {
    let raw = read_file(path)?;
    serde_json::from_str(&raw).map_err(map_cli_session_invalid)
}

pub(crate) fn write_file(path: &Path, content: &str) -> Result<(), MboxError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(map_cli_io)?;
    }
    fs::write(path, content).map_err(map_cli_io)
}

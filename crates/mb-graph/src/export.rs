use mb_core::{ErrorKind, Keybind, MboxError, ObjectId};
use serde::{Deserialize, Serialize};

use crate::{MacroAllocation, ObjectGraph};

pub const VAR_MACRO_TARGET_PLACEHOLDER: &str = "{target}";

/// One physical keybind and the macro text it carries in one character's client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroBinding {
    pub keybind: Keybind,
    pub character: ObjectId,
    pub character_name: String,
    pub object: ObjectId,
    pub object_name: String,
    pub target: Option<ObjectId>,
    pub text: String,
}

pub fn export_bindings(graph: &ObjectGraph, allocation: &MacroAllocation) -> Vec<MacroBinding> {
    allocation
        .assignments
        .iter()
        .map(|slot| {
            let name_of = |id: ObjectId| {
                graph
                    .find(id)
                    .map(|object| object.name.clone())
                    .unwrap_or_default()
            };
            let source = graph
                .find(slot.object)
                .map(|object| object.value.clone())
                .unwrap_or_default();
            let text = match slot.target {
                Some(target) => source.replace(VAR_MACRO_TARGET_PLACEHOLDER, &name_of(target)),
                None => source,
            };
            MacroBinding {
                keybind: slot.keybind,
                character: slot.character,
                character_name: name_of(slot.character),
                object: slot.object,
                object_name: name_of(slot.object),
                target: slot.target,
                text,
            }
        })
        .collect()
}

pub fn render_bindings_json(bindings: &[MacroBinding]) -> Result<String, MboxError> {
    serde_json::to_string_pretty(bindings).map_err(|error| {
        MboxError::new(
            ErrorKind::InvalidState,
            format!("Macro bindings could not be serialized: {}", error),
        )
    })
}

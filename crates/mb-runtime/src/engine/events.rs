use std::rc::Rc;

use mb_core::{KeyCode, MboxError, Modifiers, ObjectId};
use rhai::{FnPtr, AST};
use serde::{Deserialize, Serialize};

use super::state::{CharacterId, EventId};
use crate::OutputBatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    User,
    Timer,
    KeyPress,
    KeyRelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Input {
    KeyPress {
        key: KeyCode,
        #[serde(default)]
        modifiers: Modifiers,
    },
    KeyRelease {
        key: KeyCode,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Timer {
        timer: ObjectId,
    },
    Other,
}

impl Input {
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Input::KeyPress { .. } => Some(EventKind::KeyPress),
            Input::KeyRelease { .. } => Some(EventKind::KeyRelease),
            Input::Timer { .. } => Some(EventKind::Timer),
            Input::Other => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct Event {
    pub(crate) id: EventId,
    pub(crate) owner: CharacterId,
    pub(crate) kind: EventKind,
    pub(crate) key: KeyCode,
    pub(crate) modifiers: Modifiers,
    pub(crate) object: Option<ObjectId>,
    pub(crate) source: ObjectId,
    pub(crate) callback: FnPtr,
    pub(crate) ast: Rc<AST>,
}

impl Event {
    pub(crate) fn matches(&self, input: &Input) -> bool {
        match (self.kind, input) {
            (EventKind::KeyPress, Input::KeyPress { key, modifiers })
            | (EventKind::KeyRelease, Input::KeyRelease { key, modifiers }) => {
                self.key == *key && modifiers.contains(self.modifiers)
            }
            (EventKind::Timer, Input::Timer { timer }) => self.object == Some(*timer),
            _ => false,
        }
    }

    pub(crate) fn matches_user(&self, object: ObjectId) -> bool {
        self.kind == EventKind::User && self.object == Some(object)
    }

    pub(crate) fn describe(&self) -> String {
        match self.kind {
            EventKind::KeyPress | EventKind::KeyRelease => format!(
                "event {} {:?} {}",
                self.id.0,
                self.kind,
                mb_core::Keybind::new(self.key, self.modifiers)
            ),
            EventKind::User | EventKind::Timer => format!(
                "event {} {:?} {}",
                self.id.0,
                self.kind,
                self.object.map_or_else(String::new, |id| id.to_string())
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionError {
    pub character: ObjectId,
    pub error: MboxError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub batches: Vec<OutputBatch>,
    pub errors: Vec<ActionError>,
}

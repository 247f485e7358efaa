use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use std::sync::Arc;

use mb_core::{ErrorKind, Keybind, MboxError, ObjectId, ObjectType};
use mb_graph::ObjectGraph;
use rhai::AST;
use tracing::debug;

use super::events::Event;
use super::RuntimeLimits;
use crate::batch::SendRequest;
use crate::TraceSink;

pub(crate) type SharedState = Rc<RefCell<RuntimeState>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacterId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EventId(pub(crate) usize);

#[derive(Debug)]
pub(crate) struct CharacterState {
    pub(crate) object: ObjectId,
    pub(crate) name: String,
    pub(crate) slot: Option<usize>,
    pub(crate) groups: BTreeSet<GroupId>,
    // Groups whose script already ran for this character.
    pub(crate) bound_groups: BTreeSet<GroupId>,
    pub(crate) scripts: HashMap<ObjectId, Rc<AST>>,
    pub(crate) macros: BTreeMap<ObjectId, Keybind>,
    pub(crate) var_macros: BTreeMap<(ObjectId, ObjectId), Keybind>,
    pub(crate) events: BTreeSet<EventId>,
    pub(crate) errors: Vec<MboxError>,
}

impl CharacterState {
    pub(crate) fn new(object: ObjectId, name: String) -> Self {
        Self {
            object,
            name,
            slot: None,
            groups: BTreeSet::new(),
            bound_groups: BTreeSet::new(),
            scripts: HashMap::new(),
            macros: BTreeMap::new(),
            var_macros: BTreeMap::new(),
            events: BTreeSet::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct GroupState {
    pub(crate) object: ObjectId,
    pub(crate) name: String,
    pub(crate) members: BTreeSet<CharacterId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Frame {
    pub(crate) character: Option<CharacterId>,
    pub(crate) object: ObjectId,
    pub(crate) ast: Rc<AST>,
}

#[derive(Default)]
pub(crate) struct RuntimeState {
    pub(crate) graph: ObjectGraph,
    pub(crate) party: Option<ObjectId>,
    pub(crate) pool: Vec<Keybind>,
    pub(crate) limits: RuntimeLimits,
    pub(crate) trace: Option<Arc<dyn TraceSink>>,

    pub(crate) characters: Vec<CharacterState>,
    pub(crate) character_by_object: BTreeMap<ObjectId, CharacterId>,
    pub(crate) groups: Vec<GroupState>,
    pub(crate) group_by_object: BTreeMap<ObjectId, GroupId>,
    pub(crate) slots: BTreeMap<usize, CharacterId>,
    pub(crate) party_scripts: HashMap<ObjectId, Rc<AST>>,

    pub(crate) events: Vec<Event>,
    pub(crate) stack: Vec<Frame>,
    pub(crate) sends: Vec<SendRequest>,
    pub(crate) actions_this_pass: usize,
}

impl RuntimeState {
    pub(crate) fn trace(&self, line: &str) {
        let depth = self.stack.len();
        debug!(target: "mbox", "{}{}", "  ".repeat(depth), line);
        if let Some(sink) = &self.trace {
            sink.trace(depth, line);
        }
    }

    pub(crate) fn character(&self, id: CharacterId) -> Result<&CharacterState, MboxError> {
        self.characters.get(id.0).ok_or_else(|| {
            MboxError::new(
                ErrorKind::InvalidState,
                format!("Character handle {} is stale.", id.0),
            )
        })
    }

    pub(crate) fn character_mut(
        &mut self,
        id: CharacterId,
    ) -> Result<&mut CharacterState, MboxError> {
        self.characters.get_mut(id.0).ok_or_else(|| {
            MboxError::new(
                ErrorKind::InvalidState,
                format!("Character handle {} is stale.", id.0),
            )
        })
    }

    pub(crate) fn group(&self, id: GroupId) -> Result<&GroupState, MboxError> {
        self.groups.get(id.0).ok_or_else(|| {
            MboxError::new(
                ErrorKind::InvalidState,
                format!("Group handle {} is stale.", id.0),
            )
        })
    }

    pub(crate) fn group_mut(&mut self, id: GroupId) -> Result<&mut GroupState, MboxError> {
        self.groups.get_mut(id.0).ok_or_else(|| {
            MboxError::new(
                ErrorKind::InvalidState,
                format!("Group handle {} is stale.", id.0),
            )
        })
    }

    pub(crate) fn group_for_object(&mut self, object: ObjectId) -> Result<GroupId, MboxError> {
        if let Some(id) = self.group_by_object.get(&object) {
            return Ok(*id);
        }
        let source = self.graph.get(object)?;
        if source.r#type != ObjectType::Group {
            return Err(MboxError::new(
                ErrorKind::InvalidArgument,
                format!("Object \"{}\" is a {}, not a group.", source.name, source.r#type),
            ));
        }
        let id = GroupId(self.groups.len());
        self.groups.push(GroupState {
            object,
            name: source.name.clone(),
            members: BTreeSet::new(),
        });
        self.group_by_object.insert(object, id);
        Ok(id)
    }

    pub(crate) fn acting_character(&self) -> Option<CharacterId> {
        self.stack.last().and_then(|frame| frame.character)
    }

    pub(crate) fn require_slotted(&self, id: CharacterId) -> Result<usize, MboxError> {
        let character = self.character(id)?;
        character.slot.ok_or_else(|| {
            MboxError::new(
                ErrorKind::CharacterNotAssembled,
                format!("Character \"{}\" has not been added to the party.", character.name),
            )
        })
    }

    pub(crate) fn members_by_slot(&self, group: GroupId) -> Result<Vec<CharacterId>, MboxError> {
        let members = &self.group(group)?.members;
        Ok(self
            .slots
            .values()
            .copied()
            .filter(|id| members.contains(id))
            .collect())
    }

    pub(crate) fn render_stack(&self) -> String {
        self.stack
            .iter()
            .map(|frame| {
                let path = self.graph.path(frame.object);
                match frame.character.and_then(|id| self.characters.get(id.0)) {
                    Some(character) => format!("{} as {}", path, character.name),
                    None => path,
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub(crate) fn count_action(&mut self) -> Result<(), MboxError> {
        self.actions_this_pass += 1;
        if self.actions_this_pass > self.limits.max_actions {
            return Err(MboxError::new(
                ErrorKind::TooManyActions,
                format!(
                    "More than {} actions in one pass: {}",
                    self.limits.max_actions,
                    self.render_stack()
                ),
            ));
        }
        Ok(())
    }
}

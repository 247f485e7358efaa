use mb_core::{ErrorKind, KeyCode, MboxError, Modifiers, ObjectId, ObjectType, SendAction};
use rhai::{Engine, FnPtr};
use tracing::warn;

use super::binder::{fire_events, run_object_script};
use super::events::{Event, EventKind};
use super::state::{CharacterId, EventId, GroupId, SharedState};
use crate::SendRequest;

pub(crate) enum Action {
    AddCharacter {
        character: CharacterId,
        slot: usize,
    },
    JoinGroup {
        group: GroupId,
        character: CharacterId,
    },
    LeaveGroup {
        group: GroupId,
        character: CharacterId,
    },
    SendKey {
        targets: Vec<CharacterId>,
        action: SendAction,
        key: KeyCode,
        modifiers: Modifiers,
    },
    SendMacro {
        targets: Vec<CharacterId>,
        object: ObjectId,
    },
    SendVarMacro {
        targets: Vec<CharacterId>,
        object: ObjectId,
        target: CharacterId,
    },
    RunScript {
        object: ObjectId,
    },
    PostEvent {
        object: ObjectId,
    },
    Subscribe {
        kind: EventKind,
        key: KeyCode,
        modifiers: Modifiers,
        object: Option<ObjectId>,
        callback: FnPtr,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::AddCharacter { .. } => "AddCharacter",
            Action::JoinGroup { .. } => "JoinGroup",
            Action::LeaveGroup { .. } => "LeaveGroup",
            Action::SendKey { .. } => "SendKey",
            Action::SendMacro { .. } => "SendMacro",
            Action::SendVarMacro { .. } => "SendVarMacro",
            Action::RunScript { .. } => "RunScript",
            Action::PostEvent { .. } => "PostEvent",
            Action::Subscribe { .. } => "Subscribe",
        }
    }
}

pub(crate) fn execute(engine: &Engine, state: &SharedState, action: Action) -> Result<(), MboxError> {
    {
        let mut shared = state.borrow_mut();
        shared.count_action()?;
        shared.trace(&format!("action {}", action.name()));
    }

    match action {
        Action::AddCharacter { character, slot } => add_character(engine, state, character, slot),
        Action::JoinGroup { group, character } => join_group(engine, state, group, character),
        Action::LeaveGroup { group, character } => {
            let mut shared = state.borrow_mut();
            shared.group_mut(group)?.members.remove(&character);
            shared.character_mut(character)?.groups.remove(&group);
            Ok(())
        }
        Action::SendKey {
            targets,
            action,
            key,
            modifiers,
        } => {
            let mut shared = state.borrow_mut();
            for target in targets {
                let object = shared.character(target)?.object;
                shared
                    .sends
                    .push(SendRequest::new(object, action, key, modifiers));
            }
            Ok(())
        }
        Action::SendMacro { targets, object } => {
            let mut shared = state.borrow_mut();
            let macro_name = shared.graph.get(object)?.name.clone();
            for target in targets {
                let character = shared.character(target)?;
                let keybind = character.macros.get(&object).copied().ok_or_else(|| {
                    MboxError::new(
                        ErrorKind::InvalidArgument,
                        format!(
                            "Macro \"{}\" has no keybind for character \"{}\".",
                            macro_name, character.name
                        ),
                    )
                })?;
                let request = SendRequest::new(
                    character.object,
                    SendAction::PressThenRelease,
                    keybind.key,
                    keybind.modifiers,
                );
                shared.sends.push(request);
            }
            Ok(())
        }
        Action::SendVarMacro {
            targets,
            object,
            target,
        } => {
            let mut shared = state.borrow_mut();
            let macro_name = shared.graph.get(object)?.name.clone();
            let target_object = shared.character(target)?.object;
            for sender in targets {
                let character = shared.character(sender)?;
                let keybind = character
                    .var_macros
                    .get(&(object, target_object))
                    .copied()
                    .ok_or_else(|| {
                        MboxError::new(
                            ErrorKind::InvalidArgument,
                            format!(
                                "Var-macro \"{}\" has no keybind for character \"{}\".",
                                macro_name, character.name
                            ),
                        )
                    })?;
                let request = SendRequest::new(
                    character.object,
                    SendAction::PressThenRelease,
                    keybind.key,
                    keybind.modifiers,
                );
                shared.sends.push(request);
            }
            Ok(())
        }
        Action::RunScript { object } => {
            let acting = state.borrow().acting_character();
            run_object_script(engine, state, acting, object)
        }
        Action::PostEvent { object } => {
            let failures = fire_events(engine, state, |event| event.matches_user(object));
            let mut first = None;
            let mut shared = state.borrow_mut();
            for (owner, error) in failures {
                warn!(target: "mbox", "event callback failed: {}", error);
                if let Ok(character) = shared.character_mut(owner) {
                    character.errors.push(error.clone());
                }
                first.get_or_insert(error);
            }
            first.map_or(Ok(()), Err)
        }
        Action::Subscribe {
            kind,
            key,
            modifiers,
            object,
            callback,
        } => {
            let mut shared = state.borrow_mut();
            let Some(frame) = shared.stack.last().cloned() else {
                return Err(MboxError::new(
                    ErrorKind::InvalidState,
                    "Events can only be registered from a running script.",
                ));
            };
            let Some(owner) = frame.character else {
                return Err(MboxError::new(
                    ErrorKind::InvalidState,
                    "Events need an acting character; the party script has none.",
                ));
            };
            let id = EventId(shared.events.len());
            shared.events.push(Event {
                id,
                owner,
                kind,
                key,
                modifiers,
                object,
                source: frame.object,
                callback,
                ast: frame.ast,
            });
            shared.character_mut(owner)?.events.insert(id);
            Ok(())
        }
    }
}

fn add_character(
    engine: &Engine,
    state: &SharedState,
    character: CharacterId,
    slot: usize,
) -> Result<(), MboxError> {
    let object = {
        let mut shared = state.borrow_mut();
        let in_party_script = shared.acting_character().is_none()
            && shared.stack.last().map(|frame| frame.object) == shared.party;
        if !in_party_script {
            return Err(MboxError::new(
                ErrorKind::InvalidState,
                "mbox::AddCharacter can only be called from the party script.",
            ));
        }
        if let Some(existing) = shared.slots.get(&slot) {
            let name = shared.character(*existing)?.name.clone();
            return Err(MboxError::new(
                ErrorKind::InvalidArgument,
                format!("Slot {} is already taken by \"{}\".", slot, name),
            ));
        }
        let entry = shared.character_mut(character)?;
        if let Some(current) = entry.slot {
            return Err(MboxError::new(
                ErrorKind::InvalidArgument,
                format!("Character \"{}\" already holds slot {}.", entry.name, current),
            ));
        }
        entry.slot = Some(slot);
        let object = entry.object;
        shared.slots.insert(slot, character);
        object
    };

    for object in character_script_chain(state, object) {
        run_object_script(engine, state, Some(character), object)?;
    }
    Ok(())
}

pub(crate) fn character_script_chain(state: &SharedState, character: ObjectId) -> Vec<ObjectId> {
    let shared = state.borrow();
    let mut chain = Vec::with_capacity(3);
    for r#type in [ObjectType::Profile, ObjectType::Account] {
        if let Some(ancestor) = shared.graph.nearest_ancestor(character, r#type) {
            chain.push(ancestor.index);
        }
    }
    chain.push(character);
    chain
}

fn join_group(
    engine: &Engine,
    state: &SharedState,
    group: GroupId,
    character: CharacterId,
) -> Result<(), MboxError> {
    let first_join = {
        let mut shared = state.borrow_mut();
        shared.require_slotted(character)?;
        shared.group_mut(group)?.members.insert(character);
        let member = shared.character_mut(character)?;
        member.groups.insert(group);
        member.bound_groups.insert(group)
    };
    if first_join {
        let object = state.borrow().group(group)?.object;
        run_object_script(engine, state, Some(character), object)?;
    }
    Ok(())
}

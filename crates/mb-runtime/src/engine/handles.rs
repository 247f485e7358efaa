use std::rc::Rc;

use mb_core::{MboxError, ObjectId, ObjectType};
use rhai::{Array, Dynamic, Engine, Map, INT};

use super::state::{CharacterId, GroupId, SharedState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CharacterRef(pub(crate) CharacterId);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GroupRef(pub(crate) GroupId);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObjectHandle {
    pub(crate) id: ObjectId,
    pub(crate) r#type: ObjectType,
    pub(crate) name: String,
}

pub(crate) fn register_handle_types(engine: &mut Engine, state: &SharedState) {
    engine
        .register_type_with_name::<CharacterRef>("Character")
        .register_type_with_name::<GroupRef>("Group")
        .register_type_with_name::<ObjectHandle>("Object")
        .register_type_with_name::<MboxError>("Error");

    let shared = Rc::clone(state);
    engine.register_get("Index", move |character: &mut CharacterRef| -> INT {
        shared
            .borrow()
            .characters
            .get(character.0 .0)
            .and_then(|state| state.slot)
            .map_or(0, |slot| slot as INT)
    });
    let shared = Rc::clone(state);
    engine.register_get("Name", move |character: &mut CharacterRef| -> String {
        character_name(&shared, character.0)
    });
    let shared = Rc::clone(state);
    engine.register_get("Groups", move |character: &mut CharacterRef| -> Array {
        shared
            .borrow()
            .characters
            .get(character.0 .0)
            .map(|state| {
                state
                    .groups
                    .iter()
                    .map(|group| Dynamic::from(GroupRef(*group)))
                    .collect()
            })
            .unwrap_or_default()
    });
    let shared = Rc::clone(state);
    engine.register_fn("to_string", move |character: &mut CharacterRef| -> String {
        format!("Character({})", character_name(&shared, character.0))
    });
    let shared = Rc::clone(state);
    engine.register_fn("to_debug", move |character: &mut CharacterRef| -> String {
        format!("Character({})", character_name(&shared, character.0))
    });
    engine.register_fn("==", |a: &mut CharacterRef, b: CharacterRef| *a == b);
    engine.register_fn("!=", |a: &mut CharacterRef, b: CharacterRef| *a != b);

    let shared = Rc::clone(state);
    engine.register_get("Index", move |group: &mut GroupRef| -> INT {
        shared
            .borrow()
            .groups
            .get(group.0 .0)
            .map_or(0, |state| state.object.0 as INT)
    });
    let shared = Rc::clone(state);
    engine.register_get("Name", move |group: &mut GroupRef| -> String {
        group_name(&shared, group.0)
    });
    let shared = Rc::clone(state);
    engine.register_get("Characters", move |group: &mut GroupRef| -> Map {
        let state = shared.borrow();
        let members = state.members_by_slot(group.0).unwrap_or_default();
        members
            .into_iter()
            .filter_map(|id| {
                let slot = state.characters.get(id.0)?.slot?;
                Some((slot.to_string().into(), Dynamic::from(CharacterRef(id))))
            })
            .collect()
    });
    let shared = Rc::clone(state);
    engine.register_fn("to_string", move |group: &mut GroupRef| -> String {
        format!("Group({})", group_name(&shared, group.0))
    });
    let shared = Rc::clone(state);
    engine.register_fn("to_debug", move |group: &mut GroupRef| -> String {
        format!("Group({})", group_name(&shared, group.0))
    });
    engine.register_fn("==", |a: &mut GroupRef, b: GroupRef| *a == b);
    engine.register_fn("!=", |a: &mut GroupRef, b: GroupRef| *a != b);

    engine.register_get("Index", |object: &mut ObjectHandle| -> INT {
        object.id.0 as INT
    });
    engine.register_get("Name", |object: &mut ObjectHandle| -> String {
        object.name.clone()
    });
    engine.register_get("Type", |object: &mut ObjectHandle| -> String {
        object.r#type.as_str().to_string()
    });
    engine.register_fn("to_string", |object: &mut ObjectHandle| -> String {
        format!("Object({} {})", object.r#type, object.name)
    });
    engine.register_fn("to_debug", |object: &mut ObjectHandle| -> String {
        format!("Object({} {})", object.r#type, object.name)
    });
    engine.register_fn("==", |a: &mut ObjectHandle, b: ObjectHandle| a.id == b.id);
    engine.register_fn("!=", |a: &mut ObjectHandle, b: ObjectHandle| a.id != b.id);

    engine.register_get("kind", |error: &mut MboxError| -> String {
        error.kind.as_str().to_string()
    });
    engine.register_get("message", |error: &mut MboxError| -> String {
        error.message.clone()
    });
    engine.register_fn("to_string", |error: &mut MboxError| -> String {
        error.to_string()
    });
    engine.register_fn("to_debug", |error: &mut MboxError| -> String {
        error.to_string()
    });
}

fn character_name(state: &SharedState, id: CharacterId) -> String {
    state
        .borrow()
        .characters
        .get(id.0)
        .map(|character| character.name.clone())
        .unwrap_or_default()
}

fn group_name(state: &SharedState, id: GroupId) -> String {
    state
        .borrow()
        .groups
        .get(id.0)
        .map(|group| group.name.clone())
        .unwrap_or_default()
}

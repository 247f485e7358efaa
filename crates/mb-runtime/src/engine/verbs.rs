use std::ops::RangeInclusive;
use std::rc::Rc;

use mb_core::{ErrorKind, MboxError, Modifiers, ObjectType, SendAction};
use rhai::{Array, Dynamic, Engine, EvalAltResult, Module, NativeCallContext, INT};

use super::events::EventKind;
use super::executor::{execute, Action};
use super::handles::{CharacterRef, GroupRef, ObjectHandle};
use super::state::{CharacterId, GroupId, SharedState};
use crate::helpers::rhai_bridge::{
    describe, fn_ptr_arg, int_arg, invalid_argument, key_arg, modifiers_arg, throw,
};

type Verb = fn(&Engine, &SharedState, &[Dynamic]) -> Result<Dynamic, MboxError>;

const VERBS: &[(&str, Verb)] = &[
    ("AddCharacter", add_character),
    ("JoinGroup", join_group),
    ("LeaveGroup", leave_group),
    ("SendKeyDown", send_key_down),
    ("SendKeyUp", send_key_up),
    ("SendKeyPress", send_key_press),
    ("SendMacro", send_macro),
    ("SendVarMacro", send_var_macro),
    ("RunScript", run_script),
    ("PostEvent", post_event),
    ("OnKeyDown", on_key_down),
    ("OnKeyUp", on_key_up),
    ("OnEvent", on_event),
    ("Others", others),
];

// Each verb is registered for zero to four arguments of any type so that a
// malformed call reaches the verb and gets a message naming it.
pub(crate) fn build_module(state: &SharedState) -> Module {
    let mut module = Module::new();
    module.set_var("SHIFT", Modifiers::SHIFT.bits() as INT);
    module.set_var("CONTROL", Modifiers::CONTROL.bits() as INT);
    module.set_var("ALT", Modifiers::ALT.bits() as INT);
    for (name, verb) in VERBS {
        register_verb(&mut module, state, *name, *verb);
    }
    module
}

fn register_verb(module: &mut Module, state: &SharedState, name: &'static str, verb: Verb) {
    let shared = Rc::clone(state);
    module.set_native_fn(name, move |context: NativeCallContext| {
        invoke(&context, &shared, name, verb, &[])
    });
    let shared = Rc::clone(state);
    module.set_native_fn(name, move |context: NativeCallContext, a: Dynamic| {
        invoke(&context, &shared, name, verb, &[a])
    });
    let shared = Rc::clone(state);
    module.set_native_fn(
        name,
        move |context: NativeCallContext, a: Dynamic, b: Dynamic| {
            invoke(&context, &shared, name, verb, &[a, b])
        },
    );
    let shared = Rc::clone(state);
    module.set_native_fn(
        name,
        move |context: NativeCallContext, a: Dynamic, b: Dynamic, c: Dynamic| {
            invoke(&context, &shared, name, verb, &[a, b, c])
        },
    );
    let shared = Rc::clone(state);
    module.set_native_fn(
        name,
        move |context: NativeCallContext, a: Dynamic, b: Dynamic, c: Dynamic, d: Dynamic| {
            invoke(&context, &shared, name, verb, &[a, b, c, d])
        },
    );
}

fn invoke(
    context: &NativeCallContext,
    state: &SharedState,
    name: &str,
    verb: Verb,
    args: &[Dynamic],
) -> Result<Dynamic, Box<EvalAltResult>> {
    let args: Vec<Dynamic> = args.iter().map(|arg| arg.clone().flatten()).collect();
    let rendered: Vec<String> = args.iter().map(describe).collect();
    state
        .borrow()
        .trace(&format!("mbox::{}({})", name, rendered.join(", ")));
    verb(context.engine(), state, &args).map_err(throw)
}

fn expect_args(
    verb: &str,
    args: &[Dynamic],
    count: RangeInclusive<usize>,
    usage: &str,
) -> Result<(), MboxError> {
    if count.contains(&args.len()) {
        return Ok(());
    }
    Err(invalid_argument(
        verb,
        format!("expects ({}), got {} argument(s).", usage, args.len()),
    ))
}

fn acting(state: &SharedState, verb: &str) -> Result<CharacterId, MboxError> {
    state.borrow().acting_character().ok_or_else(|| {
        MboxError::new(
            ErrorKind::InvalidState,
            format!("mbox::{} needs an acting character; the party script has none.", verb),
        )
    })
}

fn not_in_party(value: &Dynamic) -> Option<MboxError> {
    let handle = value.clone().try_cast::<ObjectHandle>()?;
    (handle.r#type == ObjectType::Character).then(|| {
        MboxError::new(
            ErrorKind::CharacterNotAssembled,
            format!("Character \"{}\" is not part of the party.", handle.name),
        )
    })
}

fn character_arg(verb: &str, value: &Dynamic, what: &str) -> Result<CharacterId, MboxError> {
    if let Some(CharacterRef(id)) = value.clone().try_cast::<CharacterRef>() {
        return Ok(id);
    }
    Err(not_in_party(value).unwrap_or_else(|| {
        invalid_argument(
            verb,
            format!("expects {} as Character, got {}.", what, describe(value)),
        )
    }))
}

fn group_arg(verb: &str, value: &Dynamic) -> Result<GroupId, MboxError> {
    value
        .clone()
        .try_cast::<GroupRef>()
        .map(|group| group.0)
        .ok_or_else(|| invalid_argument(verb, format!("expects a Group, got {}.", describe(value))))
}

fn object_arg(
    verb: &str,
    value: &Dynamic,
    allowed: &[ObjectType],
) -> Result<ObjectHandle, MboxError> {
    match value.clone().try_cast::<ObjectHandle>() {
        Some(handle) if allowed.contains(&handle.r#type) => Ok(handle),
        found => {
            let expected: Vec<&str> = allowed.iter().map(|r#type| r#type.as_str()).collect();
            let got = found.map_or_else(
                || describe(value),
                |handle| format!("{} \"{}\"", handle.r#type, handle.name),
            );
            Err(invalid_argument(
                verb,
                format!("expects a {} object, got {}.", expected.join(" or "), got),
            ))
        }
    }
}

fn targets_arg(state: &SharedState, verb: &str, value: &Dynamic) -> Result<Vec<CharacterId>, MboxError> {
    let items: Array = if value.is_array() {
        value
            .clone()
            .into_array()
            .map_err(|found| invalid_argument(verb, format!("expects targets, got {}.", found)))?
    } else {
        vec![value.clone()]
    };

    let shared = state.borrow();
    let mut targets = Vec::new();
    for item in items {
        let item = item.flatten();
        let resolved = if let Some(GroupRef(group)) = item.clone().try_cast::<GroupRef>() {
            shared.members_by_slot(group)?
        } else {
            vec![character_arg(verb, &item, "target")?]
        };
        for id in resolved {
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
    }
    for id in &targets {
        shared.require_slotted(*id)?;
    }
    Ok(targets)
}

fn add_character(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    const VERB: &str = "AddCharacter";
    expect_args(VERB, args, 2..=2, "character, slot")?;
    let character = character_arg(VERB, &args[0], "character")?;
    let slot = int_arg(VERB, &args[1], "slot")?;
    let slot = usize::try_from(slot)
        .ok()
        .filter(|slot| *slot >= 1)
        .ok_or_else(|| invalid_argument(VERB, format!("slot {} must be 1 or greater.", slot)))?;
    execute(engine, state, Action::AddCharacter { character, slot })?;
    Ok(Dynamic::UNIT)
}

fn membership(
    verb: &str,
    state: &SharedState,
    args: &[Dynamic],
) -> Result<(GroupId, CharacterId), MboxError> {
    expect_args(verb, args, 1..=2, "group[, character]")?;
    let group = group_arg(verb, &args[0])?;
    let character = match args.get(1) {
        Some(value) => character_arg(verb, value, "character")?,
        None => acting(state, verb)?,
    };
    Ok((group, character))
}

fn join_group(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    let (group, character) = membership("JoinGroup", state, args)?;
    execute(engine, state, Action::JoinGroup { group, character })?;
    Ok(Dynamic::UNIT)
}

fn leave_group(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    let (group, character) = membership("LeaveGroup", state, args)?;
    execute(engine, state, Action::LeaveGroup { group, character })?;
    Ok(Dynamic::UNIT)
}

fn send_key(
    verb: &str,
    action: SendAction,
    engine: &Engine,
    state: &SharedState,
    args: &[Dynamic],
) -> Result<Dynamic, MboxError> {
    expect_args(verb, args, 2..=3, "target, key[, modifiers]")?;
    let targets = targets_arg(state, verb, &args[0])?;
    let key = key_arg(verb, &args[1])?;
    let modifiers = match args.get(2) {
        Some(value) => modifiers_arg(verb, value)?,
        None => Modifiers::empty(),
    };
    execute(
        engine,
        state,
        Action::SendKey {
            targets,
            action,
            key,
            modifiers,
        },
    )?;
    Ok(Dynamic::UNIT)
}

fn send_key_down(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    send_key("SendKeyDown", SendAction::Press, engine, state, args)
}

fn send_key_up(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    send_key("SendKeyUp", SendAction::Release, engine, state, args)
}

fn send_key_press(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    send_key("SendKeyPress", SendAction::PressThenRelease, engine, state, args)
}

fn send_macro(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    const VERB: &str = "SendMacro";
    expect_args(VERB, args, 2..=2, "target, macro")?;
    let targets = targets_arg(state, VERB, &args[0])?;
    let object = object_arg(VERB, &args[1], &[ObjectType::ActionMacro])?.id;
    execute(engine, state, Action::SendMacro { targets, object })?;
    Ok(Dynamic::UNIT)
}

fn send_var_macro(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    const VERB: &str = "SendVarMacro";
    expect_args(VERB, args, 3..=3, "target, var_macro, character")?;
    let targets = targets_arg(state, VERB, &args[0])?;
    let object = object_arg(VERB, &args[1], &[ObjectType::ActionVarMacro])?.id;
    let target = character_arg(VERB, &args[2], "character")?;
    execute(
        engine,
        state,
        Action::SendVarMacro {
            targets,
            object,
            target,
        },
    )?;
    Ok(Dynamic::UNIT)
}

fn run_script(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    const VERB: &str = "RunScript";
    expect_args(VERB, args, 1..=1, "script")?;
    let object = object_arg(VERB, &args[0], &[ObjectType::ActionScript])?.id;
    execute(engine, state, Action::RunScript { object })?;
    Ok(Dynamic::UNIT)
}

fn post_event(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    const VERB: &str = "PostEvent";
    expect_args(VERB, args, 1..=1, "event")?;
    let object = object_arg(VERB, &args[0], &[ObjectType::Event])?.id;
    execute(engine, state, Action::PostEvent { object })?;
    Ok(Dynamic::UNIT)
}

fn on_key(
    verb: &str,
    kind: EventKind,
    engine: &Engine,
    state: &SharedState,
    args: &[Dynamic],
) -> Result<Dynamic, MboxError> {
    expect_args(verb, args, 2..=3, "key[, modifiers], callback")?;
    let key = key_arg(verb, &args[0])?;
    let (modifiers, callback) = if args.len() == 3 {
        (modifiers_arg(verb, &args[1])?, &args[2])
    } else {
        (Modifiers::empty(), &args[1])
    };
    let callback = fn_ptr_arg(verb, callback)?;
    execute(
        engine,
        state,
        Action::Subscribe {
            kind,
            key,
            modifiers,
            object: None,
            callback,
        },
    )?;
    Ok(Dynamic::UNIT)
}

fn on_key_down(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    on_key("OnKeyDown", EventKind::KeyPress, engine, state, args)
}

fn on_key_up(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    on_key("OnKeyUp", EventKind::KeyRelease, engine, state, args)
}

fn on_event(engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    const VERB: &str = "OnEvent";
    expect_args(VERB, args, 2..=2, "event, callback")?;
    let handle = object_arg(VERB, &args[0], &[ObjectType::Event, ObjectType::ActionTimer])?;
    let callback = fn_ptr_arg(VERB, &args[1])?;
    let kind = if handle.r#type == ObjectType::ActionTimer {
        EventKind::Timer
    } else {
        EventKind::User
    };
    execute(
        engine,
        state,
        Action::Subscribe {
            kind,
            key: 0,
            modifiers: Modifiers::empty(),
            object: Some(handle.id),
            callback,
        },
    )?;
    Ok(Dynamic::UNIT)
}

fn others(_engine: &Engine, state: &SharedState, args: &[Dynamic]) -> Result<Dynamic, MboxError> {
    const VERB: &str = "Others";
    expect_args(VERB, args, 0..=1, "[character]")?;
    let excluded = match args.first() {
        Some(value) => Some(character_arg(VERB, value, "character")?),
        None => state.borrow().acting_character(),
    };
    let list: Array = state
        .borrow()
        .slots
        .values()
        .filter(|id| Some(**id) != excluded)
        .map(|id| Dynamic::from(CharacterRef(*id)))
        .collect();
    Ok(Dynamic::from(list))
}

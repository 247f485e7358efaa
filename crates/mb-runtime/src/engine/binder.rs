use std::rc::Rc;

use mb_core::{ErrorKind, MboxError, ObjectId, ObjectType};
use rhai::{Dynamic, Engine, Scope, AST};

use super::events::Event;
use super::handles::{CharacterRef, GroupRef, ObjectHandle};
use super::state::{CharacterId, Frame, RuntimeState, SharedState};
use crate::helpers::rhai_bridge::from_rhai_error;

pub(crate) fn compile_script(
    engine: &Engine,
    state: &SharedState,
    character: Option<CharacterId>,
    object: ObjectId,
) -> Result<Option<Rc<AST>>, MboxError> {
    let mut state = state.borrow_mut();
    let source = state.graph.get(object)?;
    let path = state.graph.path(object);
    if !source.r#type.is_script_bearing() {
        return Err(MboxError::new(
            ErrorKind::InvalidArgument,
            format!("Object \"{}\" is a {} and has no script.", path, source.r#type),
        ));
    }
    if !source.has_script() {
        return Ok(None);
    }

    let cached = match character {
        Some(id) => state.character(id)?.scripts.get(&object).cloned(),
        None => state.party_scripts.get(&object).cloned(),
    };
    if cached.is_some() {
        return Ok(cached);
    }

    let ast = engine.compile(&source.value).map_err(|error| {
        MboxError::new(ErrorKind::ScriptCompile, format!("{}: {}", path, error)).with_path(&path)
    })?;
    let ast = Rc::new(ast);
    state.trace(&format!("compile {}", path));
    match character {
        Some(id) => {
            state.character_mut(id)?.scripts.insert(object, Rc::clone(&ast));
        }
        None => {
            state.party_scripts.insert(object, Rc::clone(&ast));
        }
    }
    Ok(Some(ast))
}

pub(crate) fn build_scope(
    state: &mut RuntimeState,
    character: Option<CharacterId>,
    object: ObjectId,
) -> Result<Scope<'static>, MboxError> {
    let mut scope = Scope::new();
    let me = character.map_or(Dynamic::UNIT, |id| Dynamic::from(CharacterRef(id)));
    scope.push_constant_dynamic("Me", me);

    let refs = state.graph.get(object)?.refs.clone();
    for (name, target) in refs {
        let value = bind_reference(state, target)?;
        scope.push_constant_dynamic(name, value);
    }
    Ok(scope)
}

fn bind_reference(state: &mut RuntimeState, target: ObjectId) -> Result<Dynamic, MboxError> {
    let referenced = state.graph.get(target)?;
    match referenced.r#type {
        ObjectType::Character => {
            if let Some(id) = state.character_by_object.get(&target) {
                return Ok(Dynamic::from(CharacterRef(*id)));
            }
        }
        ObjectType::Group => {
            let id = state.group_for_object(target)?;
            return Ok(Dynamic::from(GroupRef(id)));
        }
        _ => {}
    }
    Ok(Dynamic::from(ObjectHandle {
        id: referenced.index,
        r#type: referenced.r#type,
        name: referenced.name.clone(),
    }))
}

impl RuntimeState {
    pub(crate) fn push_frame(&mut self, frame: Frame) -> Result<(), MboxError> {
        if self.stack.len() >= self.limits.max_stack_depth {
            let mut chain = self.render_stack();
            chain.push_str(" -> ");
            chain.push_str(&self.graph.path(frame.object));
            return Err(MboxError::new(
                ErrorKind::StackRecursion,
                format!(
                    "Execution stack exceeded {} frames: {}",
                    self.limits.max_stack_depth, chain
                ),
            ));
        }
        self.stack.push(frame);
        Ok(())
    }
}

fn attribute(error: MboxError, state: &SharedState, object: ObjectId) -> MboxError {
    if error.path.is_some() {
        return error;
    }
    let path = state.borrow().graph.path(object);
    error.with_path(path)
}

pub(crate) fn run_object_script(
    engine: &Engine,
    state: &SharedState,
    character: Option<CharacterId>,
    object: ObjectId,
) -> Result<(), MboxError> {
    let Some(ast) = compile_script(engine, state, character, object)? else {
        return Ok(());
    };

    let mut scope = {
        let mut shared = state.borrow_mut();
        let scope = build_scope(&mut shared, character, object)?;
        let line = match character.and_then(|id| shared.characters.get(id.0)) {
            Some(acting) => format!("execute {} as {}", shared.graph.path(object), acting.name),
            None => format!("execute {}", shared.graph.path(object)),
        };
        shared.trace(&line);
        shared.push_frame(Frame {
            character,
            object,
            ast: Rc::clone(&ast),
        })?;
        scope
    };

    let result = engine.run_ast_with_scope(&mut scope, &ast);
    state.borrow_mut().stack.pop();
    result.map_err(|error| attribute(from_rhai_error(&error), state, object))
}

pub(crate) fn call_event(engine: &Engine, state: &SharedState, event: &Event) -> Result<(), MboxError> {
    {
        let mut shared = state.borrow_mut();
        shared.trace(&format!("fire {}", event.describe()));
        shared.push_frame(Frame {
            character: Some(event.owner),
            object: event.source,
            ast: Rc::clone(&event.ast),
        })?;
    }
    let result = event.callback.call::<Dynamic>(engine, &event.ast, ());
    state.borrow_mut().stack.pop();
    result
        .map(|_| ())
        .map_err(|error| attribute(from_rhai_error(&error), state, event.source))
}

// Events registered while firing wait for the next pass. Every match fires
// even when an earlier one failed; failures come back with their owner.
pub(crate) fn fire_events(
    engine: &Engine,
    state: &SharedState,
    filter: impl Fn(&Event) -> bool,
) -> Vec<(CharacterId, MboxError)> {
    let matched: Vec<Event> = state
        .borrow()
        .events
        .iter()
        .filter(|event| filter(event))
        .cloned()
        .collect();

    let mut failures = Vec::new();
    for event in &matched {
        if let Err(error) = call_event(engine, state, event) {
            failures.push((event.owner, error));
        }
    }
    failures
}

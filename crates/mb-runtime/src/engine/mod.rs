mod binder;
mod events;
mod executor;
mod handles;
mod lifecycle;
mod state;
mod verbs;


use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use mb_core::{Keybind, ObjectId};
use mb_graph::{MacroAllocation, ObjectGraph};
use rhai::Engine;
use serde::{Deserialize, Serialize};

pub use events::{ActionError, CycleReport, EventKind, Input};
pub use state::{CharacterId, GroupId};

use handles::register_handle_types;
use state::{RuntimeState, SharedState};

use crate::TraceSink;

pub const DEFAULT_MAX_STACK_DEPTH: usize = 32;
pub const DEFAULT_MAX_OPERATIONS: u64 = 1_000_000;
pub const DEFAULT_MAX_CALL_LEVELS: usize = 64;
pub const DEFAULT_MAX_ACTIONS: usize = 4_096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeLimits {
    pub max_stack_depth: usize,
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_actions: usize,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            max_operations: DEFAULT_MAX_OPERATIONS,
            max_call_levels: DEFAULT_MAX_CALL_LEVELS,
            max_actions: DEFAULT_MAX_ACTIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Uninitialized,
    GraphLoaded,
    CharactersBound,
    Assembled,
    Running,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlottedCharacter {
    pub slot: usize,
    pub object: ObjectId,
    pub name: String,
}

#[derive(Clone)]
pub struct RuntimeOptions {
    pub graph: ObjectGraph,
    pub macro_pool: Vec<Keybind>,
    pub party: ObjectId,
    pub limits: RuntimeLimits,
    pub trace: Option<Arc<dyn TraceSink>>,
}

impl RuntimeOptions {
    pub fn new(graph: ObjectGraph, macro_pool: Vec<Keybind>, party: ObjectId) -> Self {
        Self {
            graph,
            macro_pool,
            party,
            limits: RuntimeLimits::default(),
            trace: None,
        }
    }

    pub fn with_limits(mut self, limits: RuntimeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = Some(trace);
        self
    }
}

pub struct Runtime {
    engine: Engine,
    state: SharedState,
    phase: Phase,
    allocation: Option<MacroAllocation>,
}

impl Runtime {
    pub fn new(limits: RuntimeLimits, trace: Option<Arc<dyn TraceSink>>) -> Self {
        let state: SharedState = Rc::new(RefCell::new(RuntimeState {
            limits,
            trace,
            ..RuntimeState::default()
        }));

        let mut engine = Engine::new();
        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        register_handle_types(&mut engine, &state);
        engine.register_static_module("mbox", verbs::build_module(&state).into());

        let shared = Rc::clone(&state);
        engine.on_print(move |text| shared.borrow().trace(&format!("print: {}", text)));
        let shared = Rc::clone(&state);
        engine.on_debug(move |text, _source, _position| {
            shared.borrow().trace(&format!("debug: {}", text))
        });

        Self {
            engine,
            state,
            phase: Phase::Uninitialized,
            allocation: None,
        }
    }

    pub fn assemble_from(options: RuntimeOptions) -> Result<Self, mb_core::MboxError> {
        let mut runtime = Self::new(options.limits, options.trace);
        runtime.load_graph(options.graph, options.macro_pool, options.party)?;
        runtime.bind_characters()?;
        runtime.assemble()?;
        Ok(runtime)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn allocation(&self) -> Option<&MacroAllocation> {
        self.allocation.as_ref()
    }
}

mod batch;
mod engine;
mod helpers;
mod trace;
mod worker;

pub use batch::{build_batches, OutputBatch, SendRequest};
pub use engine::{
    ActionError, CharacterId, CycleReport, EventKind, GroupId, Input, Phase, Runtime,
    RuntimeLimits, RuntimeOptions, SlottedCharacter, DEFAULT_MAX_ACTIONS, DEFAULT_MAX_CALL_LEVELS,
    DEFAULT_MAX_OPERATIONS, DEFAULT_MAX_STACK_DEPTH,
};
pub use trace::{BufferTrace, TraceSink};
pub use worker::{AssemblyReport, OutputSink, RuntimeHandle};

use std::sync::Arc;

use mb_core::{ErrorKind, Keybind, MboxError, Object, ObjectId, ObjectType};
use mb_graph::{validate_graph, ObjectGraph};
use mb_runtime::{OutputSink, Runtime, RuntimeHandle, RuntimeLimits, RuntimeOptions, TraceSink};
use serde::{Deserialize, Serialize};

pub use mb_graph::MacroBinding;
pub use mb_runtime::{AssemblyReport, CycleReport, Input, OutputBatch};

/// The snapshot handed over by the editor: objects, the physical macro pool
/// and the party to assemble.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub objects: Vec<Object>,
    pub macro_pool: Vec<Keybind>,
    pub party: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<RuntimeLimits>,
}

impl Session {
    pub fn graph(&self) -> ObjectGraph {
        ObjectGraph::new(self.objects.iter().cloned())
    }

    pub fn options(&self) -> RuntimeOptions {
        RuntimeOptions::new(self.graph(), self.macro_pool.clone(), self.party)
            .with_limits(self.limits.unwrap_or_default())
    }
}

/// Every structural problem in the session, graph errors first.
pub fn validate_session(session: &Session) -> Vec<MboxError> {
    let graph = session.graph();
    let mut errors = validate_graph(&graph);
    match graph.find(session.party) {
        None => errors.push(MboxError::new(
            ErrorKind::InvalidParty,
            format!("Party {} does not exist.", session.party),
        )),
        Some(party) if party.r#type != ObjectType::Party => errors.push(
            MboxError::new(
                ErrorKind::InvalidParty,
                format!("Object \"{}\" is a {}, not a party.", party.name, party.r#type),
            )
            .with_path(graph.path(session.party)),
        ),
        Some(_) => {}
    }
    errors
}

/// Assembles the session on the calling thread.
pub fn assemble_session(
    session: &Session,
    trace: Option<Arc<dyn TraceSink>>,
) -> Result<Runtime, MboxError> {
    let mut options = session.options();
    options.trace = trace;
    Runtime::assemble_from(options)
}

/// Assembles the session on a worker thread and keeps it running.
pub fn spawn_session(
    session: &Session,
    sink: Arc<dyn OutputSink>,
) -> Result<RuntimeHandle, MboxError> {
    RuntimeHandle::spawn(session.options(), sink)
}

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use mb_core::{ErrorKind, KeyMessage, MboxError, ObjectId};
use mb_graph::MacroBinding;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Input, OutputBatch, Runtime, RuntimeOptions, SlottedCharacter};

pub trait OutputSink: Send + Sync {
    fn on_output_batch(&self, character: ObjectId, messages: &[KeyMessage]);
}

impl OutputSink for Sender<OutputBatch> {
    fn on_output_batch(&self, character: ObjectId, messages: &[KeyMessage]) {
        let batch = OutputBatch {
            character,
            messages: messages.to_vec(),
        };
        if self.send(batch).is_err() {
            debug!(target: "mbox", "output receiver dropped");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub characters: Vec<SlottedCharacter>,
    pub bindings: Vec<MacroBinding>,
    pub demand: usize,
    pub pool_size: usize,
}

impl AssemblyReport {
    pub fn from_runtime(runtime: &Runtime) -> Result<Self, MboxError> {
        let (demand, pool_size) = runtime
            .allocation()
            .map_or((0, 0), |allocation| (allocation.demand, allocation.pool_size));
        Ok(Self {
            characters: runtime.slotted_characters(),
            bindings: runtime.export()?,
            demand,
            pool_size,
        })
    }
}

#[derive(Default)]
struct QueueState {
    inputs: VecDeque<(ObjectId, Input)>,
    quit: bool,
}

#[derive(Default)]
struct InputQueue {
    state: Mutex<QueueState>,
    wake: Condvar,
}

impl InputQueue {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self) -> Option<Vec<(ObjectId, Input)>> {
        let mut state = self.lock();
        while state.inputs.is_empty() && !state.quit {
            state = self
                .wake
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.quit {
            return None;
        }
        Some(state.inputs.drain(..).collect())
    }

    fn stop(&self) {
        self.lock().quit = true;
        self.wake.notify_one();
    }

    fn is_stopped(&self) -> bool {
        self.lock().quit
    }
}

pub struct RuntimeHandle {
    queue: Arc<InputQueue>,
    thread: Option<JoinHandle<()>>,
    slotted: BTreeSet<ObjectId>,
    report: AssemblyReport,
}

impl RuntimeHandle {
    pub fn spawn(options: RuntimeOptions, sink: Arc<dyn OutputSink>) -> Result<Self, MboxError> {
        let queue = Arc::new(InputQueue::default());
        let (ready_tx, ready_rx) = bounded::<Result<AssemblyReport, MboxError>>(1);

        let worker_queue = Arc::clone(&queue);
        let thread = thread::Builder::new()
            .name("mbox-runtime".to_string())
            .spawn(move || run_worker(options, sink, worker_queue, ready_tx))
            .map_err(|error| {
                MboxError::new(
                    ErrorKind::EngineStopped,
                    format!("Failed to start runtime thread: {}", error),
                )
            })?;

        let assembled = ready_rx.recv().unwrap_or_else(|_| {
            Err(MboxError::new(
                ErrorKind::EngineStopped,
                "Runtime thread exited before assembly finished.",
            ))
        });
        match assembled {
            Ok(report) => Ok(Self {
                queue,
                thread: Some(thread),
                slotted: report.characters.iter().map(|entry| entry.object).collect(),
                report,
            }),
            Err(error) => {
                let _ = thread.join();
                Err(error)
            }
        }
    }

    pub fn report(&self) -> &AssemblyReport {
        &self.report
    }

    pub fn post(&self, character: ObjectId, input: Input) -> Result<(), MboxError> {
        if !self.slotted.contains(&character) {
            return Err(MboxError::new(
                ErrorKind::CharacterNotAssembled,
                format!("Character {} is not part of the assembled party.", character),
            ));
        }
        let mut state = self.queue.lock();
        if state.quit {
            return Err(MboxError::new(
                ErrorKind::EngineStopped,
                "The runtime has been cancelled.",
            ));
        }
        state.inputs.push_back((character, input));
        drop(state);
        self.queue.wake.notify_one();
        Ok(())
    }

    // Input still queued or already drained is dropped.
    pub fn cancel(&self) {
        self.queue.stop();
    }

    pub fn join(mut self) -> Result<(), MboxError> {
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<(), MboxError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| {
                MboxError::new(ErrorKind::EngineStopped, "Runtime thread panicked.")
            }),
            None => Ok(()),
        }
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel();
            if let Err(error) = self.join_thread() {
                warn!(target: "mbox", "{}", error);
            }
        }
    }
}

fn run_worker(
    options: RuntimeOptions,
    sink: Arc<dyn OutputSink>,
    queue: Arc<InputQueue>,
    ready: Sender<Result<AssemblyReport, MboxError>>,
) {
    let mut runtime = match Runtime::assemble_from(options)
        .and_then(|runtime| AssemblyReport::from_runtime(&runtime).map(|report| (runtime, report)))
    {
        Ok((runtime, report)) => {
            let _ = ready.send(Ok(report));
            runtime
        }
        Err(error) => {
            let _ = ready.send(Err(error));
            return;
        }
    };
    info!(target: "mbox", "runtime worker started");

    for batch in runtime.take_pending_output() {
        sink.on_output_batch(batch.character, &batch.messages);
    }

    while let Some(inputs) = queue.drain() {
        debug!(target: "mbox", count = inputs.len(), "drained input");
        process_drained(&mut runtime, sink.as_ref(), &queue, inputs);
    }

    runtime.cancel();
    info!(target: "mbox", "runtime worker stopped");
}

// A stop request also drops inputs already taken off the queue.
fn process_drained(
    runtime: &mut Runtime,
    sink: &dyn OutputSink,
    queue: &InputQueue,
    inputs: Vec<(ObjectId, Input)>,
) {
    for (character, input) in inputs {
        if queue.is_stopped() {
            debug!(target: "mbox", "stop requested, dropping drained input");
            return;
        }
        match runtime.process(character, input) {
            Ok(report) => {
                for batch in report.batches {
                    sink.on_output_batch(batch.character, &batch.messages);
                }
            }
            Err(error) => warn!(target: "mbox", character = %character, "input rejected: {}", error),
        }
    }
}

#[cfg(test)]
mod worker_tests {
    use mb_core::{Keybind, Modifiers, Object, ObjectType::*};
    use mb_graph::ObjectGraph;

    use super::*;

    const ALICE: ObjectId = ObjectId(10);

    // Stops the queue as soon as the first batch arrives.
    struct StopAfterFirst {
        queue: Arc<InputQueue>,
        seen: Mutex<Vec<OutputBatch>>,
    }

    impl OutputSink for StopAfterFirst {
        fn on_output_batch(&self, character: ObjectId, messages: &[KeyMessage]) {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(OutputBatch {
                    character,
                    messages: messages.to_vec(),
                });
            self.queue.stop();
        }
    }

    fn runtime() -> Runtime {
        let graph = ObjectGraph::new([
            Object::new(1, Profile, None, "Main"),
            Object::new(2, Account, Some(1), "Acct"),
            Object::new(10, Character, Some(2), "Alice").with_value(
                "mbox::OnKeyDown(0x41, || mbox::SendKeyPress(Me, 0x31));\n\
                 mbox::OnKeyDown(0x42, || mbox::SendKeyPress(Me, 0x32));",
            ),
            Object::new(30, Party, Some(1), "Solo")
                .with_value("mbox::AddCharacter(Alice, 1);")
                .with_ref("Alice", 10),
        ]);
        let pool = vec![Keybind::new(0x70, Modifiers::CONTROL)];
        Runtime::assemble_from(RuntimeOptions::new(graph, pool, ObjectId(30)))
            .expect("assembly should pass")
    }

    fn press(key: u16) -> Input {
        Input::KeyPress {
            key,
            modifiers: Modifiers::empty(),
        }
    }

    #[test]
    fn stop_drops_inputs_already_drained() {
        let mut runtime = runtime();
        let queue = Arc::new(InputQueue::default());
        let sink = StopAfterFirst {
            queue: Arc::clone(&queue),
            seen: Mutex::new(Vec::new()),
        };

        let inputs = vec![(ALICE, press(0x41)), (ALICE, press(0x42))];
        process_drained(&mut runtime, &sink, &queue, inputs);

        let seen = sink.seen.into_inner().unwrap_or_else(PoisonError::into_inner);
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0].messages,
            vec![KeyMessage::Down(0x31), KeyMessage::Up(0x31)]
        );
        assert!(queue.drain().is_none());
    }

    #[test]
    fn drained_inputs_run_in_order_until_stopped() {
        let mut runtime = runtime();
        let queue = InputQueue::default();
        let (sender, receiver) = crossbeam_channel::unbounded();

        let inputs = vec![(ALICE, press(0x42)), (ALICE, Input::Other), (ALICE, press(0x41))];
        process_drained(&mut runtime, &sender, &queue, inputs);

        let keys: Vec<Vec<KeyMessage>> = receiver.try_iter().map(|batch| batch.messages).collect();
        assert_eq!(
            keys,
            vec![
                vec![KeyMessage::Down(0x32), KeyMessage::Up(0x32)],
                vec![KeyMessage::Down(0x31), KeyMessage::Up(0x31)],
            ]
        );
    }
}

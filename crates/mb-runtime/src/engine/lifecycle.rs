use std::collections::BTreeSet;

use mb_core::{ErrorKind, Keybind, MboxError, ObjectId, ObjectType};
use mb_graph::{allocate_macros, dependencies_of, export_bindings, validate, MacroBinding, ObjectGraph};
use tracing::{info, warn};

use super::binder::{compile_script, fire_events, run_object_script};
use super::events::{ActionError, CycleReport, Input};
use super::executor::character_script_chain;
use super::state::{CharacterId, CharacterState};
use super::{Phase, Runtime, SlottedCharacter};
use crate::{build_batches, OutputBatch};

impl Runtime {
    fn expect_phase(&self, expected: Phase, step: &str) -> Result<(), MboxError> {
        if self.phase == expected {
            return Ok(());
        }
        Err(MboxError::new(
            ErrorKind::InvalidState,
            format!("{} needs phase {:?}, runtime is {:?}.", step, expected, self.phase),
        ))
    }

    fn abort_on_error<T>(&mut self, result: Result<T, MboxError>) -> Result<T, MboxError> {
        if let Err(error) = &result {
            warn!(target: "mbox", phase = ?self.phase, "assembly aborted: {}", error);
            self.teardown();
        }
        result
    }

    fn teardown(&mut self) {
        self.phase = Phase::Cancelled;
        let mut state = self.state.borrow_mut();
        state.events.clear();
        state.sends.clear();
        state.stack.clear();
        state.slots.clear();
        state.groups.clear();
        state.group_by_object.clear();
        state.characters.clear();
        state.character_by_object.clear();
        state.party_scripts.clear();
    }

    pub fn load_graph(
        &mut self,
        graph: ObjectGraph,
        pool: Vec<Keybind>,
        party: ObjectId,
    ) -> Result<(), MboxError> {
        self.expect_phase(Phase::Uninitialized, "load_graph")?;
        let checked = check_party(&graph, party);
        self.abort_on_error(checked)?;

        info!(target: "mbox", objects = graph.len(), party = %party, "graph loaded");
        let mut state = self.state.borrow_mut();
        state.graph = graph;
        state.pool = pool;
        state.party = Some(party);
        drop(state);
        self.phase = Phase::GraphLoaded;
        Ok(())
    }

    pub fn bind_characters(&mut self) -> Result<(), MboxError> {
        self.expect_phase(Phase::GraphLoaded, "bind_characters")?;
        let bound = self.bind_party_characters();
        let count = self.abort_on_error(bound)?;
        info!(target: "mbox", characters = count, "characters bound");
        self.phase = Phase::CharactersBound;
        Ok(())
    }

    fn bind_party_characters(&mut self) -> Result<usize, MboxError> {
        let objects: BTreeSet<ObjectId> = {
            let state = self.state.borrow();
            let party = state.graph.get(self.party()?)?;
            party
                .refs
                .values()
                .copied()
                .filter(|id| {
                    state
                        .graph
                        .find(*id)
                        .is_some_and(|object| object.r#type == ObjectType::Character)
                })
                .collect()
        };

        for object in &objects {
            let id = {
                let mut state = self.state.borrow_mut();
                let name = state.graph.get(*object)?.name.clone();
                let id = CharacterId(state.characters.len());
                state.characters.push(CharacterState::new(*object, name));
                state.character_by_object.insert(*object, id);
                id
            };
            for script in character_script_chain(&self.state, *object) {
                compile_script(&self.engine, &self.state, Some(id), script)?;
            }
        }
        Ok(objects.len())
    }

    pub fn assemble(&mut self) -> Result<(), MboxError> {
        self.expect_phase(Phase::CharactersBound, "assemble")?;
        let assembled = self.run_assembly();
        self.abort_on_error(assembled)?;
        info!(
            target: "mbox",
            slotted = self.state.borrow().slots.len(),
            "party assembled"
        );
        self.phase = Phase::Assembled;
        Ok(())
    }

    fn run_assembly(&mut self) -> Result<(), MboxError> {
        let party = self.party()?;
        let allocation = {
            let mut state = self.state.borrow_mut();
            let characters: Vec<ObjectId> = state.character_by_object.keys().copied().collect();
            let allocation = allocate_macros(&state.graph, party, &characters, &state.pool)?;
            for character in &mut state.characters {
                if let Some(slots) = allocation.for_character(character.object) {
                    character.macros = slots.macros.clone();
                    character.var_macros = slots.var_macros.clone();
                }
            }
            state.actions_this_pass = 0;
            allocation
        };
        info!(
            target: "mbox",
            demand = allocation.demand,
            pool = allocation.pool_size,
            "macro slots allocated"
        );

        run_object_script(&self.engine, &self.state, None, party)?;
        self.allocation = Some(allocation);
        Ok(())
    }

    fn party(&self) -> Result<ObjectId, MboxError> {
        self.state
            .borrow()
            .party
            .ok_or_else(|| MboxError::new(ErrorKind::InvalidState, "No graph has been loaded."))
    }

    pub fn process(&mut self, character: ObjectId, input: Input) -> Result<CycleReport, MboxError> {
        match self.phase {
            Phase::Assembled => {
                info!(target: "mbox", "runtime running");
                self.phase = Phase::Running;
            }
            Phase::Running => {}
            Phase::Cancelled => {
                return Err(MboxError::new(
                    ErrorKind::EngineStopped,
                    "The runtime was cancelled.",
                ))
            }
            other => {
                return Err(MboxError::new(
                    ErrorKind::InvalidState,
                    format!("process needs an assembled party, runtime is {:?}.", other),
                ))
            }
        }

        {
            let mut state = self.state.borrow_mut();
            let id = state.character_by_object.get(&character).copied().ok_or_else(|| {
                MboxError::new(
                    ErrorKind::CharacterNotAssembled,
                    format!("Object {} is not a character of this party.", character),
                )
            })?;
            state.require_slotted(id)?;
            if input.kind().is_none() {
                return Ok(CycleReport::default());
            }
            state.actions_this_pass = 0;
            let name = state.character(id)?.name.clone();
            state.trace(&format!("input {:?} from {}", input, name));
        }

        let failures = fire_events(&self.engine, &self.state, |event| event.matches(&input));

        let mut state = self.state.borrow_mut();
        let mut errors = Vec::with_capacity(failures.len());
        for (owner, error) in failures {
            let entry = state.character_mut(owner)?;
            warn!(target: "mbox", character = %entry.name, "callback failed: {}", error);
            entry.errors.push(error.clone());
            errors.push(ActionError {
                character: entry.object,
                error,
            });
        }
        let sends = std::mem::take(&mut state.sends);
        Ok(CycleReport {
            batches: build_batches(&sends),
            errors,
        })
    }

    pub fn cancel(&mut self) {
        if self.phase != Phase::Cancelled {
            info!(target: "mbox", "runtime cancelled");
        }
        self.teardown();
    }

    pub fn take_pending_output(&mut self) -> Vec<OutputBatch> {
        let sends = std::mem::take(&mut self.state.borrow_mut().sends);
        build_batches(&sends)
    }

    pub fn export(&self) -> Result<Vec<MacroBinding>, MboxError> {
        let allocation = self.allocation.as_ref().ok_or_else(|| {
            MboxError::new(ErrorKind::InvalidState, "Macro slots have not been allocated.")
        })?;
        Ok(export_bindings(&self.state.borrow().graph, allocation))
    }

    pub fn slotted_characters(&self) -> Vec<SlottedCharacter> {
        let state = self.state.borrow();
        state
            .slots
            .iter()
            .filter_map(|(slot, id)| {
                let character = state.characters.get(id.0)?;
                Some(SlottedCharacter {
                    slot: *slot,
                    object: character.object,
                    name: character.name.clone(),
                })
            })
            .collect()
    }

    pub fn subscription_count(&self, character: ObjectId) -> usize {
        let state = self.state.borrow();
        state
            .character_by_object
            .get(&character)
            .and_then(|id| state.characters.get(id.0))
            .map_or(0, |entry| entry.events.len())
    }

    pub fn character_errors(&self, character: ObjectId) -> Vec<MboxError> {
        let state = self.state.borrow();
        state
            .character_by_object
            .get(&character)
            .and_then(|id| state.characters.get(id.0))
            .map(|entry| entry.errors.clone())
            .unwrap_or_default()
    }
}

fn check_party(graph: &ObjectGraph, party: ObjectId) -> Result<(), MboxError> {
    let object = graph.find(party).ok_or_else(|| {
        MboxError::new(ErrorKind::InvalidParty, format!("Party {} does not exist.", party))
    })?;
    if object.r#type != ObjectType::Party {
        return Err(MboxError::new(
            ErrorKind::InvalidParty,
            format!("Object \"{}\" is a {}, not a party.", object.name, object.r#type),
        )
        .with_path(graph.path(party)));
    }
    if !object.has_script() {
        return Err(MboxError::new(
            ErrorKind::InvalidParty,
            format!("Party \"{}\" has an empty script.", object.name),
        )
        .with_path(graph.path(party)));
    }

    for id in dependencies_of(graph, party) {
        let Some(object) = graph.find(id) else {
            continue;
        };
        if let Some(error) = validate(graph, object).into_iter().next() {
            return Err(error);
        }
    }
    Ok(())
}

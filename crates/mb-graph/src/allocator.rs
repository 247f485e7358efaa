use std::collections::{BTreeMap, BTreeSet};

use mb_core::{ErrorKind, Keybind, MboxError, ObjectId, ObjectType};
use tracing::debug;

use crate::dependencies::{dependencies_of, party_shared_dependencies};
use crate::ObjectGraph;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterAllocation {
    pub macros: BTreeMap<ObjectId, Keybind>,
    /// Keyed by `(var_macro, target_character)`.
    pub var_macros: BTreeMap<(ObjectId, ObjectId), Keybind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub keybind: Keybind,
    pub character: ObjectId,
    pub object: ObjectId,
    pub target: Option<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroAllocation {
    pub per_character: BTreeMap<ObjectId, CharacterAllocation>,
    /// Pool order.
    pub assignments: Vec<SlotAssignment>,
    pub demand: usize,
    pub pool_size: usize,
}

impl MacroAllocation {
    pub fn for_character(&self, character: ObjectId) -> Option<&CharacterAllocation> {
        self.per_character.get(&character)
    }
}

struct Demand {
    character: ObjectId,
    macros: Vec<ObjectId>,
    var_macros: Vec<ObjectId>,
}

/// Assigns each reachable (character, macro) and (character, var-macro,
/// target) triple a distinct keybind from `pool`.
///
/// Fails with `not_enough_macros` before committing anything when the demand
/// exceeds the pool. Characters are visited in id order, then macros, then
/// var-macro pairs, so identical inputs give identical bindings.
pub fn allocate_macros(
    graph: &ObjectGraph,
    party: ObjectId,
    characters: &[ObjectId],
    pool: &[Keybind],
) -> Result<MacroAllocation, MboxError> {
    let mut distinct = BTreeSet::new();
    for keybind in pool {
        if !distinct.insert(*keybind) {
            return Err(MboxError::new(
                ErrorKind::InvalidArgument,
                format!("Macro pool lists {} more than once.", keybind),
            ));
        }
    }

    let characters = characters.iter().copied().collect::<BTreeSet<_>>();
    let shared = party_shared_dependencies(graph, party);

    let mut demands = Vec::with_capacity(characters.len());
    for character in &characters {
        let mut reachable = dependencies_of(graph, *character);
        reachable.extend(shared.iter().copied());

        let mut macros = Vec::new();
        let mut var_macros = Vec::new();
        for id in reachable {
            match graph.find(id).map(|object| object.r#type) {
                Some(ObjectType::ActionMacro) => macros.push(id),
                Some(ObjectType::ActionVarMacro) => var_macros.push(id),
                _ => {}
            }
        }
        demands.push(Demand {
            character: *character,
            macros,
            var_macros,
        });
    }

    let demand = demands
        .iter()
        .map(|entry| entry.macros.len() + entry.var_macros.len() * characters.len())
        .sum::<usize>();
    if demand > pool.len() {
        return Err(MboxError::new(
            ErrorKind::NotEnoughMacros,
            format!(
                "Party needs {} macro keybinds but the pool only has {}.",
                demand,
                pool.len()
            ),
        ));
    }

    let mut slots = pool.iter().copied();
    let mut allocation = MacroAllocation {
        demand,
        pool_size: pool.len(),
        ..MacroAllocation::default()
    };
    for entry in demands {
        let mut assigned = CharacterAllocation::default();
        for object in entry.macros {
            let keybind = next_slot(&mut slots)?;
            assigned.macros.insert(object, keybind);
            allocation.assignments.push(SlotAssignment {
                keybind,
                character: entry.character,
                object,
                target: None,
            });
        }
        for object in entry.var_macros {
            for target in &characters {
                let keybind = next_slot(&mut slots)?;
                assigned.var_macros.insert((object, *target), keybind);
                allocation.assignments.push(SlotAssignment {
                    keybind,
                    character: entry.character,
                    object,
                    target: Some(*target),
                });
            }
        }
        allocation.per_character.insert(entry.character, assigned);
    }

    debug!(
        target: "mbox",
        "allocated {} of {} macro keybinds for {} characters",
        allocation.demand,
        allocation.pool_size,
        characters.len()
    );
    Ok(allocation)
}

fn next_slot(slots: &mut impl Iterator<Item = Keybind>) -> Result<Keybind, MboxError> {
    slots.next().ok_or_else(|| {
        MboxError::new(
            ErrorKind::NotEnoughMacros,
            "Macro pool ran out while assigning keybinds.",
        )
    })
}

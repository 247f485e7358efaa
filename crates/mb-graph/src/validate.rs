use std::collections::BTreeMap;

use mb_core::{ErrorKind, MboxError, Object, ObjectId, ObjectType};

use crate::reserved::{is_reserved_name, is_valid_identifier};
use crate::ObjectGraph;

use ObjectType::*;

pub fn allowed_ancestors(r#type: ObjectType) -> &'static [ObjectType] {
    match r#type {
        Directory | Profile => &[Directory],
        Account | Party | Layout | Style => &[Directory, Profile],
        Character => &[Directory, Profile, Account],
        Group => &[Directory, Profile, Account, Character],
        ActionTimer | ActionMacro | ActionVarMacro | ActionScript | Event => {
            &[Directory, Profile, Account, Character, Party, Group]
        }
    }
}

pub fn required_ancestor(r#type: ObjectType) -> Option<ObjectType> {
    match r#type {
        Account | Party | Group => Some(Profile),
        Character => Some(Account),
        _ => None,
    }
}

pub fn allowed_reference_targets(r#type: ObjectType) -> &'static [ObjectType] {
    match r#type {
        Party => &[
            Character,
            Group,
            ActionScript,
            ActionMacro,
            ActionVarMacro,
            ActionTimer,
            Event,
            Layout,
            Style,
        ],
        Profile | Account | Character | Group | ActionScript => &[
            Character,
            Group,
            ActionScript,
            ActionMacro,
            ActionVarMacro,
            ActionTimer,
            Event,
        ],
        ActionTimer => &[ActionScript, Event],
        Event => &[ActionScript],
        Directory | Layout | Style | ActionMacro | ActionVarMacro => &[],
    }
}

/// Checks one object against the graph. An empty list is the only success.
pub fn validate(graph: &ObjectGraph, object: &Object) -> Vec<MboxError> {
    let path = graph.path(object.index);
    let mut errors = Vec::new();
    let mut report = |kind: ErrorKind, message: String| {
        errors.push(MboxError::new(kind, message).with_path(path.clone()));
    };

    if object.name.trim().is_empty() {
        report(
            ErrorKind::InvalidObjectName,
            format!("Object {} has an empty name.", object.index),
        );
    }

    if object.index.0 == 0 || graph.is_duplicate(object.index) {
        report(
            ErrorKind::InvalidObjectIndex,
            format!("Object index {} is missing or not unique.", object.index),
        );
    }

    match graph.ancestors(object.index) {
        Err(error) => report(error.kind, error.message),
        Ok(chain) => {
            let allowed = allowed_ancestors(object.r#type);
            for ancestor in &chain {
                if !allowed.contains(&ancestor.r#type) {
                    report(
                        ErrorKind::InvalidObjectAncestor,
                        format!(
                            "A {} cannot be placed under {} \"{}\".",
                            object.r#type, ancestor.r#type, ancestor.name
                        ),
                    );
                }
            }
            if let Some(required) = required_ancestor(object.r#type) {
                if !chain.iter().any(|ancestor| ancestor.r#type == required) {
                    report(
                        ErrorKind::InvalidObjectAncestor,
                        format!("A {} must have a {} ancestor.", object.r#type, required),
                    );
                }
            }
        }
    }

    let whitelist = allowed_reference_targets(object.r#type);
    let mut seen_targets: BTreeMap<ObjectId, &str> = BTreeMap::new();
    for (name, target) in &object.refs {
        if !is_valid_identifier(name) || is_reserved_name(name) {
            report(
                ErrorKind::InvalidReferenceName,
                format!("Reference name \"{}\" is not a usable identifier.", name),
            );
        }
        if *target == object.index {
            report(
                ErrorKind::SelfReference,
                format!("Reference \"{}\" points at its own object.", name),
            );
            continue;
        }
        if let Some(previous) = seen_targets.insert(*target, name.as_str()) {
            report(
                ErrorKind::DuplicateReference,
                format!(
                    "References \"{}\" and \"{}\" both point at {}.",
                    previous, name, target
                ),
            );
        }
        match graph.find(*target) {
            None => report(
                ErrorKind::InvalidObjectReferences,
                format!("Reference \"{}\" points at missing object {}.", name, target),
            ),
            Some(referenced) if !whitelist.contains(&referenced.r#type) => report(
                ErrorKind::InvalidObjectReferences,
                format!(
                    "A {} cannot reference {} \"{}\" (as \"{}\").",
                    object.r#type, referenced.r#type, referenced.name, name
                ),
            ),
            Some(_) => {}
        }
    }

    errors
}

pub fn validate_graph(graph: &ObjectGraph) -> Vec<MboxError> {
    graph
        .iter()
        .flat_map(|object| validate(graph, object))
        .collect()
}

#[cfg(test)]
mod validate_tests {
    use super::*;

    const ALL_TYPES: [ObjectType; 13] = [
        Directory,
        Profile,
        Account,
        Character,
        Party,
        Group,
        Layout,
        Style,
        ActionTimer,
        ActionMacro,
        ActionVarMacro,
        ActionScript,
        Event,
    ];

    fn kinds(errors: &[MboxError]) -> Vec<ErrorKind> {
        errors.iter().map(|error| error.kind).collect()
    }

    fn base() -> Vec<Object> {
        vec![
            Object::new(1, Profile, None, "Main"),
            Object::new(2, Account, Some(1), "Acct"),
            Object::new(3, Character, Some(2), "Alice"),
            Object::new(4, Party, Some(1), "Raid"),
            Object::new(5, Group, Some(1), "Tanks"),
        ]
    }

    #[test]
    fn well_formed_graph_has_no_errors() {
        let mut objects = base();
        objects[3] = objects[3].clone().with_ref("Alice", 3).with_ref("Tanks", 5);
        let graph = ObjectGraph::new(objects);
        assert!(validate_graph(&graph).is_empty());
    }

    #[test]
    fn empty_name_and_zero_index_are_rejected() {
        let graph = ObjectGraph::new([Object::new(0, Directory, None, "  ")]);
        let object = graph.find(ObjectId(0)).expect("object");
        let found = kinds(&validate(&graph, object));
        assert!(found.contains(&ErrorKind::InvalidObjectName));
        assert!(found.contains(&ErrorKind::InvalidObjectIndex));
    }

    #[test]
    fn inserting_a_cycle_is_rejected() {
        let mut objects = base();
        objects[0].parent = Some(ObjectId(3));
        let graph = ObjectGraph::new(objects);
        let errors = validate_graph(&graph);
        assert!(kinds(&errors).contains(&ErrorKind::InvalidObjectParent));
        assert!(errors.iter().all(|error| error.path.is_some()));
    }

    #[test]
    fn ancestor_whitelist_and_required_type() {
        let graph = ObjectGraph::new([
            Object::new(1, Profile, None, "Main"),
            Object::new(2, Character, Some(1), "Orphan"),
            Object::new(3, Account, Some(1), "Acct"),
            Object::new(4, Profile, Some(3), "Nested"),
        ]);
        let orphan = validate(&graph, graph.find(ObjectId(2)).expect("orphan"));
        assert_eq!(kinds(&orphan), vec![ErrorKind::InvalidObjectAncestor]);
        let nested = validate(&graph, graph.find(ObjectId(4)).expect("nested"));
        assert_eq!(
            kinds(&nested),
            vec![ErrorKind::InvalidObjectAncestor, ErrorKind::InvalidObjectAncestor]
        );
    }

    #[test]
    fn reference_legality_rules() {
        let mut objects = base();
        objects[2] = objects[2]
            .clone()
            .with_ref("Me", 5)
            .with_ref("Self_", 3)
            .with_ref("Other", 5)
            .with_ref("Ghost", 77);
        let graph = ObjectGraph::new(objects);
        let found = kinds(&validate(&graph, graph.find(ObjectId(3)).expect("alice")));
        assert!(found.contains(&ErrorKind::InvalidReferenceName));
        assert!(found.contains(&ErrorKind::SelfReference));
        assert!(found.contains(&ErrorKind::DuplicateReference));
        assert!(found.contains(&ErrorKind::InvalidObjectReferences));
    }

    #[test]
    fn rhai_keywords_are_not_reference_names() {
        for name in ["is", "_"] {
            let mut objects = base();
            objects[2] = objects[2].clone().with_ref(name, 5);
            let graph = ObjectGraph::new(objects);
            let errors = validate(&graph, graph.find(ObjectId(3)).expect("alice"));
            assert_eq!(kinds(&errors), vec![ErrorKind::InvalidReferenceName], "{}", name);
        }
    }

    #[test]
    fn every_pair_outside_the_whitelist_fails() {
        for owner in ALL_TYPES {
            for target in ALL_TYPES {
                let graph = ObjectGraph::new([
                    Object::new(1, owner, None, "Owner").with_ref("Target", 2),
                    Object::new(2, target, None, "Target"),
                ]);
                let found = kinds(&validate(&graph, graph.find(ObjectId(1)).expect("owner")));
                let rejected = found.contains(&ErrorKind::InvalidObjectReferences);
                assert_eq!(
                    rejected,
                    !allowed_reference_targets(owner).contains(&target),
                    "{} -> {}",
                    owner,
                    target
                );
            }
        }
    }
}

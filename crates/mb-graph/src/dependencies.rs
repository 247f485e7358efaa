use std::collections::BTreeSet;

use mb_core::{ObjectId, ObjectType};

use crate::ObjectGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reach {
    /// Rooted at a party: every listed character's tree is followed.
    Party,
    /// Rooted anywhere else: other characters' private trees stay closed.
    Private,
}

/// Adds every object reachable from `root` to `visited`.
///
/// Character roots also pull in their account and profile ancestors. A
/// character, account or profile reached through a reference is recorded but
/// not expanded unless the traversal started at a party.
pub fn enum_dependencies(graph: &ObjectGraph, root: ObjectId, visited: &mut BTreeSet<ObjectId>) {
    let reach = match graph.find(root).map(|object| object.r#type) {
        Some(ObjectType::Party) => Reach::Party,
        _ => Reach::Private,
    };
    visit(graph, root, reach, visited);
}

pub fn dependencies_of(graph: &ObjectGraph, root: ObjectId) -> BTreeSet<ObjectId> {
    let mut visited = BTreeSet::new();
    enum_dependencies(graph, root, &mut visited);
    visited
}

/// Objects the party shares with every character: its non-character refs,
/// traversed with private reach.
pub fn party_shared_dependencies(graph: &ObjectGraph, party: ObjectId) -> BTreeSet<ObjectId> {
    let mut visited = BTreeSet::new();
    let Some(object) = graph.find(party) else {
        return visited;
    };
    for target in object.refs.values() {
        let is_character = graph
            .find(*target)
            .is_some_and(|referenced| referenced.r#type == ObjectType::Character);
        if !is_character {
            visit(graph, *target, Reach::Private, &mut visited);
        }
    }
    visited
}

fn visit(graph: &ObjectGraph, id: ObjectId, reach: Reach, visited: &mut BTreeSet<ObjectId>) {
    if !visited.insert(id) {
        return;
    }
    let Some(object) = graph.find(id) else {
        return;
    };

    if object.r#type == ObjectType::Character {
        let owners = graph
            .ancestors(id)
            .unwrap_or_default()
            .into_iter()
            .filter(|ancestor| {
                matches!(ancestor.r#type, ObjectType::Account | ObjectType::Profile)
            })
            .map(|ancestor| ancestor.index)
            .collect::<Vec<_>>();
        for owner in owners {
            visit(graph, owner, reach, visited);
        }
    }

    for target in object.refs.values() {
        let Some(referenced) = graph.find(*target) else {
            continue;
        };
        let private_tree = matches!(
            referenced.r#type,
            ObjectType::Character | ObjectType::Account | ObjectType::Profile
        );
        if private_tree && reach == Reach::Private && object.r#type != ObjectType::Party {
            visited.insert(*target);
            continue;
        }
        visit(graph, *target, reach, visited);
    }
}

#[cfg(test)]
mod dependencies_tests {
    use super::*;
    use mb_core::Object;
    use ObjectType::*;

    // Alice and Bob share a profile; Bob's private script must stay out of
    // Alice's tree even though Alice references Bob.
    fn graph() -> ObjectGraph {
        ObjectGraph::new([
            Object::new(1, Profile, None, "Main").with_ref("Shared", 20),
            Object::new(2, Account, Some(1), "AcctA"),
            Object::new(3, Account, Some(1), "AcctB").with_ref("BobAcctMacro", 23),
            Object::new(10, Character, Some(2), "Alice")
                .with_ref("Bob", 11)
                .with_ref("Heal", 21),
            Object::new(11, Character, Some(3), "Bob").with_ref("Secret", 22),
            Object::new(12, Party, Some(1), "Raid")
                .with_ref("Alice", 10)
                .with_ref("Bob", 11)
                .with_ref("Tanks", 30),
            Object::new(20, ActionScript, Some(1), "Shared"),
            Object::new(21, ActionMacro, Some(2), "Heal"),
            Object::new(22, ActionScript, Some(3), "Secret"),
            Object::new(23, ActionMacro, Some(3), "BobAcctMacro"),
            Object::new(30, Group, Some(1), "Tanks").with_ref("Bob", 11),
        ])
    }

    fn ids(values: &[u32]) -> BTreeSet<ObjectId> {
        values.iter().copied().map(ObjectId).collect()
    }

    #[test]
    fn character_tree_includes_own_ancestors_but_not_siblings() {
        let deps = dependencies_of(&graph(), ObjectId(10));
        assert_eq!(deps, ids(&[1, 2, 10, 11, 20, 21]));
        assert!(!deps.contains(&ObjectId(22)));
        assert!(!deps.contains(&ObjectId(3)));
    }

    #[test]
    fn party_tree_reaches_every_listed_character() {
        let deps = dependencies_of(&graph(), ObjectId(12));
        assert_eq!(deps, ids(&[1, 2, 3, 10, 11, 12, 20, 21, 22, 23, 30]));
    }

    #[test]
    fn group_reached_privately_does_not_open_member_tree() {
        let deps = dependencies_of(&graph(), ObjectId(30));
        assert_eq!(deps, ids(&[11, 30]));
    }

    #[test]
    fn shared_party_tree_skips_characters() {
        let shared = party_shared_dependencies(&graph(), ObjectId(12));
        assert_eq!(shared, ids(&[11, 30]));
    }

    #[test]
    fn visited_set_is_extended_not_replaced() {
        let graph = graph();
        let mut visited = ids(&[99]);
        enum_dependencies(&graph, ObjectId(21), &mut visited);
        assert_eq!(visited, ids(&[21, 99]));
    }
}

use std::collections::btree_map::Values;
use std::collections::{BTreeMap, BTreeSet};

use mb_core::{ErrorKind, MboxError, Object, ObjectId, ObjectType};

/// Read-only snapshot of the object graph handed over by the editor.
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    objects: BTreeMap<ObjectId, Object>,
    duplicates: BTreeSet<ObjectId>,
}

impl ObjectGraph {
    pub fn new(objects: impl IntoIterator<Item = Object>) -> Self {
        let mut graph = Self::default();
        for object in objects {
            let index = object.index;
            if graph.objects.insert(index, object).is_some() {
                graph.duplicates.insert(index);
            }
        }
        graph
    }

    pub fn find(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn get(&self, id: ObjectId) -> Result<&Object, MboxError> {
        self.find(id).ok_or_else(|| {
            MboxError::new(
                ErrorKind::InvalidObjectIndex,
                format!("Object {} does not exist.", id),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> Values<'_, ObjectId, Object> {
        self.objects.values()
    }

    pub fn is_duplicate(&self, id: ObjectId) -> bool {
        self.duplicates.contains(&id)
    }

    /// Parent chain from the direct parent up to the root.
    ///
    /// The walk is bounded by the graph size, so a cycle or a dangling parent
    /// surfaces as `invalid_object_parent` instead of looping.
    pub fn ancestors(&self, id: ObjectId) -> Result<Vec<&Object>, MboxError> {
        let object = self.get(id)?;
        let mut chain = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut cursor = object.parent;

        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) || chain.len() >= self.objects.len() {
                return Err(MboxError::new(
                    ErrorKind::InvalidObjectParent,
                    format!("Parent chain of {} contains a cycle at {}.", id, parent_id),
                ));
            }
            let parent = self.find(parent_id).ok_or_else(|| {
                MboxError::new(
                    ErrorKind::InvalidObjectParent,
                    format!("Parent {} of {} does not exist.", parent_id, id),
                )
            })?;
            chain.push(parent);
            cursor = parent.parent;
        }

        Ok(chain)
    }

    pub fn nearest_ancestor(&self, id: ObjectId, r#type: ObjectType) -> Option<&Object> {
        self.ancestors(id)
            .ok()?
            .into_iter()
            .find(|ancestor| ancestor.r#type == r#type)
    }

    /// Slash separated names from the root down to `id`.
    pub fn path(&self, id: ObjectId) -> String {
        let Some(object) = self.find(id) else {
            return id.to_string();
        };
        let mut names = match self.ancestors(id) {
            Ok(chain) => chain
                .iter()
                .map(|ancestor| ancestor.name.as_str())
                .collect::<Vec<_>>(),
            Err(_) => vec!["?"],
        };
        names.reverse();
        names.push(object.name.as_str());
        names.join("/")
    }
}

#[cfg(test)]
mod store_tests {
    use super::*;

    fn chain() -> ObjectGraph {
        ObjectGraph::new([
            Object::new(1, ObjectType::Profile, None, "Main"),
            Object::new(2, ObjectType::Account, Some(1), "Acct"),
            Object::new(3, ObjectType::Character, Some(2), "Alice"),
        ])
    }

    #[test]
    fn ancestors_walk_to_root() {
        let graph = chain();
        let names = graph
            .ancestors(ObjectId(3))
            .expect("acyclic chain")
            .iter()
            .map(|object| object.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Acct", "Main"]);
        assert_eq!(graph.path(ObjectId(3)), "Main/Acct/Alice");
        assert_eq!(
            graph
                .nearest_ancestor(ObjectId(3), ObjectType::Profile)
                .map(|object| object.index),
            Some(ObjectId(1))
        );
    }

    #[test]
    fn cycle_is_reported_not_looped() {
        let graph = ObjectGraph::new([
            Object::new(1, ObjectType::Directory, Some(2), "A"),
            Object::new(2, ObjectType::Directory, Some(1), "B"),
        ]);
        let error = graph.ancestors(ObjectId(1)).expect_err("cycle");
        assert_eq!(error.kind, ErrorKind::InvalidObjectParent);
        assert_eq!(graph.path(ObjectId(1)), "?/A");
    }

    #[test]
    fn dangling_parent_and_duplicates_are_tracked() {
        let graph = ObjectGraph::new([
            Object::new(1, ObjectType::Directory, Some(40), "A"),
            Object::new(2, ObjectType::Directory, None, "B"),
            Object::new(2, ObjectType::Directory, None, "B2"),
        ]);
        let error = graph.ancestors(ObjectId(1)).expect_err("dangling");
        assert_eq!(error.kind, ErrorKind::InvalidObjectParent);
        assert!(graph.is_duplicate(ObjectId(2)));
        assert_eq!(graph.len(), 2);
        assert_eq!(
            graph.get(ObjectId(99)).expect_err("missing").kind,
            ErrorKind::InvalidObjectIndex
        );
    }
}

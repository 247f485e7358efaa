use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
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
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Profile => "profile",
            Self::Account => "account",
            Self::Character => "character",
            Self::Party => "party",
            Self::Group => "group",
            Self::Layout => "layout",
            Self::Style => "style",
            Self::ActionTimer => "action_timer",
            Self::ActionMacro => "action_macro",
            Self::ActionVarMacro => "action_var_macro",
            Self::ActionScript => "action_script",
            Self::Event => "event",
        }
    }

    /// Types whose `value` is compiled and executed as a script.
    pub fn is_script_bearing(self) -> bool {
        matches!(
            self,
            Self::Party
                | Self::Character
                | Self::Account
                | Self::Profile
                | Self::Group
                | Self::ActionScript
        )
    }

    pub fn is_macro(self) -> bool {
        matches!(self, Self::ActionMacro | Self::ActionVarMacro)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub index: ObjectId,
    #[serde(rename = "type")]
    pub r#type: ObjectType,
    #[serde(default)]
    pub parent: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub refs: BTreeMap<String, ObjectId>,
}

impl Object {
    pub fn new(
        index: u32,
        r#type: ObjectType,
        parent: Option<u32>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            index: ObjectId(index),
            r#type,
            parent: parent.map(ObjectId),
            name: name.into(),
            value: String::new(),
            refs: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_ref(mut self, name: impl Into<String>, target: u32) -> Self {
        self.refs.insert(name.into(), ObjectId(target));
        self
    }

    pub fn has_script(&self) -> bool {
        self.r#type.is_script_bearing() && !self.value.trim().is_empty()
    }
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn builder_sets_refs_and_value() {
        let object = Object::new(7, ObjectType::Character, Some(3), "Alice")
            .with_value("mbox::JoinGroup(Tanks);")
            .with_ref("Tanks", 9);
        assert_eq!(object.index, ObjectId(7));
        assert_eq!(object.parent, Some(ObjectId(3)));
        assert_eq!(object.refs.get("Tanks"), Some(&ObjectId(9)));
        assert!(object.has_script());
    }

    #[test]
    fn macros_never_carry_scripts() {
        let object = Object::new(1, ObjectType::ActionMacro, None, "Heal").with_value("/cast Heal");
        assert!(!object.has_script());
        assert!(object.r#type.is_macro());
        assert!(!ObjectType::Event.is_script_bearing());
    }

    #[test]
    fn object_deserializes_with_defaults() {
        let object: Object = serde_json::from_str(
            r#"{"index": 4, "type": "action_var_macro", "name": "Assist"}"#,
        )
        .expect("object should deserialize");
        assert_eq!(object.r#type, ObjectType::ActionVarMacro);
        assert!(object.parent.is_none());
        assert!(object.refs.is_empty());
        assert_eq!(ObjectType::ActionVarMacro.to_string(), "action_var_macro");
    }
}

mod allocator;
mod dependencies;
mod export;
mod reserved;
mod store;
mod validate;

pub use allocator::{allocate_macros, CharacterAllocation, MacroAllocation, SlotAssignment};
pub use dependencies::{dependencies_of, enum_dependencies, party_shared_dependencies};
pub use export::{export_bindings, render_bindings_json, MacroBinding, VAR_MACRO_TARGET_PLACEHOLDER};
pub use reserved::{is_reserved_name, is_valid_identifier, BUILTIN_NAMES, RESERVED_NAMES};
pub use store::ObjectGraph;
pub use validate::{
    allowed_ancestors, allowed_reference_targets, required_ancestor, validate, validate_graph,
};

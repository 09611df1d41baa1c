//! Field-value access: polymorphic get/set of named segments on targets
//!
//! The submodules layer upward: accessor strategies resolve one segment on
//! one runtime type, paths chain segments with per-node caching, the info
//! module enumerates what a type exposes, and the relationship module
//! mutates to-many properties.

mod accessor;
mod info;
mod path;
mod relationship;

pub use accessor::{
    AccessEnv, AccessorResolver, Direction, FieldAccessor, MemberAccessPolicy, PropertyExtension,
    PublicMembersOnly, default_resolver, property_extensions,
};
pub(crate) use accessor::default_resolver_arc;
pub use info::{FieldInfo, FieldInfoCollection, MemberSource};
pub use path::FieldPath;
pub use relationship::{add_to_field, remove_from_field};

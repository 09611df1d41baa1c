//! Value model and type metadata
//!
//! This module provides the dynamic [`Value`] type the engine evaluates
//! over, the shared object handle for application targets, and the
//! registration tables that stand in for runtime reflection.

mod object;
mod types;
mod value;

pub use object::{ObjectHandle, PropertyBag, SparseArray};
pub use types::{
    ClassBuilder, ClassInfo, ExtensibleHooks, FieldDef, GetterFn, MethodDef, MethodFn, ParamSpec,
    SetterFn, TypeMetadataProvider, TypeRegistry, global_types, register_class,
};
pub use value::{Sequence, Value};

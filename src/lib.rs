//! Reflective field-path access and expression evaluation
//!
//! `fieldpath` implements a generalized, cached, polymorphic "get/set a
//! named or dotted property path on an arbitrary object" dispatch
//! mechanism, and a tree-walking expression evaluator layered on top of
//! it. Application types participate by registering metadata (a
//! compile-time registration table standing in for runtime reflection);
//! behavior for types that declare nothing can be supplied externally
//! through class-extension registries.
//!
//! # Quick start
//!
//! ```
//! use fieldpath::{ClassBuilder, ObjectHandle, Value, evaluate, get_field_value};
//!
//! struct Item {
//!     name: String,
//!     price: i64,
//! }
//!
//! ClassBuilder::new("Item")
//!     .readonly_field::<Item, _>("name", "String", |i| Value::from(i.name.clone()))
//!     .readonly_field::<Item, _>("price", "Long", |i| Value::Long(i.price))
//!     .register();
//!
//! let item = Value::Object(ObjectHandle::new(
//!     "Item",
//!     Item { name: "anvil".into(), price: 140 },
//! ));
//! assert_eq!(get_field_value(&item, "name").unwrap(), Value::from("anvil"));
//! assert_eq!(evaluate("price > 100", &item).unwrap(), Value::Bool(true));
//! ```
//!
//! # Extension points
//!
//! - [`property_extensions`]: property-access strategies for types whose
//!   accessors live on a helper object
//! - [`list_strategies`]: ordered-list strategies for sequence behavior
//! - [`register_numeric_ops`]: arithmetic for custom numeric types, keyed
//!   by type name
//! - [`TypeMetadataProvider`]: alternative type-metadata sources for
//!   method dispatch and accessor resolution

pub mod error;
pub mod expr;
pub mod extension;
pub mod fieldvalue;
pub mod list;
pub mod model;
pub mod parser;

mod engine;

pub use engine::ExprEngine;
pub use error::{FieldPathError, Result};
pub use expr::{
    BinaryOperator, CustomNumericOps, Evaluation, ExprContext, ExprNode, NumericKind,
    ProjectionKind, Subscript, SymbolTable, UnaryOperator, register_numeric_ops,
};
pub use extension::ClassExtensionRegistry;
pub use fieldvalue::{
    AccessorResolver, FieldAccessor, FieldInfo, FieldInfoCollection, FieldPath,
    MemberAccessPolicy, PropertyExtension, add_to_field, property_extensions, remove_from_field,
};
pub use list::{OrderedList, list_strategies, list_strategy_for};
pub use model::{
    ClassBuilder, ClassInfo, ObjectHandle, ParamSpec, PropertyBag, Sequence, SparseArray,
    TypeMetadataProvider, TypeRegistry, Value, global_types, register_class,
};
pub use parser::parse_expression;

/// Read the (possibly dotted) field path off `target`.
///
/// Null intermediates read as `Null`; an unresolvable segment is an error
/// naming the segment and the target type.
pub fn get_field_value(target: &Value, path: &str) -> Result<Value> {
    FieldPath::shared(path)?.get(target)
}

/// Write `value` at the final segment of the field path under `target`.
///
/// A null intermediate makes the write a silent no-op.
pub fn set_field_value(target: &Value, path: &str, value: Value) -> Result<()> {
    FieldPath::shared(path)?.set(target, value)
}

/// Parse and evaluate an expression against `root` with default settings
pub fn evaluate(expression: &str, root: &Value) -> Result<Value> {
    ExprEngine::new().evaluate(expression, root)
}

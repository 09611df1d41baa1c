//! Expression AST, evaluation, and numeric coercion
//!
//! Nodes implement a uniform `get_value(context, source)` contract and are
//! immutable after construction; evaluation mutates only the context and,
//! through `set_value`, target objects. Arithmetic flows through a
//! classify-then-promote numeric engine with an open extension point for
//! custom numeric types.

mod ast;
mod compare;
mod context;
mod eval;
mod methods;
mod numeric;

pub use ast::{
    BinaryOperator, ExprNode, ProjectionKind, Subscript, UnaryOperator,
};
pub use compare::{compare_with_conversion, is_equal, truthy};
pub use context::{
    ClassResolver, DefaultTypeConverter, Evaluation, ExprContext, GlobalClassResolver, SymbolTable,
    TypeConverter,
};
pub use methods::invoke_method;
pub use numeric::{
    CustomNumericOps, NumericKind, add, classify, divide, multiply, negate, numeric_ops,
    promoted_kind, register_numeric_ops, remainder, subtract,
};

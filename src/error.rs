//! Error types for field access and expression evaluation
//!
//! A single crate-level error enum covers the whole engine. The design
//! philosophy is "fail loud and immediately for programmer errors, fail
//! quiet/null for normal absence": a missing accessor or an incomparable
//! pair of operands is an error, a null link in a path chain is not.

use thiserror::Error;

/// Result type alias for field-path operations
pub type Result<T> = std::result::Result<T, FieldPathError>;

/// Comprehensive error type for field access and expression evaluation
#[derive(Error, Debug)]
pub enum FieldPathError {
    /// Expression parsing errors
    #[error("Parse error at position {position}: {message}")]
    Parse {
        /// Character offset in the input where parsing failed
        position: usize,
        /// Human-readable error message
        message: String,
    },

    /// No accessor could be resolved for a (type, field) pair
    #[error("No {access} field '{field}' on type {type_name}")]
    Resolution {
        /// "gettable" or "settable", depending on the direction requested
        access: &'static str,
        /// The field name that failed to resolve
        field: String,
        /// The runtime type of the target object
        type_name: String,
    },

    /// An underlying accessor failed while getting or setting a value
    #[error("Field operation on '{field}' of type {type_name} failed: {source}")]
    Invocation {
        /// The field being accessed when the failure occurred
        field: String,
        /// The runtime type of the target object
        type_name: String,
        /// The original cause, wrapped exactly once
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Type errors during evaluation or conversion
    #[error("Type error: {message}")]
    Type {
        /// Human-readable type error message
        message: String,
    },

    /// Division by zero, overflow, or other arithmetic failures
    #[error("Arithmetic error: {message}")]
    Arithmetic {
        /// Human-readable arithmetic error message
        message: String,
    },

    /// Two values could not be ordered against each other
    #[error("Cannot compare values of types {left_type} and {right_type}")]
    Comparison {
        /// Runtime type of the left operand
        left_type: String,
        /// Runtime type of the right operand
        right_type: String,
    },

    /// A sequence strategy rejected a mutating operation
    #[error("Unsupported operation '{operation}' on sequence type {type_name}")]
    UnsupportedOperation {
        /// The operation that was attempted
        operation: &'static str,
        /// The sequence strategy's target type
        type_name: String,
    },

    /// A relationship property could not be configured for mutation
    #[error("No add/remove method and no known collection type for property '{property}' of {type_name}")]
    Configuration {
        /// The owning type
        type_name: String,
        /// The relationship property
        property: String,
    },

    /// No matching method overload was found
    #[error("No method '{method}' applicable on type {type_name}")]
    NoSuchMethod {
        /// The method name that failed to resolve
        method: String,
        /// The runtime type of the call target
        type_name: String,
    },
}

impl FieldPathError {
    /// Wrap a foreign failure raised inside an accessor, exactly once.
    ///
    /// A cause that is already a [`FieldPathError`] is returned unchanged so
    /// failures are never double-wrapped.
    pub fn invocation(
        field: &str,
        type_name: &str,
        cause: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        match cause.downcast::<FieldPathError>() {
            Ok(original) => *original,
            Err(foreign) => FieldPathError::Invocation {
                field: field.to_string(),
                type_name: type_name.to_string(),
                source: foreign,
            },
        }
    }

    /// Shorthand for a resolution failure in the get direction.
    pub fn no_getter(field: &str, type_name: &str) -> Self {
        FieldPathError::Resolution {
            access: "gettable",
            field: field.to_string(),
            type_name: type_name.to_string(),
        }
    }

    /// Shorthand for a resolution failure in the set direction.
    pub fn no_setter(field: &str, type_name: &str) -> Self {
        FieldPathError::Resolution {
            access: "settable",
            field: field.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

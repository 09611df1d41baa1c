//! Coercing comparison, equality, and truthiness
//!
//! Ordering mirrors the numeric promotion lattice; non-numeric pairs must
//! be same-kind comparable or carry registered custom operations, else
//! ordering is an error naming both runtime types. Equality instead
//! degrades: incomparable pairs are never equal, never an error — the
//! asymmetry is intentional.

use std::cmp::Ordering;

use crate::error::{FieldPathError, Result};
use crate::model::Value;

use super::numeric::{compare_numeric, numeric_ops, pair_is_numeric};

/// Three-way comparison with numeric conversion.
///
/// Custom numeric types compare through their registered operations; a
/// null operand in a numeric pair reads as zero; two non-numeric values
/// must be of the same comparable kind.
pub fn compare_with_conversion(left: &Value, right: &Value) -> Result<Ordering> {
    if let Some(ops) = numeric_ops(left.type_name()).or_else(|| numeric_ops(right.type_name())) {
        return ops.compare(left, right);
    }
    if left.is_null() && right.is_null() {
        return Ok(Ordering::Equal);
    }
    if pair_is_numeric(left, right) {
        return compare_numeric(left, right);
    }
    let incomparable = || FieldPathError::Comparison {
        left_type: left.type_name().to_string(),
        right_type: right.type_name().to_string(),
    };
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        _ => Err(incomparable()),
    }
}

/// Coercing equality.
///
/// Null equals only null; numeric pairs compare in the promoted width;
/// custom types compare through their operations; anything incomparable is
/// simply not equal.
pub fn is_equal(left: &Value, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return left.is_null() && right.is_null();
    }
    if let Some(ops) = numeric_ops(left.type_name()).or_else(|| numeric_ops(right.type_name())) {
        return matches!(ops.compare(left, right), Ok(Ordering::Equal));
    }
    if pair_is_numeric(left, right) {
        return matches!(compare_numeric(left, right), Ok(Ordering::Equal));
    }
    // structural equality for same-kind non-numeric values
    left == right
}

/// Truthiness for filters and logical operators: null is false, booleans
/// are themselves, numbers are true when nonzero, everything else is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Char(c) => *c != '\u{0}',
        Value::Byte(n) => *n != 0,
        Value::Short(n) => *n != 0,
        Value::Int(n) => *n != 0,
        Value::Long(n) => *n != 0,
        Value::Float(n) => *n != 0.0,
        Value::Double(n) => *n != 0.0,
        Value::BigInt(n) => !num_traits::Zero::is_zero(n),
        Value::Decimal(d) => !d.is_zero(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;
    use rust_decimal::Decimal;

    #[test]
    fn mixed_width_ordering() {
        assert_eq!(
            compare_with_conversion(&Value::Int(2), &Value::Long(10)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            compare_with_conversion(&Value::Double(2.5), &Value::Int(2)).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            compare_with_conversion(
                &Value::BigInt(BigInt::from(3)),
                &Value::Decimal(Decimal::from(3))
            )
            .unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn strings_order_lexically() {
        assert_eq!(
            compare_with_conversion(&Value::Str("abc".into()), &Value::Str("abd".into())).unwrap(),
            Ordering::Less
        );
    }

    #[test]
    fn incomparable_ordering_errors_but_equality_degrades() {
        let seq = Value::sequence(vec![]);
        let s = Value::Str("x".into());
        assert!(matches!(
            compare_with_conversion(&seq, &s),
            Err(FieldPathError::Comparison { .. })
        ));
        assert!(!is_equal(&seq, &s));
    }

    #[test]
    fn null_equality_asymmetry() {
        assert!(is_equal(&Value::Null, &Value::Null));
        assert!(!is_equal(&Value::Null, &Value::Int(0)));
        // but inside a numeric comparison null reads as zero
        assert_eq!(
            compare_with_conversion(&Value::Null, &Value::Int(0)).unwrap(),
            Ordering::Equal
        );
    }

    #[test]
    fn equality_coerces_numeric_widths() {
        assert!(is_equal(&Value::Int(3), &Value::Long(3)));
        assert!(is_equal(
            &Value::Decimal(Decimal::from(5)),
            &Value::Byte(5)
        ));
        assert!(!is_equal(&Value::Int(1), &Value::Str("1".into())));
    }
}

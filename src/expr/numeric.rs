//! Numeric classification, promotion, and arithmetic
//!
//! Every operand is classified into a fixed ladder of kinds, the pair is
//! promoted through a widening lattice, and the operation is computed in
//! the promoted width. Two phases, classify then dispatch, so that the
//! custom-numeric escape hatch — an arithmetic-operations strategy
//! registered by type name — can intercept before any built-in width is
//! chosen.
//!
//! Lattice rules: integral/integral promotes to the wider integral; a big
//! integer paired with any real promotes to decimal, not double, to avoid
//! precision loss; real/narrower promotes to the wider real. In contexts
//! that may be non-numeric (add, equality) a non-numeric operand forces
//! the non-numeric path; in numeric-only contexts it is read as a double.

use dashmap::DashMap;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use once_cell::sync::Lazy;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{FieldPathError, Result};
use crate::model::Value;

/// Classified numeric kind of one operand
///
/// Declaration order is promotion order for the numeric kinds:
/// `Bool < Byte < Short < Char < Int < Long < BigInt < Float < Double <
/// Decimal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericKind {
    /// Boolean, the narrowest integral
    Bool,
    /// 8-bit integer
    Byte,
    /// 16-bit integer
    Short,
    /// Character, numerically its scalar value
    Char,
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    /// Arbitrary-precision integer
    BigInt,
    /// 32-bit real
    Float,
    /// 64-bit real
    Double,
    /// Arbitrary-precision decimal
    Decimal,
    /// Not a number at all (string, sequence, unregistered object)
    NonNumeric,
    /// Object whose type name has registered arithmetic operations
    Custom,
    /// Null operand
    Null,
}

impl NumericKind {
    fn rank(self) -> u8 {
        match self {
            NumericKind::Bool => 0,
            NumericKind::Byte => 1,
            NumericKind::Short => 2,
            NumericKind::Char => 3,
            NumericKind::Int => 4,
            NumericKind::Long => 5,
            NumericKind::BigInt => 6,
            NumericKind::Float => 7,
            NumericKind::Double => 8,
            NumericKind::Decimal => 9,
            NumericKind::NonNumeric | NumericKind::Custom | NumericKind::Null => u8::MAX,
        }
    }

    fn is_real(self) -> bool {
        matches!(
            self,
            NumericKind::Float | NumericKind::Double | NumericKind::Decimal
        )
    }

    fn is_integral(self) -> bool {
        self.rank() <= NumericKind::BigInt.rank()
    }
}

/// Arithmetic-operations strategy for a custom numeric type
///
/// Registered by declared type name; consulted whenever either operand of
/// a binary operation carries a registered type, before any built-in
/// promotion. Strategies receive the raw operands and own their own
/// null/mixed-operand handling — averaging money must produce money.
pub trait CustomNumericOps: Send + Sync {
    /// `left + right`
    fn add(&self, left: &Value, right: &Value) -> Result<Value>;

    /// `left - right`
    fn subtract(&self, left: &Value, right: &Value) -> Result<Value>;

    /// `left * right`
    fn multiply(&self, left: &Value, right: &Value) -> Result<Value>;

    /// `left / right`
    fn divide(&self, left: &Value, right: &Value) -> Result<Value>;

    /// `left % right`; most custom types have no remainder
    fn remainder(&self, left: &Value, right: &Value) -> Result<Value> {
        let _ = right;
        Err(FieldPathError::Arithmetic {
            message: format!("no remainder for type {}", left.type_name()),
        })
    }

    /// `-value`
    fn negate(&self, value: &Value) -> Result<Value> {
        Err(FieldPathError::Arithmetic {
            message: format!("no negation for type {}", value.type_name()),
        })
    }

    /// Three-way comparison
    fn compare(&self, left: &Value, right: &Value) -> Result<Ordering>;
}

static NUMERIC_OPS: Lazy<DashMap<String, Arc<dyn CustomNumericOps>>> = Lazy::new(DashMap::new);

/// Register arithmetic operations for a custom numeric type name
pub fn register_numeric_ops(type_name: &str, ops: Arc<dyn CustomNumericOps>) {
    log::debug!("registering custom numeric ops for {type_name}");
    NUMERIC_OPS.insert(type_name.to_string(), ops);
}

/// The registered operations for a type name, if any
pub fn numeric_ops(type_name: &str) -> Option<Arc<dyn CustomNumericOps>> {
    NUMERIC_OPS.get(type_name).map(|e| e.value().clone())
}

fn custom_ops_for(left: &Value, right: &Value) -> Option<Arc<dyn CustomNumericOps>> {
    numeric_ops(left.type_name()).or_else(|| numeric_ops(right.type_name()))
}

/// Classify one operand into its numeric kind
pub fn classify(value: &Value) -> NumericKind {
    match value {
        Value::Null => NumericKind::Null,
        Value::Bool(_) => NumericKind::Bool,
        Value::Byte(_) => NumericKind::Byte,
        Value::Short(_) => NumericKind::Short,
        Value::Char(_) => NumericKind::Char,
        Value::Int(_) => NumericKind::Int,
        Value::Long(_) => NumericKind::Long,
        Value::BigInt(_) => NumericKind::BigInt,
        Value::Float(_) => NumericKind::Float,
        Value::Double(_) => NumericKind::Double,
        Value::Decimal(_) => NumericKind::Decimal,
        Value::Str(_) | Value::Sequence(_) => NumericKind::NonNumeric,
        Value::Object(h) => {
            if NUMERIC_OPS.contains_key(h.type_name()) {
                NumericKind::Custom
            } else {
                NumericKind::NonNumeric
            }
        }
    }
}

/// Pairwise promotion through the widening lattice.
///
/// `can_be_non_numeric` is true in add and equality contexts, where a
/// non-numeric operand legitimately forces the non-numeric path.
pub fn promoted_kind(a: NumericKind, b: NumericKind, can_be_non_numeric: bool) -> NumericKind {
    use NumericKind::*;
    match (a, b) {
        (Null, Null) => NonNumeric,
        (Null, other) | (other, Null) => other,
        _ if a == Custom || b == Custom => Custom,
        _ if can_be_non_numeric && (a == NonNumeric || b == NonNumeric) => NonNumeric,
        _ => {
            // in a numeric-only context a non-numeric operand is read as
            // a double and parsed at use
            let a = if a == NonNumeric { Double } else { a };
            let b = if b == NonNumeric { Double } else { b };
            if (a == BigInt && b.is_real()) || (b == BigInt && a.is_real()) {
                return Decimal;
            }
            if a.rank() >= b.rank() { a } else { b }
        }
    }
}

// ---------------------------------------------------------------------------
// Width conversions (null reads as zero of the promoted width)
// ---------------------------------------------------------------------------

fn to_i64(value: &Value) -> Result<i64> {
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(*b as i64),
        Value::Byte(n) => Ok(*n as i64),
        Value::Short(n) => Ok(*n as i64),
        Value::Char(c) => Ok(*c as u32 as i64),
        Value::Int(n) => Ok(*n as i64),
        Value::Long(n) => Ok(*n),
        other => Err(not_numeric(other)),
    }
}

fn to_bigint(value: &Value) -> Result<BigInt> {
    match value {
        Value::BigInt(n) => Ok(n.clone()),
        other => Ok(BigInt::from(to_i64(other)?)),
    }
}

fn to_f32(value: &Value) -> Result<f32> {
    match value {
        Value::Float(n) => Ok(*n),
        other => Ok(to_f64(other)? as f32),
    }
}

fn to_f64(value: &Value) -> Result<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Float(n) => Ok(*n as f64),
        Value::Double(n) => Ok(*n),
        Value::BigInt(n) => n.to_f64().ok_or_else(|| not_numeric(value)),
        Value::Decimal(d) => d.to_f64().ok_or_else(|| not_numeric(value)),
        Value::Str(s) => f64::from_str(s.trim()).map_err(|_| not_numeric(value)),
        other => Ok(to_i64(other)? as f64),
    }
}

fn to_decimal(value: &Value) -> Result<Decimal> {
    match value {
        Value::Null => Ok(Decimal::ZERO),
        Value::Decimal(d) => Ok(*d),
        Value::BigInt(n) => {
            Decimal::from_str(&n.to_string()).map_err(|_| FieldPathError::Arithmetic {
                message: format!("big integer {n} exceeds decimal range"),
            })
        }
        Value::Float(n) => Decimal::from_f32(*n).ok_or_else(|| not_numeric(value)),
        Value::Double(n) => Decimal::from_f64(*n).ok_or_else(|| not_numeric(value)),
        Value::Str(s) => Decimal::from_str(s.trim()).map_err(|_| not_numeric(value)),
        other => Ok(Decimal::from(to_i64(other)?)),
    }
}

fn not_numeric(value: &Value) -> FieldPathError {
    FieldPathError::Arithmetic {
        message: format!(
            "value of type {} is not numeric: {}",
            value.type_name(),
            value.display_string()
        ),
    }
}

fn integral_value(kind: NumericKind, n: i64) -> Value {
    match kind {
        NumericKind::Bool => Value::Bool(n != 0),
        NumericKind::Byte => Value::Byte(n as i8),
        NumericKind::Short => Value::Short(n as i16),
        NumericKind::Char => Value::Char(char::from_u32(n as u32).unwrap_or('\u{0}')),
        NumericKind::Int => Value::Int(n as i32),
        _ => Value::Long(n),
    }
}

// ---------------------------------------------------------------------------
// Binary operations
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

/// `left + right`: numeric addition, or concatenation when either operand
/// is non-numeric. Two nulls yield the non-numeric default, `Null`.
pub fn add(left: &Value, right: &Value) -> Result<Value> {
    binary(ArithOp::Add, left, right, true)
}

/// `left - right`
pub fn subtract(left: &Value, right: &Value) -> Result<Value> {
    binary(ArithOp::Sub, left, right, false)
}

/// `left * right`
pub fn multiply(left: &Value, right: &Value) -> Result<Value> {
    binary(ArithOp::Mul, left, right, false)
}

/// `left / right`: big-integer and decimal operands use type-specific
/// division; decimal division rounds half-even.
pub fn divide(left: &Value, right: &Value) -> Result<Value> {
    binary(ArithOp::Div, left, right, false)
}

/// `left % right`
pub fn remainder(left: &Value, right: &Value) -> Result<Value> {
    binary(ArithOp::Rem, left, right, false)
}

/// `-value`
pub fn negate(value: &Value) -> Result<Value> {
    if let Some(ops) = numeric_ops(value.type_name()) {
        return ops.negate(value);
    }
    match value {
        Value::Null => Ok(Value::Null),
        Value::Byte(n) => Ok(Value::Byte(n.wrapping_neg())),
        Value::Short(n) => Ok(Value::Short(n.wrapping_neg())),
        Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
        Value::Long(n) => Ok(Value::Long(n.wrapping_neg())),
        Value::BigInt(n) => Ok(Value::BigInt(-n.clone())),
        Value::Float(n) => Ok(Value::Float(-n)),
        Value::Double(n) => Ok(Value::Double(-n)),
        Value::Decimal(d) => Ok(Value::Decimal(-*d)),
        Value::Bool(_) | Value::Char(_) => Ok(integral_value(
            NumericKind::Int,
            -to_i64(value)?,
        )),
        other => Err(not_numeric(other)),
    }
}

fn binary(op: ArithOp, left: &Value, right: &Value, can_be_non_numeric: bool) -> Result<Value> {
    // custom numeric types intercept before any built-in promotion
    if let Some(ops) = custom_ops_for(left, right) {
        return match op {
            ArithOp::Add => ops.add(left, right),
            ArithOp::Sub => ops.subtract(left, right),
            ArithOp::Mul => ops.multiply(left, right),
            ArithOp::Div => ops.divide(left, right),
            ArithOp::Rem => ops.remainder(left, right),
        };
    }

    let (ka, kb) = (classify(left), classify(right));
    if ka == NumericKind::Null && kb == NumericKind::Null {
        return Ok(Value::Null);
    }
    let kind = promoted_kind(ka, kb, can_be_non_numeric);

    match kind {
        NumericKind::NonNumeric => match op {
            ArithOp::Add => Ok(Value::Str(format!(
                "{}{}",
                left.display_string(),
                right.display_string()
            ))),
            _ => Err(FieldPathError::Arithmetic {
                message: format!(
                    "cannot apply {} to {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ),
            }),
        },
        NumericKind::BigInt => bigint_binary(op, &to_bigint(left)?, &to_bigint(right)?),
        NumericKind::Float => Ok(Value::Float(float_binary(
            op,
            to_f32(left)?,
            to_f32(right)?,
        ))),
        NumericKind::Double => Ok(Value::Double(double_binary(
            op,
            to_f64(left)?,
            to_f64(right)?,
        ))),
        NumericKind::Decimal => decimal_binary(op, to_decimal(left)?, to_decimal(right)?),
        kind if kind.is_integral() => {
            integral_binary(op, kind, to_i64(left)?, to_i64(right)?)
        }
        _ => Err(FieldPathError::Arithmetic {
            message: format!(
                "cannot apply {} to {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ),
        }),
    }
}

fn integral_binary(op: ArithOp, kind: NumericKind, a: i64, b: i64) -> Result<Value> {
    let overflow = || FieldPathError::Arithmetic {
        message: format!("integer overflow in {} {} {}", a, op.symbol(), b),
    };
    let div_by_zero = || FieldPathError::Arithmetic {
        message: "division by zero".to_string(),
    };
    let n = match op {
        ArithOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        ArithOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        ArithOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        ArithOp::Div => a.checked_div(b).ok_or_else(div_by_zero)?,
        ArithOp::Rem => a.checked_rem(b).ok_or_else(div_by_zero)?,
    };
    Ok(integral_value(kind, n))
}

fn bigint_binary(op: ArithOp, a: &BigInt, b: &BigInt) -> Result<Value> {
    let n = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Rem => {
            if b.is_zero() {
                return Err(FieldPathError::Arithmetic {
                    message: "division by zero".to_string(),
                });
            }
            if matches!(op, ArithOp::Div) { a / b } else { a % b }
        }
    };
    Ok(Value::BigInt(n))
}

fn float_binary(op: ArithOp, a: f32, b: f32) -> f32 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Rem => a % b,
    }
}

fn double_binary(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Rem => a % b,
    }
}

fn decimal_binary(op: ArithOp, a: Decimal, b: Decimal) -> Result<Value> {
    let overflow = || FieldPathError::Arithmetic {
        message: format!("decimal overflow in {} {} {}", a, op.symbol(), b),
    };
    let d = match op {
        ArithOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        ArithOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        ArithOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        ArithOp::Div | ArithOp::Rem => {
            if b.is_zero() {
                return Err(FieldPathError::Arithmetic {
                    message: "division by zero".to_string(),
                });
            }
            let raw = if matches!(op, ArithOp::Div) {
                a.checked_div(b).ok_or_else(overflow)?
            } else {
                a.checked_rem(b).ok_or_else(overflow)?
            };
            // half-even at the precision limit
            raw.round_dp_with_strategy(28, RoundingStrategy::MidpointNearestEven)
        }
    };
    Ok(Value::Decimal(d.normalize()))
}

/// Numeric three-way comparison in the promoted width; null reads as zero
pub(crate) fn compare_numeric(left: &Value, right: &Value) -> Result<Ordering> {
    let kind = promoted_kind(classify(left), classify(right), false);
    let incomparable = || FieldPathError::Comparison {
        left_type: left.type_name().to_string(),
        right_type: right.type_name().to_string(),
    };
    match kind {
        NumericKind::Decimal => Ok(to_decimal(left)?.cmp(&to_decimal(right)?)),
        NumericKind::BigInt => Ok(to_bigint(left)?.cmp(&to_bigint(right)?)),
        NumericKind::Float | NumericKind::Double => to_f64(left)?
            .partial_cmp(&to_f64(right)?)
            .ok_or_else(incomparable),
        kind if kind.is_integral() => Ok(to_i64(left)?.cmp(&to_i64(right)?)),
        _ => Err(incomparable()),
    }
}

/// Whether the promoted kind of a pair is numeric at all
pub(crate) fn pair_is_numeric(left: &Value, right: &Value) -> bool {
    !matches!(
        promoted_kind(classify(left), classify(right), true),
        NumericKind::NonNumeric
    )
}

/// Primitive-style conversion of `value` into the named builtin kind.
///
/// Returns `None` when no primitive conversion exists; the cast node turns
/// that into its silent `Null`.
pub(crate) fn convert_primitive(value: &Value, target: &str) -> Option<Value> {
    let numeric = !matches!(classify(value), NumericKind::NonNumeric | NumericKind::Custom);
    if !numeric {
        return None;
    }
    let out = match target {
        "Bool" => Value::Bool(to_i64(value).ok()? != 0),
        "Byte" => Value::Byte(to_f64(value).ok()? as i8),
        "Short" => Value::Short(to_f64(value).ok()? as i16),
        "Char" => Value::Char(char::from_u32(to_i64(value).ok()? as u32)?),
        "Int" => Value::Int(to_f64(value).ok()? as i32),
        "Long" => Value::Long(to_f64(value).ok()? as i64),
        "Float" => Value::Float(to_f32(value).ok()?),
        "Double" => Value::Double(to_f64(value).ok()?),
        "BigInt" => match value {
            Value::Float(_) | Value::Double(_) | Value::Decimal(_) => {
                Value::BigInt(BigInt::from(to_f64(value).ok()? as i64))
            }
            other => Value::BigInt(to_bigint(other).ok()?),
        },
        "Decimal" => Value::Decimal(to_decimal(value).ok()?),
        _ => return None,
    };
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    // integral widening
    #[case(Value::Int(1), Value::Long(2), Value::Long(3))]
    #[case(Value::Byte(1), Value::Byte(2), Value::Byte(3))]
    #[case(Value::Short(1), Value::Int(2), Value::Int(3))]
    #[case(Value::Char('a'), Value::Int(1), Value::Int(98))]
    // real widening
    #[case(Value::Long(1), Value::Float(0.5), Value::Float(1.5))]
    #[case(Value::Float(1.0), Value::Double(0.25), Value::Double(1.25))]
    // big integer vs real promotes to decimal, not double
    #[case(
        Value::BigInt(BigInt::from(1)),
        Value::Double(1.5),
        Value::Decimal(Decimal::from_str("2.5").unwrap())
    )]
    #[case(
        Value::BigInt(BigInt::from(2)),
        Value::BigInt(BigInt::from(3)),
        Value::BigInt(BigInt::from(5))
    )]
    // null absorption
    #[case(Value::Null, Value::Int(5), Value::Int(5))]
    #[case(Value::Long(5), Value::Null, Value::Long(5))]
    // non-numeric concatenation
    #[case(Value::Int(1), Value::Str("a".into()), Value::Str("1a".into()))]
    #[case(Value::Str("x".into()), Value::Null, Value::Str("xnull".into()))]
    fn addition_table(#[case] left: Value, #[case] right: Value, #[case] expected: Value) {
        assert_eq!(add(&left, &right).unwrap(), expected);
    }

    #[test]
    fn add_two_nulls_is_the_non_numeric_default() {
        assert_eq!(add(&Value::Null, &Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn decimal_division_rounds_half_even() {
        let ten = Value::Decimal(Decimal::from_str("10").unwrap());
        let four = Value::Decimal(Decimal::from_str("4").unwrap());
        assert_eq!(
            divide(&ten, &four).unwrap(),
            Value::Decimal(Decimal::from_str("2.5").unwrap())
        );
    }

    #[test]
    fn bigint_division_is_integral() {
        let a = Value::BigInt(BigInt::from(10));
        let b = Value::BigInt(BigInt::from(4));
        assert_eq!(divide(&a, &b).unwrap(), Value::BigInt(BigInt::from(2)));
    }

    #[test]
    fn division_by_zero_fails_loudly() {
        assert!(divide(&Value::Int(1), &Value::Int(0)).is_err());
        assert!(divide(&Value::Decimal(Decimal::ONE), &Value::Decimal(Decimal::ZERO)).is_err());
        assert!(
            divide(&Value::BigInt(BigInt::from(1)), &Value::BigInt(BigInt::from(0))).is_err()
        );
    }

    #[test]
    fn subtract_rejects_non_numeric_operands() {
        let err = subtract(&Value::Int(1), &Value::sequence(vec![])).unwrap_err();
        assert!(matches!(err, FieldPathError::Arithmetic { .. }));
    }

    #[test]
    fn numeric_only_context_parses_strings() {
        // "2" * 3 reads the string as a double
        assert_eq!(
            multiply(&Value::Str("2".into()), &Value::Int(3)).unwrap(),
            Value::Double(6.0)
        );
    }

    #[rstest]
    #[case(NumericKind::Int, NumericKind::Long, false, NumericKind::Long)]
    #[case(NumericKind::Long, NumericKind::Float, false, NumericKind::Float)]
    #[case(NumericKind::BigInt, NumericKind::Double, false, NumericKind::Decimal)]
    #[case(NumericKind::BigInt, NumericKind::Float, false, NumericKind::Decimal)]
    #[case(NumericKind::Byte, NumericKind::Short, false, NumericKind::Short)]
    #[case(NumericKind::Short, NumericKind::Char, false, NumericKind::Char)]
    #[case(NumericKind::Null, NumericKind::Decimal, false, NumericKind::Decimal)]
    #[case(NumericKind::NonNumeric, NumericKind::Int, true, NumericKind::NonNumeric)]
    #[case(NumericKind::NonNumeric, NumericKind::Int, false, NumericKind::Double)]
    fn promotion_table(
        #[case] a: NumericKind,
        #[case] b: NumericKind,
        #[case] can_nn: bool,
        #[case] expected: NumericKind,
    ) {
        assert_eq!(promoted_kind(a, b, can_nn), expected);
        assert_eq!(promoted_kind(b, a, can_nn), expected);
    }
}

//! Core value types for field access and expression evaluation

use num_bigint::BigInt;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

use super::object::ObjectHandle;

/// Dynamic value type the engine evaluates over
///
/// Every width of the numeric promotion ladder is a distinct runtime kind,
/// because binary operations classify both operands before promoting.
/// Sequences and objects have reference semantics: cloning a `Value` clones
/// the handle, not the storage, so mutation performed through one handle is
/// visible through every alias — required for observable `set` effects.
#[derive(Clone)]
pub enum Value {
    /// Absent value; tolerated by path traversal, absorbed by arithmetic
    Null,

    /// Boolean value
    Bool(bool),

    /// Character value
    Char(char),

    /// 8-bit signed integer
    Byte(i8),

    /// 16-bit signed integer
    Short(i16),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    Long(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Arbitrary-precision integer
    BigInt(BigInt),

    /// Arbitrary-precision decimal
    Decimal(Decimal),

    /// String value
    Str(String),

    /// Ordered sequence of values (growable or fixed-size)
    Sequence(Sequence),

    /// Application object accessed through registered type metadata
    Object(ObjectHandle),
}

/// Shared, interiorly mutable sequence of values
///
/// A `fixed` sequence models a native array: its length never changes and
/// the sequence strategies reject growth operations on it.
#[derive(Clone)]
pub struct Sequence {
    items: Arc<RwLock<Vec<Value>>>,
    fixed: bool,
}

impl Sequence {
    /// Create a new empty growable sequence
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            fixed: false,
        }
    }

    /// Create a growable sequence from a vector
    pub fn from_vec(values: Vec<Value>) -> Self {
        Self {
            items: Arc::new(RwLock::new(values)),
            fixed: false,
        }
    }

    /// Create a fixed-size sequence (array semantics) from a vector
    pub fn fixed_from_vec(values: Vec<Value>) -> Self {
        Self {
            items: Arc::new(RwLock::new(values)),
            fixed: true,
        }
    }

    /// Whether this sequence has fixed-size array semantics
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the sequence holds no elements at all (nulls count)
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Clone of the element at `index`, if in range
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.read().get(index).cloned()
    }

    /// Replace the element at `index`; returns false when out of range
    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut items = self.items.write();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Append a value
    pub fn push(&self, value: Value) {
        self.items.write().push(value);
    }

    /// Insert a value at `index`, shifting later elements
    pub fn insert(&self, index: usize, value: Value) {
        self.items.write().insert(index, value);
    }

    /// Remove every element
    pub fn clear(&self) {
        self.items.write().clear();
    }

    /// Remove the first element equal to `value`; returns whether one was removed
    pub fn remove_first(&self, value: &Value) -> bool {
        let mut items = self.items.write();
        match items.iter().position(|v| v == value) {
            Some(pos) => {
                items.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Snapshot the elements into an owned vector
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    /// Whether two sequences share the same underlying storage
    pub fn ptr_eq(&self, other: &Sequence) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        *self.items.read() == *other.items.read()
    }
}

impl FromIterator<Value> for Sequence {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Sequence::from_vec(iter.into_iter().collect())
    }
}

impl Value {
    /// Create a growable sequence value from a vector
    pub fn sequence(values: Vec<Value>) -> Self {
        Value::Sequence(Sequence::from_vec(values))
    }

    /// Create a fixed-size array value from a vector
    pub fn array(values: Vec<Value>) -> Self {
        Value::Sequence(Sequence::fixed_from_vec(values))
    }

    /// Whether this value is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The runtime type name used for registry lookups and diagnostics
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Char(_) => "Char",
            Value::Byte(_) => "Byte",
            Value::Short(_) => "Short",
            Value::Int(_) => "Int",
            Value::Long(_) => "Long",
            Value::Float(_) => "Float",
            Value::Double(_) => "Double",
            Value::BigInt(_) => "BigInt",
            Value::Decimal(_) => "Decimal",
            Value::Str(_) => "String",
            Value::Sequence(s) => {
                if s.is_fixed() {
                    "Array"
                } else {
                    "Sequence"
                }
            }
            Value::Object(h) => h.type_name(),
        }
    }

    /// Identity comparison: handle identity for sequences and objects,
    /// strict equality for scalars.
    pub fn identity_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Sequence(a), Value::Sequence(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => self == other,
        }
    }

    /// Render the value the way string concatenation sees it
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Char(c) => c.to_string(),
            Value::Byte(n) => n.to_string(),
            Value::Short(n) => n.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Long(n) => n.to_string(),
            Value::Float(n) => n.to_string(),
            Value::Double(n) => n.to_string(),
            Value::BigInt(n) => n.to_string(),
            Value::Decimal(n) => n.to_string(),
            Value::Str(s) => s.clone(),
            Value::Sequence(s) => {
                let parts: Vec<String> = s.to_vec().iter().map(|v| v.display_string()).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Object(h) => format!("<{}>", h.type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Sequence(s) => {
                let kind = if s.is_fixed() { "Array" } else { "Sequence" };
                write!(f, "{kind}{:?}", s.to_vec())
            }
            Value::Object(h) => write!(f, "Object<{}>", h.type_name()),
            other => write!(f, "{}({})", other.type_name(), other.display_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::sequence(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_clones_alias_storage() {
        let seq = Sequence::from_vec(vec![Value::Int(1)]);
        let alias = seq.clone();
        alias.push(Value::Int(2));
        assert_eq!(seq.len(), 2);
        assert!(seq.ptr_eq(&alias));
    }

    #[test]
    fn array_type_name_differs_from_sequence() {
        assert_eq!(Value::array(vec![]).type_name(), "Array");
        assert_eq!(Value::sequence(vec![]).type_name(), "Sequence");
    }

    #[test]
    fn equality_is_structural_for_sequences() {
        let a = Value::sequence(vec![Value::Int(1), Value::Str("x".into())]);
        let b = Value::sequence(vec![Value::Int(1), Value::Str("x".into())]);
        assert_eq!(a, b);
        if let (Value::Sequence(sa), Value::Sequence(sb)) = (&a, &b) {
            assert!(!sa.ptr_eq(sb));
        }
    }
}

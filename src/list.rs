//! Ordered-list abstraction over heterogeneous containers
//!
//! A polymorphic list protocol lets the expression layer index and iterate
//! without caring whether the container is a growable sequence, a native
//! fixed-size array, or a foreign sparse array. Strategies implement six
//! primitives; everything else is derived generically and may be
//! overridden for efficiency.
//!
//! Null handling is deliberately hole-tolerant: `first_element` and
//! `last_element` skip null entries and `is_empty` treats an all-null
//! sequence as empty, because loosely typed scripting arrays represent
//! holes as nulls.

use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::error::{FieldPathError, Result};
use crate::extension::ClassExtensionRegistry;
use crate::model::{Sequence, SparseArray, TypeMetadataProvider, Value, global_types};

/// Polymorphic ordered-list strategy
pub trait OrderedList: Send + Sync {
    /// The container type this strategy serves
    fn strategy_type(&self) -> &str;

    /// Element count, holes included
    fn size(&self, target: &Value) -> Result<usize>;

    /// Element at `index`; out of range is a `Null` read
    fn element_at(&self, target: &Value, index: usize) -> Result<Value>;

    /// Replace the element at `index`; out of range is a silent no-op
    fn set_element_at(&self, target: &Value, index: usize, value: Value) -> Result<()>;

    /// Append an element; fixed-size strategies reject this
    fn add_element(&self, target: &Value, value: Value) -> Result<()>;

    /// Insert an element at `index`; fixed-size strategies reject this
    fn insert_element_at(&self, target: &Value, value: Value, index: usize) -> Result<()>;

    /// Produce an empty, mutable, same-kind container; fixed-size
    /// strategies reject this
    fn mutable_instance(&self) -> Result<Value>;

    /// Whether the container holds no non-null element
    fn is_empty(&self, target: &Value) -> Result<bool> {
        for i in 0..self.size(target)? {
            if !self.element_at(target, i)?.is_null() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// First non-null element, or `Null` when there is none
    fn first_element(&self, target: &Value) -> Result<Value> {
        for i in 0..self.size(target)? {
            let el = self.element_at(target, i)?;
            if !el.is_null() {
                return Ok(el);
            }
        }
        Ok(Value::Null)
    }

    /// Last non-null element, or `Null` when there is none
    fn last_element(&self, target: &Value) -> Result<Value> {
        for i in (0..self.size(target)?).rev() {
            let el = self.element_at(target, i)?;
            if !el.is_null() {
                return Ok(el);
            }
        }
        Ok(Value::Null)
    }

    /// Index of the first element equal to `value`
    fn index_of(&self, target: &Value, value: &Value) -> Result<Option<usize>> {
        for i in 0..self.size(target)? {
            if &self.element_at(target, i)? == value {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Index of the first element that is identically `value`
    fn index_of_identity(&self, target: &Value, value: &Value) -> Result<Option<usize>> {
        for i in 0..self.size(target)? {
            if self.element_at(target, i)?.identity_eq(value) {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Whether an equal element is present
    fn contains(&self, target: &Value, value: &Value) -> Result<bool> {
        Ok(self.index_of(target, value)?.is_some())
    }

    /// Snapshot the elements into an owned vector
    fn to_vec(&self, target: &Value) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(self.size(target)?);
        for i in 0..self.size(target)? {
            out.push(self.element_at(target, i)?);
        }
        Ok(out)
    }

    /// Element-wise copy into a distinct same-kind container
    fn copy(&self, target: &Value) -> Result<Value> {
        let fresh = self.mutable_instance()?;
        for el in self.to_vec(target)? {
            self.add_element(&fresh, el)?;
        }
        Ok(fresh)
    }

    /// Copy of the elements in `[from, to)`
    fn sub_list(&self, target: &Value, from: usize, to: usize) -> Result<Value> {
        let size = self.size(target)?;
        if from > to || to > size {
            return Err(FieldPathError::Type {
                message: format!(
                    "sublist bounds {from}..{to} out of range for {} of size {size}",
                    self.strategy_type()
                ),
            });
        }
        let fresh = self.mutable_instance()?;
        for i in from..to {
            self.add_element(&fresh, self.element_at(target, i)?)?;
        }
        Ok(fresh)
    }

    /// Empty the container. The generic form nulls every slot, which the
    /// hole-skipping predicates treat as empty; growable strategies
    /// override with a true clear.
    fn remove_all_elements(&self, target: &Value) -> Result<()> {
        for i in 0..self.size(target)? {
            self.set_element_at(target, i, Value::Null)?;
        }
        Ok(())
    }
}

fn expect_sequence<'v>(target: &'v Value, strategy: &str) -> Result<&'v Sequence> {
    match target {
        Value::Sequence(s) => Ok(s),
        other => Err(FieldPathError::Type {
            message: format!(
                "{strategy} strategy applied to non-sequence {}",
                other.type_name()
            ),
        }),
    }
}

/// Strategy for growable sequences
struct GrowableSequenceList;

impl OrderedList for GrowableSequenceList {
    fn strategy_type(&self) -> &str {
        "Sequence"
    }

    fn size(&self, target: &Value) -> Result<usize> {
        Ok(expect_sequence(target, "Sequence")?.len())
    }

    fn element_at(&self, target: &Value, index: usize) -> Result<Value> {
        Ok(expect_sequence(target, "Sequence")?
            .get(index)
            .unwrap_or(Value::Null))
    }

    fn set_element_at(&self, target: &Value, index: usize, value: Value) -> Result<()> {
        expect_sequence(target, "Sequence")?.set(index, value);
        Ok(())
    }

    fn add_element(&self, target: &Value, value: Value) -> Result<()> {
        expect_sequence(target, "Sequence")?.push(value);
        Ok(())
    }

    fn insert_element_at(&self, target: &Value, value: Value, index: usize) -> Result<()> {
        let seq = expect_sequence(target, "Sequence")?;
        if index > seq.len() {
            return Err(FieldPathError::Type {
                message: format!("insert index {index} out of range for size {}", seq.len()),
            });
        }
        seq.insert(index, value);
        Ok(())
    }

    fn mutable_instance(&self) -> Result<Value> {
        Ok(Value::Sequence(Sequence::new()))
    }

    fn remove_all_elements(&self, target: &Value) -> Result<()> {
        expect_sequence(target, "Sequence")?.clear();
        Ok(())
    }
}

/// Strategy for fixed-size native arrays
struct FixedArrayList;

impl FixedArrayList {
    fn unsupported(&self, operation: &'static str) -> FieldPathError {
        FieldPathError::UnsupportedOperation {
            operation,
            type_name: "Array".to_string(),
        }
    }
}

impl OrderedList for FixedArrayList {
    fn strategy_type(&self) -> &str {
        "Array"
    }

    fn size(&self, target: &Value) -> Result<usize> {
        Ok(expect_sequence(target, "Array")?.len())
    }

    fn element_at(&self, target: &Value, index: usize) -> Result<Value> {
        Ok(expect_sequence(target, "Array")?
            .get(index)
            .unwrap_or(Value::Null))
    }

    fn set_element_at(&self, target: &Value, index: usize, value: Value) -> Result<()> {
        expect_sequence(target, "Array")?.set(index, value);
        Ok(())
    }

    fn add_element(&self, _target: &Value, _value: Value) -> Result<()> {
        Err(self.unsupported("add_element"))
    }

    fn insert_element_at(&self, _target: &Value, _value: Value, _index: usize) -> Result<()> {
        Err(self.unsupported("insert_element_at"))
    }

    fn mutable_instance(&self) -> Result<Value> {
        Err(self.unsupported("mutable_instance"))
    }

    fn copy(&self, target: &Value) -> Result<Value> {
        Ok(Value::array(expect_sequence(target, "Array")?.to_vec()))
    }

    fn sub_list(&self, _target: &Value, _from: usize, _to: usize) -> Result<Value> {
        Err(self.unsupported("sub_list"))
    }
}

/// Strategy for the foreign sparse-array object type
struct SparseArrayList;

impl SparseArrayList {
    fn with_slots<R>(
        &self,
        target: &Value,
        f: impl FnOnce(&SparseArray) -> R,
    ) -> Result<R> {
        if let Value::Object(handle) = target
            && let Some(out) = handle.with_downcast_ref::<SparseArray, _>(f)
        {
            return Ok(out);
        }
        Err(FieldPathError::Type {
            message: format!(
                "SparseArray strategy applied to {}",
                target.type_name()
            ),
        })
    }

    fn unsupported(&self, operation: &'static str) -> FieldPathError {
        FieldPathError::UnsupportedOperation {
            operation,
            type_name: SparseArray::TYPE_NAME.to_string(),
        }
    }
}

impl OrderedList for SparseArrayList {
    fn strategy_type(&self) -> &str {
        SparseArray::TYPE_NAME
    }

    fn size(&self, target: &Value) -> Result<usize> {
        self.with_slots(target, |a| a.len())
    }

    fn element_at(&self, target: &Value, index: usize) -> Result<Value> {
        self.with_slots(target, |a| a.get(index).unwrap_or(Value::Null))
    }

    fn set_element_at(&self, target: &Value, index: usize, value: Value) -> Result<()> {
        if let Value::Object(handle) = target
            && handle
                .with_downcast_mut::<SparseArray, _>(|a| a.set(index, value))
                .is_some()
        {
            return Ok(());
        }
        Err(FieldPathError::Type {
            message: format!("SparseArray strategy applied to {}", target.type_name()),
        })
    }

    fn add_element(&self, _target: &Value, _value: Value) -> Result<()> {
        Err(self.unsupported("add_element"))
    }

    fn insert_element_at(&self, _target: &Value, _value: Value, _index: usize) -> Result<()> {
        Err(self.unsupported("insert_element_at"))
    }

    fn mutable_instance(&self) -> Result<Value> {
        Err(self.unsupported("mutable_instance"))
    }

    fn copy(&self, target: &Value) -> Result<Value> {
        let slots = self.with_slots(target, |a| a.to_vec())?;
        Ok(SparseArray::from_slots(slots).into_value())
    }

    fn sub_list(&self, _target: &Value, _from: usize, _to: usize) -> Result<Value> {
        Err(self.unsupported("sub_list"))
    }
}

static LIST_STRATEGIES: Lazy<ClassExtensionRegistry<Arc<dyn OrderedList>>> = Lazy::new(|| {
    let registry = ClassExtensionRegistry::new("list-strategies");
    registry.register("Sequence", Arc::new(GrowableSequenceList) as Arc<dyn OrderedList>);
    registry.register("Array", Arc::new(FixedArrayList) as Arc<dyn OrderedList>);
    registry.register(
        SparseArray::TYPE_NAME,
        Arc::new(SparseArrayList) as Arc<dyn OrderedList>,
    );
    registry
});

/// The process-wide ordered-list strategy registry (extension point for
/// sequence behavior on application types)
pub fn list_strategies() -> &'static ClassExtensionRegistry<Arc<dyn OrderedList>> {
    &LIST_STRATEGIES
}

/// Resolve the list strategy for a value, with optional overrides
pub fn list_strategy_with(
    value: &Value,
    provider: &dyn TypeMetadataProvider,
    overrides: Option<&ClassExtensionRegistry<Arc<dyn OrderedList>>>,
) -> Result<Arc<dyn OrderedList>> {
    list_strategies()
        .lookup_with_overrides(value.type_name(), provider, overrides)
        .ok_or_else(|| FieldPathError::Type {
            message: format!("no ordered-list strategy for type {}", value.type_name()),
        })
}

/// Resolve the list strategy for a value against the global registries
pub fn list_strategy_for(value: &Value) -> Result<Arc<dyn OrderedList>> {
    list_strategy_with(value, global_types(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn null_skipping_conventions() {
        let seq = Value::sequence(vec![Value::Null, Value::Str("x".into()), Value::Null]);
        let list = list_strategy_for(&seq).unwrap();
        assert!(!list.is_empty(&seq).unwrap());
        assert_eq!(list.first_element(&seq).unwrap(), Value::Str("x".into()));
        assert_eq!(list.last_element(&seq).unwrap(), Value::Str("x".into()));

        let holes = Value::sequence(vec![Value::Null, Value::Null]);
        assert!(list.is_empty(&holes).unwrap());
        assert_eq!(list.first_element(&holes).unwrap(), Value::Null);
    }

    #[test]
    fn fixed_array_rejects_growth() {
        let arr = Value::array(vec![Value::Int(1), Value::Int(2)]);
        let list = list_strategy_for(&arr).unwrap();
        assert!(matches!(
            list.add_element(&arr, Value::Int(3)),
            Err(FieldPathError::UnsupportedOperation {
                operation: "add_element",
                ..
            })
        ));
        assert!(list.mutable_instance().is_err());
        // in-place writes stay allowed
        list.set_element_at(&arr, 0, Value::Int(9)).unwrap();
        assert_eq!(list.element_at(&arr, 0).unwrap(), Value::Int(9));
    }

    #[test]
    fn sparse_array_reads_holes_as_null() {
        let sparse = SparseArray::new(3).into_value();
        let list = list_strategy_for(&sparse).unwrap();
        list.set_element_at(&sparse, 1, Value::Long(5)).unwrap();
        assert_eq!(list.element_at(&sparse, 0).unwrap(), Value::Null);
        assert_eq!(list.element_at(&sparse, 1).unwrap(), Value::Long(5));
        assert_eq!(list.first_element(&sparse).unwrap(), Value::Long(5));
        assert!(list.add_element(&sparse, Value::Int(1)).is_err());
    }

    #[test]
    fn copy_produces_distinct_equal_container() {
        let seq = Value::sequence(vec![Value::Int(1), Value::Int(2)]);
        let list = list_strategy_for(&seq).unwrap();
        let copy = list.copy(&seq).unwrap();
        assert_eq!(copy, seq);
        assert!(!copy.identity_eq(&seq));
    }

    #[test]
    fn sub_list_extracts_range() {
        let seq = Value::sequence((0..5).map(Value::Int).collect());
        let list = list_strategy_for(&seq).unwrap();
        let sub = list.sub_list(&seq, 1, 4).unwrap();
        assert_eq!(
            sub,
            Value::sequence(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert!(list.sub_list(&seq, 3, 9).is_err());
    }

    #[test]
    fn remove_all_leaves_growable_truly_empty() {
        let seq = Value::sequence(vec![Value::Int(1)]);
        let list = list_strategy_for(&seq).unwrap();
        list.remove_all_elements(&seq).unwrap();
        assert_eq!(list.size(&seq).unwrap(), 0);

        let arr = Value::array(vec![Value::Int(1)]);
        let arr_list = list_strategy_for(&arr).unwrap();
        arr_list.remove_all_elements(&arr).unwrap();
        assert_eq!(arr_list.size(&arr).unwrap(), 1);
        assert!(arr_list.is_empty(&arr).unwrap());
    }
}

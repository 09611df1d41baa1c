//! Dotted field paths with per-segment accessor caching
//!
//! A path is a singly linked chain of segments; the tail of a chain is
//! itself a valid path for the remaining segments. Each node keeps a
//! one-slot cache of the last getter and setter that resolved it. The slot
//! is only trusted after its applicability predicate passes for the object
//! actually at hand, so interleaving two concrete types through one shared
//! chain stays correct — it merely thrashes the slot.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

use crate::error::{FieldPathError, Result};
use crate::model::Value;

use super::accessor::{AccessEnv, Direction, FieldAccessor};

/// One segment of a dotted property path, linked to the remainder
pub struct FieldPath {
    name: Arc<str>,
    next: Option<Arc<FieldPath>>,
    getter_slot: RwLock<Option<Arc<dyn FieldAccessor>>>,
    setter_slot: RwLock<Option<Arc<dyn FieldAccessor>>>,
}

static SHARED_PATHS: Lazy<DashMap<String, Arc<FieldPath>>> = Lazy::new(DashMap::new);

impl FieldPath {
    /// Parse a dotted path into a private chain.
    ///
    /// Private chains do not share accessor slots with anyone; callers that
    /// interleave several concrete types through the same path string use
    /// this to opt out of cross-call interference.
    pub fn parse(path: &str) -> Result<Arc<FieldPath>> {
        let (head, tail) = match path.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (path, None),
        };
        if head.is_empty() {
            return Err(FieldPathError::Parse {
                position: 0,
                message: format!("empty segment in field path '{path}'"),
            });
        }
        let next = tail.map(FieldPath::parse).transpose()?;
        Ok(Arc::new(FieldPath {
            name: Arc::from(head),
            next,
            getter_slot: RwLock::new(None),
            setter_slot: RwLock::new(None),
        }))
    }

    /// Look up or create the interned shared chain for a path string.
    ///
    /// Every caller using the same literal path reuses one chain object and
    /// its cache slots — a deliberate memory/speed tradeoff.
    pub fn shared(path: &str) -> Result<Arc<FieldPath>> {
        if let Some(hit) = SHARED_PATHS.get(path) {
            return Ok(hit.value().clone());
        }
        let parsed = FieldPath::parse(path)?;
        Ok(SHARED_PATHS
            .entry(path.to_string())
            .or_insert(parsed)
            .value()
            .clone())
    }

    /// This segment's name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The remainder of the chain, when this is not the last segment
    pub fn next(&self) -> Option<&Arc<FieldPath>> {
        self.next.as_ref()
    }

    /// Number of segments from here to the end
    pub fn len(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |n| n.len())
    }

    /// Chains always hold at least one segment
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Read the full path off `target` with the standard environment
    pub fn get(&self, target: &Value) -> Result<Value> {
        self.get_with(target, &AccessEnv::standard())
    }

    /// Write the final segment with the standard environment
    pub fn set(&self, target: &Value, value: Value) -> Result<()> {
        self.set_with(target, value, &AccessEnv::standard())
    }

    /// Read the full path off `target`.
    ///
    /// A null intermediate value short-circuits to `Null`; an unresolvable
    /// segment raises a resolution error naming segment and type.
    pub fn get_with(&self, target: &Value, env: &AccessEnv<'_>) -> Result<Value> {
        let head = self.resolve(target, Direction::Getter, env).get(target)?;
        match &self.next {
            None => Ok(head),
            Some(rest) => {
                if head.is_null() {
                    return Ok(Value::Null);
                }
                rest.get_with(&head, env)
            }
        }
    }

    /// Write `value` at the final segment of the path.
    ///
    /// A null intermediate value makes the whole set a silent no-op — the
    /// asymmetry with get (which returns `Null`) is part of the contract.
    pub fn set_with(&self, target: &Value, value: Value, env: &AccessEnv<'_>) -> Result<()> {
        match &self.next {
            None => self.resolve(target, Direction::Setter, env).set(target, value),
            Some(rest) => {
                let head = self.resolve(target, Direction::Getter, env).get(target)?;
                if head.is_null() {
                    return Ok(());
                }
                rest.set_with(&head, value, env)
            }
        }
    }

    /// Resolve the accessor for this segment against `target`, consulting
    /// the one-slot cache first.
    fn resolve(
        &self,
        target: &Value,
        direction: Direction,
        env: &AccessEnv<'_>,
    ) -> Arc<dyn FieldAccessor> {
        let slot = match direction {
            Direction::Getter => &self.getter_slot,
            Direction::Setter => &self.setter_slot,
        };
        if env.overrides.is_none()
            && let Some(cached) = slot.read().as_ref()
            && cached.applies_to(target)
        {
            return cached.clone();
        }
        let resolved = env.resolver.accessor(
            target.type_name(),
            &self.name,
            direction,
            env.provider,
            env.overrides,
        );
        // overridden resolutions stay out of the shared slot
        if env.overrides.is_none() {
            *slot.write() = Some(resolved.clone());
        }
        resolved
    }

    /// Render the chain back to its dotted form
    pub fn to_path_string(&self) -> String {
        match &self.next {
            None => self.name.to_string(),
            Some(rest) => format!("{}.{}", self.name, rest.to_path_string()),
        }
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({})", self.to_path_string())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_path_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassBuilder, ObjectHandle, register_class};

    #[test]
    fn parse_builds_linked_chain() {
        let path = FieldPath::parse("a.b.c").unwrap();
        assert_eq!(path.name(), "a");
        assert_eq!(path.len(), 3);
        assert_eq!(path.next().unwrap().to_path_string(), "b.c");
    }

    #[test]
    fn shared_interns_by_literal() {
        let one = FieldPath::shared("intern.test.path").unwrap();
        let two = FieldPath::shared("intern.test.path").unwrap();
        assert!(Arc::ptr_eq(&one, &two));
        let private = FieldPath::parse("intern.test.path").unwrap();
        assert!(!Arc::ptr_eq(&one, &private));
    }

    #[test]
    fn empty_segment_is_rejected() {
        assert!(FieldPath::parse("a..b").is_err());
        assert!(FieldPath::parse("").is_err());
    }

    struct Holder {
        inner: Value,
    }

    #[test]
    fn shared_slot_revalidates_across_types() {
        // two unrelated types with an "x" field served by different strategies
        struct P {
            x: i64,
        }
        struct Q;
        register_class(
            ClassBuilder::new("SlotP")
                .readonly_field::<P, _>("x", "Long", |p| Value::Long(p.x))
                .build(),
        );
        register_class(
            ClassBuilder::new("SlotQ")
                .method::<Q, _>("x", &[], |_, _| Ok(Value::Str("from-q".into())))
                .build(),
        );
        let path = FieldPath::shared("x").unwrap();
        let p = Value::Object(ObjectHandle::new("SlotP", P { x: 41 }));
        let q = Value::Object(ObjectHandle::new("SlotQ", Q));
        for _ in 0..3 {
            assert_eq!(path.get(&p).unwrap(), Value::Long(41));
            assert_eq!(path.get(&q).unwrap(), Value::Str("from-q".into()));
        }
    }

    #[test]
    fn null_intermediate_gets_null_and_sets_nothing() {
        register_class(
            ClassBuilder::new("NullHolder")
                .field::<Holder, _, _>(
                    "inner",
                    "Any",
                    |h| h.inner.clone(),
                    |h, v| {
                        h.inner = v;
                        Ok(())
                    },
                )
                .build(),
        );
        let root = Value::Object(ObjectHandle::new("NullHolder", Holder { inner: Value::Null }));
        let path = FieldPath::parse("inner.anything.deeper").unwrap();
        assert_eq!(path.get(&root).unwrap(), Value::Null);
        path.set(&root, Value::Int(1)).unwrap();
        // the intermediate stayed null, nothing was created
        let direct = FieldPath::parse("inner").unwrap();
        assert_eq!(direct.get(&root).unwrap(), Value::Null);
    }
}

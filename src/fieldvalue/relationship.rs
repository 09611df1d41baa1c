//! To-many relationship mutation
//!
//! Adding or removing a value on a relationship property resolves, once per
//! (type, property), either a dedicated `add_to_<prop>`/`remove_from_<prop>`
//! method pair or a generic collection-mutation fallback that lazily
//! creates the collection. The fallback add uses set semantics: a value
//! equal to one already present is skipped.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::error::{FieldPathError, Result};
use crate::list::list_strategy_for;
use crate::model::{MethodDef, Sequence, TypeMetadataProvider, Value, global_types};

use super::accessor::{AccessEnv, Direction};
use super::info::FieldInfoCollection;
use super::path::FieldPath;

enum MutationStrategy {
    Dedicated {
        add: MethodDef,
        remove: Option<MethodDef>,
    },
    Collection,
}

static STRATEGY_CACHE: Lazy<DashMap<(String, String), Arc<MutationStrategy>>> =
    Lazy::new(DashMap::new);

/// Add `value` to the to-many relationship at `path` under `target`.
///
/// All but the last segment navigate by ordinary field access; a null
/// owner anywhere makes the call a silent no-op, matching path-set
/// tolerance.
pub fn add_to_field(target: &Value, path: &str, value: Value) -> Result<()> {
    let (owner, prop) = resolve_owner(target, path)?;
    if owner.is_null() {
        return Ok(());
    }
    let strategy = strategy_for(owner.type_name(), &prop, global_types())?;
    match strategy.as_ref() {
        MutationStrategy::Dedicated { add, .. } => {
            invoke_on(&owner, add, value)?;
            Ok(())
        }
        MutationStrategy::Collection => {
            let collection = get_or_create_collection(&owner, &prop)?;
            let list = list_strategy_for(&collection)?;
            // set semantics: skip when an equal element is already present
            if list.contains(&collection, &value)? {
                return Ok(());
            }
            list.add_element(&collection, value)
        }
    }
}

/// Remove `value` from the to-many relationship at `path` under `target`.
pub fn remove_from_field(target: &Value, path: &str, value: Value) -> Result<()> {
    let (owner, prop) = resolve_owner(target, path)?;
    if owner.is_null() {
        return Ok(());
    }
    let strategy = strategy_for(owner.type_name(), &prop, global_types())?;
    if let MutationStrategy::Dedicated {
        remove: Some(remove),
        ..
    } = strategy.as_ref()
    {
        invoke_on(&owner, remove, value)?;
        return Ok(());
    }
    let current = read_property(&owner, &prop)?;
    if current.is_null() {
        return Ok(());
    }
    if let Value::Sequence(seq) = &current
        && !seq.is_fixed()
    {
        seq.remove_first(&value);
        return Ok(());
    }
    // generic path: rebuild without the first equal element
    let list = list_strategy_for(&current)?;
    let Some(drop_at) = list.index_of(&current, &value)? else {
        return Ok(());
    };
    let rebuilt = list.mutable_instance()?;
    for (i, el) in list.to_vec(&current)?.into_iter().enumerate() {
        if i != drop_at {
            list.add_element(&rebuilt, el)?;
        }
    }
    write_property(&owner, &prop, rebuilt)
}

fn resolve_owner(target: &Value, path: &str) -> Result<(Value, String)> {
    match path.rsplit_once('.') {
        None => Ok((target.clone(), path.to_string())),
        Some((owner_path, prop)) => {
            let owner = FieldPath::shared(owner_path)?.get(target)?;
            Ok((owner, prop.to_string()))
        }
    }
}

fn strategy_for(
    type_name: &str,
    prop: &str,
    provider: &dyn TypeMetadataProvider,
) -> Result<Arc<MutationStrategy>> {
    let key = (type_name.to_string(), prop.to_string());
    if let Some(hit) = STRATEGY_CACHE.get(&key) {
        return Ok(hit.value().clone());
    }

    let add_name = format!("add_to_{prop}");
    let remove_name = format!("remove_from_{prop}");
    let mut add = None;
    let mut remove = None;
    for class in provider.ancestry(type_name) {
        for method in class.methods.iter().rev() {
            if method.params.len() != 1 {
                continue;
            }
            if add.is_none() && method.name == add_name {
                add = Some(method.clone());
            }
            if remove.is_none() && method.name == remove_name {
                remove = Some(method.clone());
            }
        }
    }

    let strategy = if let Some(add) = add {
        MutationStrategy::Dedicated { add, remove }
    } else {
        // the fallback needs a property whose declared type introspection
        // knows; otherwise the relationship is misconfigured
        let infos = FieldInfoCollection::populate(type_name, false, false, provider);
        if infos
            .get(prop)
            .and_then(|info| info.declared_type.as_ref())
            .is_none()
        {
            return Err(FieldPathError::Configuration {
                type_name: type_name.to_string(),
                property: prop.to_string(),
            });
        }
        MutationStrategy::Collection
    };

    let published = STRATEGY_CACHE
        .entry(key)
        .or_insert(Arc::new(strategy))
        .value()
        .clone();
    Ok(published)
}

fn invoke_on(owner: &Value, method: &MethodDef, value: Value) -> Result<()> {
    let Value::Object(handle) = owner else {
        return Err(FieldPathError::Type {
            message: format!(
                "relationship method {} applied to non-object {}",
                method.name,
                owner.type_name()
            ),
        });
    };
    handle.with_mut(|any| (method.invoke)(any, &[value]))?;
    Ok(())
}

fn read_property(owner: &Value, prop: &str) -> Result<Value> {
    let env = AccessEnv::standard();
    env.resolver
        .accessor(owner.type_name(), prop, Direction::Getter, env.provider, None)
        .get(owner)
}

fn write_property(owner: &Value, prop: &str, value: Value) -> Result<()> {
    let env = AccessEnv::standard();
    env.resolver
        .accessor(owner.type_name(), prop, Direction::Setter, env.provider, None)
        .set(owner, value)
}

fn get_or_create_collection(owner: &Value, prop: &str) -> Result<Value> {
    let current = read_property(owner, prop)?;
    if !current.is_null() {
        return Ok(current);
    }
    let fresh = Value::Sequence(Sequence::new());
    write_property(owner, prop, fresh.clone())?;
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassBuilder, ObjectHandle, ParamSpec, register_class};

    struct Team {
        members: Value,
        roster_log: Vec<String>,
    }

    fn register_team() {
        register_class(
            ClassBuilder::new("RelTeam")
                .field::<Team, _, _>(
                    "members",
                    "Set",
                    |t| t.members.clone(),
                    |t, v| {
                        t.members = v;
                        Ok(())
                    },
                )
                .method::<Team, _>("add_to_log", &[ParamSpec::Text], |t, args| {
                    if let Some(Value::Str(s)) = args.first() {
                        t.roster_log.push(s.clone());
                    }
                    Ok(Value::Null)
                })
                .build(),
        );
    }

    fn team() -> Value {
        register_team();
        Value::Object(ObjectHandle::new(
            "RelTeam",
            Team {
                members: Value::Null,
                roster_log: Vec::new(),
            },
        ))
    }

    #[test]
    fn add_creates_collection_lazily_and_deduplicates() {
        let t = team();
        add_to_field(&t, "members", Value::Str("ada".into())).unwrap();
        add_to_field(&t, "members", Value::Str("ada".into())).unwrap();
        add_to_field(&t, "members", Value::Str("bob".into())).unwrap();
        let members = read_property(&t, "members").unwrap();
        let list = list_strategy_for(&members).unwrap();
        assert_eq!(list.size(&members).unwrap(), 2);
    }

    #[test]
    fn dedicated_method_wins_over_fallback() {
        let t = team();
        add_to_field(&t, "log", Value::Str("joined".into())).unwrap();
        let Value::Object(handle) = &t else { unreachable!() };
        let count = handle
            .with_downcast_ref::<Team, _>(|team| team.roster_log.len())
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn remove_drops_first_equal_element() {
        let t = team();
        add_to_field(&t, "members", Value::Str("ada".into())).unwrap();
        add_to_field(&t, "members", Value::Str("bob".into())).unwrap();
        remove_from_field(&t, "members", Value::Str("ada".into())).unwrap();
        let members = read_property(&t, "members").unwrap();
        let list = list_strategy_for(&members).unwrap();
        assert_eq!(list.size(&members).unwrap(), 1);
        assert_eq!(
            list.first_element(&members).unwrap(),
            Value::Str("bob".into())
        );
    }

    #[test]
    fn unknown_property_is_a_configuration_error() {
        let t = team();
        let err = add_to_field(&t, "nowhere", Value::Int(1)).unwrap_err();
        assert!(matches!(err, FieldPathError::Configuration { .. }));
    }
}

//! Field introspection and enumeration
//!
//! Aggregates what a type exposes as fields: declared members plus
//! getter/setter-shaped methods, walked from the root ancestor down to the
//! most-derived class so rank reflects declaration order root-to-leaf.
//! Later registrations for a name augment the existing record, never
//! replace it.

use indexmap::IndexMap;

use crate::model::{FieldDef, MethodDef, TypeMetadataProvider};

/// Handle to the declaration backing one side of a field record
#[derive(Clone)]
pub enum MemberSource {
    /// Backed by a declared member
    Field(FieldDef),
    /// Backed by a getter/setter-shaped method
    Method(MethodDef),
}

/// Aggregated record for one field of a type
#[derive(Clone)]
pub struct FieldInfo {
    /// Path-facing field name (leading underscore stripped)
    pub name: String,
    /// Declared type name, when any contributing declaration knew it
    pub declared_type: Option<String>,
    /// Whether any contributing declaration is public
    pub is_public: bool,
    /// Whether the field can be read
    pub readable: bool,
    /// Whether the field can be written
    pub writable: bool,
    /// Declaration rank: superclass members before subclass members,
    /// declaration order within a class
    pub rank: usize,
    /// Reader declaration, when readable
    pub getter: Option<MemberSource>,
    /// Writer declaration, when writable
    pub setter: Option<MemberSource>,
}

/// All field records for one type, plus the enumeration policy flags
pub struct FieldInfoCollection {
    type_name: String,
    include_non_public: bool,
    include_plain_getters: bool,
    fields: IndexMap<String, FieldInfo>,
}

impl FieldInfoCollection {
    /// Enumerate the fields of `type_name`.
    ///
    /// `include_non_public` admits non-public declared members;
    /// `include_plain_getters` counts zero-arg methods without a `get_`
    /// prefix as getters for a field of the same name.
    pub fn populate(
        type_name: &str,
        include_non_public: bool,
        include_plain_getters: bool,
        provider: &dyn TypeMetadataProvider,
    ) -> Self {
        let mut collection = Self {
            type_name: type_name.to_string(),
            include_non_public,
            include_plain_getters,
            fields: IndexMap::new(),
        };
        // root first, so ancestor declarations take the low ranks
        let mut chain = provider.ancestry(type_name);
        chain.reverse();
        for class in &chain {
            for def in &class.fields {
                collection.register_field(def);
            }
            for method in &class.methods {
                collection.register_method(method);
            }
        }
        collection
    }

    fn register_field(&mut self, def: &FieldDef) {
        if !def.public && !self.include_non_public {
            return;
        }
        let name = def.name.strip_prefix('_').unwrap_or(&def.name).to_string();
        let readable = def.getter.is_some();
        let writable = def.setter.is_some();
        let entry = self.entry(&name);
        entry.is_public |= def.public;
        entry.readable |= readable;
        entry.writable |= writable;
        if entry.declared_type.is_none() {
            entry.declared_type = def.declared_type.clone();
        }
        if readable && entry.getter.is_none() {
            entry.getter = Some(MemberSource::Field(def.clone()));
        }
        if writable && entry.setter.is_none() {
            entry.setter = Some(MemberSource::Field(def.clone()));
        }
    }

    fn register_method(&mut self, method: &MethodDef) {
        if method.params.is_empty() {
            let name = match method.name.strip_prefix("get_") {
                Some(stripped) => stripped.to_string(),
                None if self.include_plain_getters => method.name.clone(),
                None => return,
            };
            if name.is_empty() {
                return;
            }
            let entry = self.entry(&name);
            entry.is_public = true;
            entry.readable = true;
            if entry.getter.is_none() {
                entry.getter = Some(MemberSource::Method(method.clone()));
            }
        } else if method.params.len() == 1
            && let Some(name) = method.name.strip_prefix("set_")
            && !name.is_empty()
        {
            let name = name.to_string();
            let entry = self.entry(&name);
            entry.is_public = true;
            entry.writable = true;
            if entry.setter.is_none() {
                entry.setter = Some(MemberSource::Method(method.clone()));
            }
        }
    }

    fn entry(&mut self, name: &str) -> &mut FieldInfo {
        let rank = self.fields.len();
        self.fields
            .entry(name.to_string())
            .or_insert_with(|| FieldInfo {
                name: name.to_string(),
                declared_type: None,
                is_public: false,
                readable: false,
                writable: false,
                rank,
                getter: None,
                setter: None,
            })
    }

    /// The type these records describe
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Record for one field name
    pub fn get(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.get(name)
    }

    /// Records in rank order
    pub fn iter(&self) -> impl Iterator<Item = &FieldInfo> {
        self.fields.values()
    }

    /// Number of enumerated fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the type exposes no fields under the current policy
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassBuilder, ParamSpec, TypeRegistry, Value};

    struct Acct;

    fn registry() -> TypeRegistry {
        let reg = TypeRegistry::new();
        reg.register(
            ClassBuilder::new("Account")
                .readonly_field::<Acct, _>("id", "Long", |_| Value::Long(1))
                .internal_field::<Acct, _, _>(
                    "_secret",
                    "String",
                    |_| Value::Str("s".into()),
                    |_, _| Ok(()),
                )
                .method::<Acct, _>("get_balance", &[], |_, _| Ok(Value::Long(0)))
                .method::<Acct, _>("set_balance", &[ParamSpec::Numeric], |_, _| Ok(Value::Null))
                .method::<Acct, _>("frozen", &[], |_, _| Ok(Value::Bool(false)))
                .build(),
        );
        reg.register(
            ClassBuilder::new("Savings")
                .parent("Account")
                .readonly_field::<Acct, _>("rate", "Double", |_| Value::Double(0.02))
                .build(),
        );
        reg
    }

    #[test]
    fn ranks_run_root_to_leaf() {
        let reg = registry();
        let infos = FieldInfoCollection::populate("Savings", false, false, &reg);
        let id = infos.get("id").unwrap();
        let rate = infos.get("rate").unwrap();
        assert!(id.rank < rate.rank);
    }

    #[test]
    fn getter_and_setter_methods_merge_into_one_record() {
        let reg = registry();
        let infos = FieldInfoCollection::populate("Account", false, false, &reg);
        let balance = infos.get("balance").unwrap();
        assert!(balance.readable);
        assert!(balance.writable);
        assert!(matches!(balance.getter, Some(MemberSource::Method(_))));
    }

    #[test]
    fn policy_flags_gate_members() {
        let reg = registry();
        let strict = FieldInfoCollection::populate("Account", false, false, &reg);
        assert!(strict.get("secret").is_none());
        assert!(strict.get("frozen").is_none());

        let loose = FieldInfoCollection::populate("Account", true, true, &reg);
        assert!(loose.get("secret").is_some());
        assert!(loose.get("frozen").is_some());
    }
}

//! Class-extension registry
//!
//! A class extension is a strategy object registered against a type name to
//! supply behavior the type itself does not implement (property access,
//! sequence access). Lookup dispatches on the runtime type of the object
//! actually encountered, falling back through the registered hierarchy, and
//! memoizes the winner per concrete type.
//!
//! Resolution order for a type `T`:
//!
//! 1. an exact-type cache hit;
//! 2. `T` itself, then each class in `T`'s parent chain — class entries
//!    (own or ancestor) always beat interface entries;
//! 3. the interfaces declared along the chain, most-derived class first;
//!    among one class's interfaces the most recently registered eligible
//!    entry wins (an implementation-defined tie-break, stable on replay
//!    because it consults the registration journal, not map iteration);
//!    super-interfaces follow their declaring interface;
//! 4. the universal root entry, registered for `"Any"`.
//!
//! The first resolution for a new concrete type walks the hierarchy and
//! publishes the result under the originally requested name; subsequent
//! lookups are O(1) reads that take no lock once the entry exists. The
//! populate-on-miss path is synchronized per key, so two threads racing on
//! the same fresh type cannot install different strategies.

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::model::TypeMetadataProvider;

/// Name of the universal root entry every complete registry carries
pub const ROOT_TYPE: &str = "Any";

/// Registry mapping runtime type names to a best-match strategy
///
/// `S` is the strategy handle, cloned out on every hit — typically an
/// `Arc<dyn Trait>`, but any cloneable prototype works, including stateful
/// strategies cloned per type family.
pub struct ClassExtensionRegistry<S: Clone> {
    name: &'static str,
    entries: DashMap<String, S>,
    journal: Mutex<Vec<String>>,
    cache: DashMap<String, S>,
}

impl<S: Clone> ClassExtensionRegistry<S> {
    /// Create an empty registry; `name` labels log output
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            journal: Mutex::new(Vec::new()),
            cache: DashMap::new(),
        }
    }

    /// Register a strategy for a type name.
    ///
    /// Invalidates the memo cache: a direct registration must win over any
    /// previously cached ancestor/interface fallback for the same type.
    pub fn register(&self, type_name: &str, strategy: S) {
        log::debug!("{}: registering extension for {type_name}", self.name);
        self.entries.insert(type_name.to_string(), strategy);
        self.journal.lock().push(type_name.to_string());
        self.cache.clear();
    }

    /// Whether an entry is registered for exactly this name
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    /// Resolve the best-match strategy for a runtime type.
    ///
    /// Returns `None` only when nothing along the hierarchy matches and no
    /// root entry exists. The result is cached per exact type name.
    pub fn lookup(&self, type_name: &str, provider: &dyn TypeMetadataProvider) -> Option<S> {
        if let Some(hit) = self.cache.get(type_name) {
            return Some(hit.value().clone());
        }
        let resolved = self.resolve(type_name, provider)?;
        // entry() serializes racing populators for the same key; the first
        // published strategy wins and later racers adopt it
        let published = self
            .cache
            .entry(type_name.to_string())
            .or_insert(resolved)
            .value()
            .clone();
        Some(published)
    }

    /// Resolve with an optional override registry consulted first.
    ///
    /// Overrides are threaded explicitly (usually from an evaluation
    /// context) rather than held in ambient thread-local state; dropping
    /// the override restores global-only behavior.
    pub fn lookup_with_overrides(
        &self,
        type_name: &str,
        provider: &dyn TypeMetadataProvider,
        overrides: Option<&ClassExtensionRegistry<S>>,
    ) -> Option<S> {
        if let Some(shadow) = overrides
            && let Some(hit) = shadow.lookup(type_name, provider)
        {
            return Some(hit);
        }
        self.lookup(type_name, provider)
    }

    fn resolve(&self, type_name: &str, provider: &dyn TypeMetadataProvider) -> Option<S> {
        for candidate in self.resolution_order(type_name, provider) {
            if let Some(entry) = self.entries.get(&candidate) {
                if candidate != type_name {
                    log::trace!(
                        "{}: {type_name} resolved via {candidate}",
                        self.name
                    );
                }
                return Some(entry.value().clone());
            }
        }
        None
    }

    /// Candidate names in precedence order: the class chain, then the
    /// interfaces along it, then the universal root.
    fn resolution_order(
        &self,
        type_name: &str,
        provider: &dyn TypeMetadataProvider,
    ) -> Vec<String> {
        let mut order: Vec<String> = vec![type_name.to_string()];
        let chain = provider.ancestry(type_name);

        for class in &chain {
            if !order.iter().any(|n| n == &class.name) {
                order.push(class.name.clone());
            }
        }

        let journal = self.journal.lock();
        let recency = |name: &str| journal.iter().rposition(|n| n == name);
        for class in &chain {
            let mut directs = class.traits.clone();
            // most recently registered eligible interface first
            directs.sort_by_key(|n| std::cmp::Reverse(recency(n)));
            for iface in directs {
                Self::push_interface(&mut order, &iface, provider);
            }
        }
        drop(journal);

        if !order.iter().any(|n| n == ROOT_TYPE) {
            order.push(ROOT_TYPE.to_string());
        }
        order
    }

    fn push_interface(order: &mut Vec<String>, iface: &str, provider: &dyn TypeMetadataProvider) {
        if order.iter().any(|n| n == iface) {
            return;
        }
        order.push(iface.to_string());
        if let Some(info) = provider.class_info(iface) {
            for parent_iface in &info.traits {
                Self::push_interface(order, parent_iface, provider);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassBuilder, TypeRegistry};

    fn hierarchy() -> TypeRegistry {
        let reg = TypeRegistry::new();
        reg.register(ClassBuilder::new("Base").build());
        reg.register(
            ClassBuilder::new("Leaf")
                .parent("Base")
                .implements("Marked")
                .build(),
        );
        reg
    }

    #[test]
    fn exact_registration_wins() {
        let types = hierarchy();
        let ext: ClassExtensionRegistry<&'static str> = ClassExtensionRegistry::new("test");
        ext.register("Base", "base");
        ext.register("Leaf", "leaf");
        assert_eq!(ext.lookup("Leaf", &types), Some("leaf"));
    }

    #[test]
    fn ancestor_class_beats_interface() {
        let types = hierarchy();
        let ext: ClassExtensionRegistry<&'static str> = ClassExtensionRegistry::new("test");
        ext.register("Marked", "iface");
        ext.register("Base", "base");
        assert_eq!(ext.lookup("Leaf", &types), Some("base"));
    }

    #[test]
    fn interface_fallback_applies_when_no_class_matches() {
        let types = hierarchy();
        let ext: ClassExtensionRegistry<&'static str> = ClassExtensionRegistry::new("test");
        ext.register("Marked", "iface");
        assert_eq!(ext.lookup("Leaf", &types), Some("iface"));
    }

    #[test]
    fn direct_registration_overrides_cached_fallback() {
        let types = hierarchy();
        let ext: ClassExtensionRegistry<&'static str> = ClassExtensionRegistry::new("test");
        ext.register("Marked", "iface");
        assert_eq!(ext.lookup("Leaf", &types), Some("iface"));
        ext.register("Leaf", "leaf");
        assert_eq!(ext.lookup("Leaf", &types), Some("leaf"));
    }

    #[test]
    fn recent_interface_registration_wins_tiebreak() {
        let types = TypeRegistry::new();
        types.register(
            ClassBuilder::new("Multi")
                .implements("A")
                .implements("B")
                .build(),
        );
        let ext: ClassExtensionRegistry<&'static str> = ClassExtensionRegistry::new("test");
        ext.register("A", "a");
        ext.register("B", "b");
        assert_eq!(ext.lookup("Multi", &types), Some("b"));
    }

    #[test]
    fn root_entry_catches_unregistered_types() {
        let types = TypeRegistry::new();
        let ext: ClassExtensionRegistry<&'static str> = ClassExtensionRegistry::new("test");
        assert_eq!(ext.lookup("Unknown", &types), None);
        ext.register(ROOT_TYPE, "root");
        assert_eq!(ext.lookup("Unknown", &types), Some("root"));
    }

    #[test]
    fn overrides_shadow_global_entries() {
        let types = hierarchy();
        let ext: ClassExtensionRegistry<&'static str> = ClassExtensionRegistry::new("global");
        ext.register("Leaf", "global");
        let shadow: ClassExtensionRegistry<&'static str> = ClassExtensionRegistry::new("shadow");
        shadow.register("Leaf", "override");
        assert_eq!(
            ext.lookup_with_overrides("Leaf", &types, Some(&shadow)),
            Some("override")
        );
        assert_eq!(ext.lookup_with_overrides("Leaf", &types, None), Some("global"));
    }
}

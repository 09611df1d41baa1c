//! Accessor strategies for single-segment field access
//!
//! An accessor is a strategy bound to one (type, field) pair implementing
//! get and/or set. Construction walks four tiers in precedence order:
//! getter/setter method pair, class-extension helper, direct member, then
//! the extensible dynamic bag. Results — including the not-found sentinel
//! remembering negative lookups — are cached per (type, field, direction).

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::error::{FieldPathError, Result};
use crate::extension::ClassExtensionRegistry;
use crate::model::{
    ExtensibleHooks, FieldDef, MethodDef, ObjectHandle, PropertyBag, TypeMetadataProvider, Value,
    global_types,
};

/// Which way an accessor is being resolved
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Resolving a reader
    Getter,
    /// Resolving a writer
    Setter,
}

impl Direction {
    fn access_word(self) -> &'static str {
        match self {
            Direction::Getter => "gettable",
            Direction::Setter => "settable",
        }
    }
}

/// Strategy reading and/or writing one named segment on a target
///
/// `applies_to` is the cache-validity predicate: a cached accessor is only
/// trusted while it holds for the object actually at hand. The default is
/// an exact type-name match; strategies over metadata-driven targets may
/// refine it per instance.
pub trait FieldAccessor: Send + Sync {
    /// The type this accessor was resolved against
    fn target_type(&self) -> &str;

    /// The field segment this accessor serves
    fn field_name(&self) -> &str;

    /// Whether this accessor may be reused for `target`
    fn applies_to(&self, target: &Value) -> bool {
        target.type_name() == self.target_type()
    }

    /// Read the segment
    fn get(&self, target: &Value) -> Result<Value>;

    /// Write the segment
    fn set(&self, target: &Value, value: Value) -> Result<()>;
}

/// Property-access helper registered as a class extension
///
/// Helpers serve targets whose accessors live outside the target's own
/// type: the helper receives the target as an explicit first argument.
/// Map-style access is the built-in instance of this tier.
pub trait PropertyExtension: Send + Sync {
    /// Read `name` off `target`
    fn get_property(&self, target: &Value, name: &str) -> Result<Value>;

    /// Write `name` on `target`
    fn set_property(&self, target: &Value, name: &str, value: Value) -> Result<()>;

    /// Per-instance applicability refinement; defaults to serving any name
    fn has_property(&self, _target: &Value, _name: &str) -> bool {
        true
    }
}

/// Policy deciding which declared members resolution may use
pub trait MemberAccessPolicy: Send + Sync {
    /// Whether the member may be read
    fn allows_read(&self, field: &FieldDef) -> bool;

    /// Whether the member may be written
    fn allows_write(&self, field: &FieldDef) -> bool;
}

/// Default policy: public members only
pub struct PublicMembersOnly;

impl MemberAccessPolicy for PublicMembersOnly {
    fn allows_read(&self, field: &FieldDef) -> bool {
        field.public
    }

    fn allows_write(&self, field: &FieldDef) -> bool {
        field.public
    }
}

/// Everything accessor resolution needs, threaded explicitly
///
/// Bundles the resolver (with its cache and member policy), the metadata
/// provider, and the optional property-extension override registry an
/// evaluation context may carry.
#[derive(Clone, Copy)]
pub struct AccessEnv<'a> {
    /// Resolver holding the accessor cache and member-access policy
    pub resolver: &'a AccessorResolver,
    /// Type metadata source
    pub provider: &'a dyn TypeMetadataProvider,
    /// Override extensions consulted before the global registry
    pub overrides: Option<&'a ClassExtensionRegistry<Arc<dyn PropertyExtension>>>,
}

impl AccessEnv<'static> {
    /// The default environment: global resolver, global types, no overrides
    pub fn standard() -> Self {
        AccessEnv {
            resolver: default_resolver(),
            provider: global_types(),
            overrides: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

struct MethodPairAccessor {
    target_type: String,
    field: String,
    getter: Option<MethodDef>,
    setter: Option<MethodDef>,
}

impl MethodPairAccessor {
    fn handle<'v>(&self, target: &'v Value) -> Result<&'v ObjectHandle> {
        match target {
            Value::Object(h) => Ok(h),
            other => Err(FieldPathError::Type {
                message: format!(
                    "method accessor for {} applied to non-object {}",
                    self.target_type,
                    other.type_name()
                ),
            }),
        }
    }
}

impl FieldAccessor for MethodPairAccessor {
    fn target_type(&self) -> &str {
        &self.target_type
    }

    fn field_name(&self) -> &str {
        &self.field
    }

    fn get(&self, target: &Value) -> Result<Value> {
        let method = self
            .getter
            .as_ref()
            .ok_or_else(|| FieldPathError::no_getter(&self.field, &self.target_type))?;
        let handle = self.handle(target)?;
        handle.with_mut(|any| (method.invoke)(any, &[]))
    }

    fn set(&self, target: &Value, value: Value) -> Result<()> {
        let method = self
            .setter
            .as_ref()
            .ok_or_else(|| FieldPathError::no_setter(&self.field, &self.target_type))?;
        let handle = self.handle(target)?;
        handle.with_mut(|any| (method.invoke)(any, &[value]))?;
        Ok(())
    }
}

struct ExtensionAccessor {
    target_type: String,
    field: String,
    helper: Arc<dyn PropertyExtension>,
}

impl FieldAccessor for ExtensionAccessor {
    fn target_type(&self) -> &str {
        &self.target_type
    }

    fn field_name(&self) -> &str {
        &self.field
    }

    fn applies_to(&self, target: &Value) -> bool {
        target.type_name() == self.target_type && self.helper.has_property(target, &self.field)
    }

    fn get(&self, target: &Value) -> Result<Value> {
        self.helper.get_property(target, &self.field)
    }

    fn set(&self, target: &Value, value: Value) -> Result<()> {
        self.helper.set_property(target, &self.field, value)
    }
}

struct MemberAccessor {
    target_type: String,
    field: String,
    def: FieldDef,
}

impl MemberAccessor {
    fn handle<'v>(&self, target: &'v Value) -> Result<&'v ObjectHandle> {
        match target {
            Value::Object(h) => Ok(h),
            other => Err(FieldPathError::Type {
                message: format!(
                    "member accessor for {} applied to non-object {}",
                    self.target_type,
                    other.type_name()
                ),
            }),
        }
    }
}

impl FieldAccessor for MemberAccessor {
    fn target_type(&self) -> &str {
        &self.target_type
    }

    fn field_name(&self) -> &str {
        &self.field
    }

    fn get(&self, target: &Value) -> Result<Value> {
        let getter = self
            .def
            .getter
            .as_ref()
            .ok_or_else(|| FieldPathError::no_getter(&self.field, &self.target_type))?;
        self.handle(target)?.with_ref(|any| getter(any))
    }

    fn set(&self, target: &Value, value: Value) -> Result<()> {
        let setter = self
            .def
            .setter
            .as_ref()
            .ok_or_else(|| FieldPathError::no_setter(&self.field, &self.target_type))?;
        self.handle(target)?.with_mut(|any| setter(any, value))
    }
}

struct BagAccessor {
    target_type: String,
    field: String,
    hooks: ExtensibleHooks,
}

impl FieldAccessor for BagAccessor {
    fn target_type(&self) -> &str {
        &self.target_type
    }

    fn field_name(&self) -> &str {
        &self.field
    }

    fn get(&self, target: &Value) -> Result<Value> {
        let Value::Object(handle) = target else {
            return Err(FieldPathError::no_getter(&self.field, target.type_name()));
        };
        // absent key is a resolution failure; a present null reads as Null
        match handle.with_ref(|any| (self.hooks.get)(any, &self.field)) {
            Some(value) => Ok(value),
            None => Err(FieldPathError::no_getter(&self.field, &self.target_type)),
        }
    }

    fn set(&self, target: &Value, value: Value) -> Result<()> {
        let Value::Object(handle) = target else {
            return Err(FieldPathError::no_setter(&self.field, target.type_name()));
        };
        handle.with_mut(|any| (self.hooks.set)(any, &self.field, value))
    }
}

struct NotFoundAccessor {
    target_type: String,
    field: String,
}

impl FieldAccessor for NotFoundAccessor {
    fn target_type(&self) -> &str {
        &self.target_type
    }

    fn field_name(&self) -> &str {
        &self.field
    }

    fn get(&self, _target: &Value) -> Result<Value> {
        Err(FieldPathError::no_getter(&self.field, &self.target_type))
    }

    fn set(&self, _target: &Value, _value: Value) -> Result<()> {
        Err(FieldPathError::no_setter(&self.field, &self.target_type))
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolver constructing and caching accessors per (type, field, direction)
///
/// Negative results are cached as a sentinel accessor so repeated failed
/// lookups do not re-walk every tier; the sentinel stays until a new
/// registration clears the cache through the registry layer.
pub struct AccessorResolver {
    policy: Arc<dyn MemberAccessPolicy>,
    cache: DashMap<(String, String, Direction), Arc<dyn FieldAccessor>>,
}

impl AccessorResolver {
    /// Create a resolver with the default public-members-only policy
    pub fn new() -> Self {
        Self::with_policy(Arc::new(PublicMembersOnly))
    }

    /// Create a resolver with a custom member-access policy
    pub fn with_policy(policy: Arc<dyn MemberAccessPolicy>) -> Self {
        Self {
            policy,
            cache: DashMap::new(),
        }
    }

    /// Resolve the accessor for one segment on one runtime type.
    ///
    /// Always returns an accessor; unresolvable pairs yield the cached
    /// not-found sentinel whose get/set raise the resolution error.
    pub fn accessor(
        &self,
        type_name: &str,
        field: &str,
        direction: Direction,
        provider: &dyn TypeMetadataProvider,
        overrides: Option<&ClassExtensionRegistry<Arc<dyn PropertyExtension>>>,
    ) -> Arc<dyn FieldAccessor> {
        if overrides.is_some() {
            // overridden lookups bypass the shared cache entirely
            return self.construct(type_name, field, direction, provider, overrides);
        }
        let key = (type_name.to_string(), field.to_string(), direction);
        if let Some(hit) = self.cache.get(&key) {
            return hit.value().clone();
        }
        let built = self.construct(type_name, field, direction, provider, None);
        self.cache.entry(key).or_insert(built).value().clone()
    }

    /// Drop every cached accessor (used after metadata re-registration)
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn construct(
        &self,
        type_name: &str,
        field: &str,
        direction: Direction,
        provider: &dyn TypeMetadataProvider,
        overrides: Option<&ClassExtensionRegistry<Arc<dyn PropertyExtension>>>,
    ) -> Arc<dyn FieldAccessor> {
        let ancestry = provider.ancestry(type_name);

        // tier 1: getter/setter method pair, most-derived declaration first
        for class in &ancestry {
            for method in class.methods.iter().rev() {
                let hit = match direction {
                    Direction::Getter => method.is_getter_for(field),
                    Direction::Setter => method.is_setter_for(field),
                };
                if hit {
                    log::trace!("accessor {type_name}.{field}: method pair via {}", class.name);
                    return Arc::new(MethodPairAccessor {
                        target_type: type_name.to_string(),
                        field: field.to_string(),
                        getter: matches!(direction, Direction::Getter).then(|| method.clone()),
                        setter: matches!(direction, Direction::Setter).then(|| method.clone()),
                    });
                }
            }
        }

        // tier 2: class-extension-mediated helper
        if let Some(helper) =
            property_extensions().lookup_with_overrides(type_name, provider, overrides)
        {
            log::trace!("accessor {type_name}.{field}: class extension");
            return Arc::new(ExtensionAccessor {
                target_type: type_name.to_string(),
                field: field.to_string(),
                helper,
            });
        }

        // tier 3: direct member, literal or underscore-stripped
        for class in &ancestry {
            for def in class.fields.iter().rev() {
                if !def.serves(field) {
                    continue;
                }
                let allowed = match direction {
                    Direction::Getter => self.policy.allows_read(def) && def.getter.is_some(),
                    Direction::Setter => self.policy.allows_write(def) && def.setter.is_some(),
                };
                if allowed {
                    log::trace!("accessor {type_name}.{field}: member via {}", class.name);
                    return Arc::new(MemberAccessor {
                        target_type: type_name.to_string(),
                        field: field.to_string(),
                        def: def.clone(),
                    });
                }
            }
        }

        // tier 4: extensible dynamic bag
        for class in &ancestry {
            if let Some(hooks) = &class.extensible {
                log::trace!("accessor {type_name}.{field}: extensible bag via {}", class.name);
                return Arc::new(BagAccessor {
                    target_type: type_name.to_string(),
                    field: field.to_string(),
                    hooks: hooks.clone(),
                });
            }
        }

        log::trace!(
            "accessor {type_name}.{field}: no {} strategy",
            direction.access_word()
        );
        Arc::new(NotFoundAccessor {
            target_type: type_name.to_string(),
            field: field.to_string(),
        })
    }
}

impl Default for AccessorResolver {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_RESOLVER: Lazy<Arc<AccessorResolver>> =
    Lazy::new(|| Arc::new(AccessorResolver::new()));

/// The process-wide accessor resolver with the default policy
pub fn default_resolver() -> &'static AccessorResolver {
    &DEFAULT_RESOLVER
}

/// Shared handle to the process-wide resolver (for contexts that keep it)
pub(crate) fn default_resolver_arc() -> Arc<AccessorResolver> {
    DEFAULT_RESOLVER.clone()
}

// ---------------------------------------------------------------------------
// Built-in property extensions
// ---------------------------------------------------------------------------

struct PropertyBagExtension;

impl PropertyExtension for PropertyBagExtension {
    fn get_property(&self, target: &Value, name: &str) -> Result<Value> {
        let Value::Object(handle) = target else {
            return Err(FieldPathError::no_getter(name, target.type_name()));
        };
        // map tolerance: an absent key reads as Null
        let found = handle
            .with_downcast_ref::<PropertyBag, _>(|bag| bag.get(name))
            .ok_or_else(|| FieldPathError::Type {
                message: format!("{} handle does not hold a bag", PropertyBag::TYPE_NAME),
            })?;
        Ok(found.unwrap_or(Value::Null))
    }

    fn set_property(&self, target: &Value, name: &str, value: Value) -> Result<()> {
        let Value::Object(handle) = target else {
            return Err(FieldPathError::no_setter(name, target.type_name()));
        };
        handle
            .with_downcast_mut::<PropertyBag, _>(|bag| bag.put(name, value))
            .ok_or_else(|| FieldPathError::Type {
                message: format!("{} handle does not hold a bag", PropertyBag::TYPE_NAME),
            })
    }
}

static PROPERTY_EXTENSIONS: Lazy<ClassExtensionRegistry<Arc<dyn PropertyExtension>>> =
    Lazy::new(|| {
        let registry = ClassExtensionRegistry::new("property-extensions");
        registry.register(
            PropertyBag::TYPE_NAME,
            Arc::new(PropertyBagExtension) as Arc<dyn PropertyExtension>,
        );
        registry
    });

/// The process-wide property-extension registry (extension point for
/// property-access behavior on types that do not declare members)
pub fn property_extensions() -> &'static ClassExtensionRegistry<Arc<dyn PropertyExtension>> {
    &PROPERTY_EXTENSIONS
}

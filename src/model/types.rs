//! Type metadata registration tables
//!
//! Rust has no runtime reflection, so application types participate through
//! a registration table: a [`ClassInfo`] per type carrying field accessors,
//! methods, the declared hierarchy, and optional capabilities. The table is
//! the pluggable type-metadata provider the expression layer dispatches
//! method calls against.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::Any;
use std::sync::Arc;

use crate::error::{FieldPathError, Result};

use super::value::Value;

/// Closure reading one member off an erased target
pub type GetterFn = Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;

/// Closure writing one member of an erased target
pub type SetterFn = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;

/// Closure invoking one method on an erased target
pub type MethodFn = Arc<dyn Fn(&mut dyn Any, &[Value]) -> Result<Value> + Send + Sync>;

/// Declared parameter shape, used for overload resolution
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamSpec {
    /// Matches anything, weakest preference
    Any,
    /// Boolean parameter
    Bool,
    /// Integral numeric parameter (byte through big integer)
    Integral,
    /// Any numeric parameter, real widths preferred
    Numeric,
    /// String or character parameter
    Text,
    /// Sequence parameter
    Sequence,
    /// Object parameter of the named type (or a subtype)
    Object(String),
}

/// One declared field of a registered type
#[derive(Clone)]
pub struct FieldDef {
    /// Member name as declared (a leading underscore is stripped when
    /// matched against path segments)
    pub name: String,
    /// Declared type name, when known
    pub declared_type: Option<String>,
    /// Whether the member is public
    pub public: bool,
    /// Reader closure, when the member is readable
    pub getter: Option<GetterFn>,
    /// Writer closure, when the member is writable
    pub setter: Option<SetterFn>,
}

impl FieldDef {
    /// Whether this member serves the given path segment name, either
    /// literally or with a single leading underscore stripped.
    pub fn serves(&self, segment: &str) -> bool {
        self.name == segment || (self.name.strip_prefix('_') == Some(segment))
    }
}

/// One declared method of a registered type
#[derive(Clone)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Declared parameter shapes
    pub params: Vec<ParamSpec>,
    /// Invocation closure
    pub invoke: MethodFn,
}

impl MethodDef {
    /// Whether this is a getter-shaped method for `segment`: zero
    /// parameters, named either exactly `segment` or `get_<segment>`.
    pub fn is_getter_for(&self, segment: &str) -> bool {
        self.params.is_empty()
            && (self.name == segment || self.name.strip_prefix("get_") == Some(segment))
    }

    /// Whether this is a setter-shaped method for `segment`: one
    /// parameter, named `set_<segment>`.
    pub fn is_setter_for(&self, segment: &str) -> bool {
        self.params.len() == 1 && self.name.strip_prefix("set_") == Some(segment)
    }
}

/// Hooks exposing a type's dynamic name→value bag
///
/// A type that registers these participates in the extensible-accessor
/// fallback: names with no declared member resolve against the bag. The
/// getter returns `None` for an absent key, `Some(Null)` for a key that is
/// present with a null value — the two must stay distinguishable.
#[derive(Clone)]
pub struct ExtensibleHooks {
    /// Bag reader
    pub get: Arc<dyn Fn(&dyn Any, &str) -> Option<Value> + Send + Sync>,
    /// Bag writer
    pub set: Arc<dyn Fn(&mut dyn Any, &str, Value) -> Result<()> + Send + Sync>,
}

/// Metadata for one registered type
#[derive(Clone)]
pub struct ClassInfo {
    /// Registered type name
    pub name: String,
    /// Parent type name, when the type extends another
    pub parent: Option<String>,
    /// Implemented interface names, in declaration order
    pub traits: Vec<String>,
    /// Declared fields, in declaration order
    pub fields: Vec<FieldDef>,
    /// Declared methods, in declaration order
    pub methods: Vec<MethodDef>,
    /// Dynamic-bag capability, when the type is extensible
    pub extensible: Option<ExtensibleHooks>,
}

/// Fluent builder for [`ClassInfo`] registration
///
/// The typed helpers erase concrete closures down to `dyn Any` accessors,
/// failing with a type error when a handle carries the wrong payload.
pub struct ClassBuilder {
    info: ClassInfo,
}

fn downcast_err<T>(class: &str) -> FieldPathError {
    FieldPathError::Type {
        message: format!(
            "target registered as {class} does not hold a {}",
            std::any::type_name::<T>()
        ),
    }
}

impl ClassBuilder {
    /// Start building metadata for `name`
    pub fn new(name: &str) -> Self {
        Self {
            info: ClassInfo {
                name: name.to_string(),
                parent: None,
                traits: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
                extensible: None,
            },
        }
    }

    /// Declare the parent type
    pub fn parent(mut self, name: &str) -> Self {
        self.info.parent = Some(name.to_string());
        self
    }

    /// Declare an implemented interface
    pub fn implements(mut self, name: &str) -> Self {
        self.info.traits.push(name.to_string());
        self
    }

    /// Declare a public read/write field
    pub fn field<T, G, S>(self, name: &str, declared: &str, get: G, set: S) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.field_with(name, declared, true, Some(get), Some(set))
    }

    /// Declare a public read-only field
    pub fn readonly_field<T, G>(self, name: &str, declared: &str, get: G) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
    {
        self.field_with::<T, G, fn(&mut T, Value) -> Result<()>>(name, declared, true, Some(get), None)
    }

    /// Declare a non-public read/write field
    pub fn internal_field<T, G, S>(self, name: &str, declared: &str, get: G, set: S) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.field_with(name, declared, false, Some(get), Some(set))
    }

    fn field_with<T, G, S>(
        mut self,
        name: &str,
        declared: &str,
        public: bool,
        get: Option<G>,
        set: Option<S>,
    ) -> Self
    where
        T: Any,
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, Value) -> Result<()> + Send + Sync + 'static,
    {
        let class = self.info.name.clone();
        let getter: Option<GetterFn> = get.map(|g| {
            let class = class.clone();
            Arc::new(move |any: &dyn Any| {
                any.downcast_ref::<T>()
                    .map(&g)
                    .ok_or_else(|| downcast_err::<T>(&class))
            }) as GetterFn
        });
        let setter: Option<SetterFn> = set.map(|s| {
            let class = class.clone();
            Arc::new(move |any: &mut dyn Any, value: Value| match any.downcast_mut::<T>() {
                Some(t) => s(t, value),
                None => Err(downcast_err::<T>(&class)),
            }) as SetterFn
        });
        self.info.fields.push(FieldDef {
            name: name.to_string(),
            declared_type: Some(declared.to_string()),
            public,
            getter,
            setter,
        });
        self
    }

    /// Declare a method
    pub fn method<T, F>(mut self, name: &str, params: &[ParamSpec], f: F) -> Self
    where
        T: Any,
        F: Fn(&mut T, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        let class = self.info.name.clone();
        let invoke: MethodFn = Arc::new(move |any: &mut dyn Any, args: &[Value]| {
            match any.downcast_mut::<T>() {
                Some(t) => f(t, args),
                None => Err(downcast_err::<T>(&class)),
            }
        });
        self.info.methods.push(MethodDef {
            name: name.to_string(),
            params: params.to_vec(),
            invoke,
        });
        self
    }

    /// Declare the dynamic-bag capability
    pub fn extensible<T, G, S>(mut self, get: G, set: S) -> Self
    where
        T: Any,
        G: Fn(&T, &str) -> Option<Value> + Send + Sync + 'static,
        S: Fn(&mut T, &str, Value) -> Result<()> + Send + Sync + 'static,
    {
        let class = self.info.name.clone();
        self.info.extensible = Some(ExtensibleHooks {
            get: Arc::new(move |any: &dyn Any, name: &str| {
                any.downcast_ref::<T>().and_then(|t| get(t, name))
            }),
            set: Arc::new(move |any: &mut dyn Any, name: &str, value: Value| {
                match any.downcast_mut::<T>() {
                    Some(t) => set(t, name, value),
                    None => Err(downcast_err::<T>(&class)),
                }
            }),
        });
        self
    }

    /// Finish building
    pub fn build(self) -> ClassInfo {
        self.info
    }

    /// Finish building and register in the global type registry
    pub fn register(self) {
        register_class(self.info);
    }
}

/// Provider of type metadata for accessor resolution and method dispatch
///
/// The global [`TypeRegistry`] is the default provider; hosts with their
/// own metadata source plug in an alternative through the evaluation
/// context.
pub trait TypeMetadataProvider: Send + Sync {
    /// Metadata for the named type, when registered
    fn class_info(&self, type_name: &str) -> Option<Arc<ClassInfo>>;

    /// The class chain from `type_name` up to its root ancestor,
    /// most-derived first. Unregistered names yield an empty chain.
    fn ancestry(&self, type_name: &str) -> Vec<Arc<ClassInfo>> {
        let mut chain = Vec::new();
        let mut cur = type_name.to_string();
        while let Some(info) = self.class_info(&cur) {
            // guard against accidental cycles in registered parents
            if chain
                .iter()
                .any(|seen: &Arc<ClassInfo>| seen.name == info.name)
            {
                break;
            }
            let parent = info.parent.clone();
            chain.push(info);
            match parent {
                Some(p) => cur = p,
                None => break,
            }
        }
        chain
    }
}

/// Process-wide registry of [`ClassInfo`] records keyed by type name
#[derive(Default)]
pub struct TypeRegistry {
    classes: DashMap<String, Arc<ClassInfo>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) metadata for a type
    pub fn register(&self, info: ClassInfo) {
        log::debug!("registering class metadata for {}", info.name);
        self.classes.insert(info.name.clone(), Arc::new(info));
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether no types are registered
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl TypeMetadataProvider for TypeRegistry {
    fn class_info(&self, type_name: &str) -> Option<Arc<ClassInfo>> {
        self.classes.get(type_name).map(|e| e.value().clone())
    }
}

static GLOBAL_TYPES: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

/// The process-wide type registry
pub fn global_types() -> &'static TypeRegistry {
    &GLOBAL_TYPES
}

/// Register metadata in the process-wide registry
pub fn register_class(info: ClassInfo) {
    global_types().register(info);
}

//! Evaluation context
//!
//! An `ExprContext` carries everything one evaluation needs: the root and
//! current objects, a variable map, the symbol table with ahead-of-time
//! resolutions, optional trace records, and the pluggable strategies
//! (class resolver, type converter, member-access policy, metadata
//! provider, override registries). Contexts are per-evaluation state and
//! must not be shared across overlapping evaluations.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

use crate::extension::ClassExtensionRegistry;
use crate::fieldvalue::{
    AccessEnv, AccessorResolver, MemberAccessPolicy, PropertyExtension, default_resolver_arc,
};
use crate::list::OrderedList;
use crate::model::{ClassInfo, TypeMetadataProvider, Value, global_types};

use super::numeric::convert_primitive;

/// Resolves type names to class metadata (used by casts and static refs)
pub trait ClassResolver: Send + Sync {
    /// Metadata for `name`, when the resolver knows it
    fn resolve_class(&self, name: &str) -> Option<Arc<ClassInfo>>;
}

/// Default class resolver backed by the global type registry
pub struct GlobalClassResolver;

impl ClassResolver for GlobalClassResolver {
    fn resolve_class(&self, name: &str) -> Option<Arc<ClassInfo>> {
        global_types().class_info(name)
    }
}

/// Converts values across declared types for casts and typed writes
pub trait TypeConverter: Send + Sync {
    /// Convert `value` to the named target type.
    ///
    /// `None` means no conversion exists — the cast node renders that as
    /// its silent `Null`, never as an error.
    fn convert(
        &self,
        value: &Value,
        target_type: &str,
        provider: &dyn TypeMetadataProvider,
    ) -> Option<Value>;
}

/// Default converter: primitive numeric conversion, then assignment
/// compatibility (exact type, or an ancestor/interface of an object type)
pub struct DefaultTypeConverter;

impl TypeConverter for DefaultTypeConverter {
    fn convert(
        &self,
        value: &Value,
        target_type: &str,
        provider: &dyn TypeMetadataProvider,
    ) -> Option<Value> {
        if value.type_name() == target_type {
            return Some(value.clone());
        }
        if let Some(converted) = convert_primitive(value, target_type) {
            return Some(converted);
        }
        if let Value::Object(_) = value {
            for class in provider.ancestry(value.type_name()) {
                if class.name == target_type || class.traits.iter().any(|t| t == target_type) {
                    return Some(value.clone());
                }
            }
        }
        None
    }
}

/// Symbol table with references resolved ahead of evaluation
///
/// Property nodes special-case two symbol kinds: a name bound as a context
/// variable reads and writes through the variable map instead of field
/// access, and a `Type.field` pair registered as a static reads its
/// registered value.
#[derive(Default)]
pub struct SymbolTable {
    variables: FxHashSet<String>,
    statics: FxHashMap<String, FxHashMap<String, Value>>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` as a context variable
    pub fn bind_variable(&mut self, name: &str) {
        self.variables.insert(name.to_string());
    }

    /// Whether `name` is bound as a context variable
    pub fn is_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    /// Register a static field value for `type_name.field`
    pub fn register_static(&mut self, type_name: &str, field: &str, value: Value) {
        self.statics
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    /// Resolve a registered static field
    pub fn resolve_static(&self, type_name: &str, field: &str) -> Option<Value> {
        self.statics.get(type_name)?.get(field).cloned()
    }

    /// Whether any statics are registered under `type_name`
    pub fn has_statics_for(&self, type_name: &str) -> bool {
        self.statics.contains_key(type_name)
    }
}

/// One trace record from an evaluation with tracing enabled
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// Description of the node evaluated
    pub node: String,
    /// Runtime type of the source object it was evaluated against
    pub source_type: String,
    /// Rendered result, when the node completed
    pub result: Option<String>,
    /// Nesting depth at the time of evaluation
    pub depth: usize,
}

/// Per-evaluation context
pub struct ExprContext {
    root: Value,
    current: Value,
    variables: FxHashMap<String, Value>,
    symbols: SymbolTable,
    trace_enabled: bool,
    trace: Vec<Evaluation>,
    depth: usize,
    resolver: Arc<AccessorResolver>,
    provider: Option<Arc<dyn TypeMetadataProvider>>,
    class_resolver: Arc<dyn ClassResolver>,
    type_converter: Arc<dyn TypeConverter>,
    property_overrides: Option<Arc<ClassExtensionRegistry<Arc<dyn PropertyExtension>>>>,
    list_overrides: Option<Arc<ClassExtensionRegistry<Arc<dyn OrderedList>>>>,
}

impl ExprContext {
    /// Create a context rooted at `root`
    pub fn new(root: Value) -> Self {
        Self {
            current: root.clone(),
            root,
            variables: FxHashMap::default(),
            symbols: SymbolTable::new(),
            trace_enabled: false,
            trace: Vec::new(),
            depth: 0,
            resolver: default_resolver_arc(),
            provider: None,
            class_resolver: Arc::new(GlobalClassResolver),
            type_converter: Arc::new(DefaultTypeConverter),
            property_overrides: None,
            list_overrides: None,
        }
    }

    /// Replace the member-access policy (rebuilds the accessor resolver)
    pub fn with_access_policy(mut self, policy: Arc<dyn MemberAccessPolicy>) -> Self {
        self.resolver = Arc::new(AccessorResolver::with_policy(policy));
        self
    }

    /// Replace the type-metadata provider
    pub fn with_provider(mut self, provider: Arc<dyn TypeMetadataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the class resolver
    pub fn with_class_resolver(mut self, resolver: Arc<dyn ClassResolver>) -> Self {
        self.class_resolver = resolver;
        self
    }

    /// Replace the type converter
    pub fn with_type_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.type_converter = converter;
        self
    }

    /// Shadow the property-extension registry for this context
    pub fn with_property_overrides(
        mut self,
        overrides: Arc<ClassExtensionRegistry<Arc<dyn PropertyExtension>>>,
    ) -> Self {
        self.property_overrides = Some(overrides);
        self
    }

    /// Shadow the list-strategy registry for this context
    pub fn with_list_overrides(
        mut self,
        overrides: Arc<ClassExtensionRegistry<Arc<dyn OrderedList>>>,
    ) -> Self {
        self.list_overrides = Some(overrides);
        self
    }

    /// The root object of this evaluation
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The current ("this") object
    pub fn current(&self) -> &Value {
        &self.current
    }

    /// Replace the current object as evaluation descends
    pub fn set_current(&mut self, value: Value) {
        self.current = value;
    }

    /// Read a context variable; unbound names read as `Null`
    pub fn variable(&self, name: &str) -> Value {
        self.variables.get(name).cloned().unwrap_or(Value::Null)
    }

    /// Bind a context variable
    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.symbols.bind_variable(name);
        self.variables.insert(name.to_string(), value);
    }

    /// The symbol table
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Mutable access to the symbol table
    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    /// Enable or disable trace-record collection
    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace_enabled = enabled;
    }

    /// Whether tracing is on
    pub fn trace_enabled(&self) -> bool {
        self.trace_enabled
    }

    /// Collected trace records
    pub fn trace_records(&self) -> &[Evaluation] {
        &self.trace
    }

    /// Reset to defaults: drops variables, trace, symbols, and the current
    /// object (back to the root)
    pub fn clear(&mut self) {
        self.current = self.root.clone();
        self.variables.clear();
        self.symbols = SymbolTable::new();
        self.trace.clear();
        self.depth = 0;
    }

    /// The effective metadata provider
    pub fn provider(&self) -> &dyn TypeMetadataProvider {
        match &self.provider {
            Some(p) => p.as_ref(),
            None => global_types(),
        }
    }

    /// The class resolver
    pub fn class_resolver(&self) -> &dyn ClassResolver {
        self.class_resolver.as_ref()
    }

    /// The type converter
    pub fn type_converter(&self) -> &dyn TypeConverter {
        self.type_converter.as_ref()
    }

    /// The context's list-strategy overrides, if any
    pub fn list_overrides(&self) -> Option<&ClassExtensionRegistry<Arc<dyn OrderedList>>> {
        self.list_overrides.as_deref()
    }

    /// Field-access environment for this context
    pub fn access_env(&self) -> AccessEnv<'_> {
        AccessEnv {
            resolver: &self.resolver,
            provider: self.provider(),
            overrides: self.property_overrides.as_deref(),
        }
    }

    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn record(&mut self, node: String, source: &Value, result: Option<&Value>) {
        if !self.trace_enabled {
            return;
        }
        log::trace!(
            "eval depth {}: {node} on {} -> {:?}",
            self.depth,
            source.type_name(),
            result.map(|v| v.display_string())
        );
        self.trace.push(Evaluation {
            node,
            source_type: source.type_name().to_string(),
            result: result.map(|v| v.display_string()),
            depth: self.depth,
        });
    }
}

impl Default for ExprContext {
    fn default() -> Self {
        Self::new(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variables_default_to_null_and_clear_resets() {
        let mut ctx = ExprContext::new(Value::Int(1));
        assert_eq!(ctx.variable("missing"), Value::Null);
        ctx.set_variable("x", Value::Int(5));
        assert_eq!(ctx.variable("x"), Value::Int(5));
        assert!(ctx.symbols().is_variable("x"));
        ctx.clear();
        assert_eq!(ctx.variable("x"), Value::Null);
        assert!(!ctx.symbols().is_variable("x"));
    }

    #[test]
    fn statics_resolve_by_type_and_field() {
        let mut ctx = ExprContext::default();
        ctx.symbols_mut()
            .register_static("Color", "RED", Value::Str("#f00".into()));
        assert_eq!(
            ctx.symbols().resolve_static("Color", "RED"),
            Some(Value::Str("#f00".into()))
        );
        assert_eq!(ctx.symbols().resolve_static("Color", "BLUE"), None);
    }

    #[test]
    fn default_converter_passes_compatible_and_converts_primitives() {
        let conv = DefaultTypeConverter;
        let types = global_types();
        assert_eq!(
            conv.convert(&Value::Int(3), "Long", types),
            Some(Value::Long(3))
        );
        assert_eq!(
            conv.convert(&Value::Double(2.9), "Int", types),
            Some(Value::Int(2))
        );
        assert_eq!(conv.convert(&Value::Str("x".into()), "Int", types), None);
    }
}

//! Expression engine facade
//!
//! The engine is the front door a host application uses: it parses
//! expression strings, builds a per-evaluation context, and walks the AST.
//! Contexts are never shared between overlapping evaluations; the engine
//! itself is cheap to clone and thread-safe.

use std::sync::Arc;

use crate::error::Result;
use crate::expr::{ExprContext, ExprNode};
use crate::model::{TypeMetadataProvider, Value};
use crate::parser::parse_expression;

/// Expression evaluation engine
///
/// ```
/// use fieldpath::{ExprEngine, Value};
///
/// let engine = ExprEngine::new();
/// let result = engine.evaluate("1 + 2 * 3", &Value::Null).unwrap();
/// assert_eq!(result, Value::Int(7));
/// ```
#[derive(Clone, Default)]
pub struct ExprEngine {
    provider: Option<Arc<dyn TypeMetadataProvider>>,
    trace: bool,
}

impl ExprEngine {
    /// Create an engine backed by the global type registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom type-metadata provider
    pub fn with_provider(mut self, provider: Arc<dyn TypeMetadataProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Collect trace records during evaluation
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Build a fresh context rooted at `root`, configured like this engine
    pub fn context_for(&self, root: Value) -> ExprContext {
        let mut ctx = ExprContext::new(root);
        if let Some(provider) = &self.provider {
            ctx = ctx.with_provider(provider.clone());
        }
        ctx.enable_trace(self.trace);
        ctx
    }

    /// Parse and evaluate `expression` against `root`
    pub fn evaluate(&self, expression: &str, root: &Value) -> Result<Value> {
        let ast = parse_expression(expression)?;
        self.evaluate_ast(&ast, root)
    }

    /// Evaluate an already-parsed AST against `root`
    pub fn evaluate_ast(&self, ast: &ExprNode, root: &Value) -> Result<Value> {
        let mut ctx = self.context_for(root.clone());
        ast.get_value(&mut ctx, root)
    }

    /// Evaluate an AST inside a caller-provided context
    pub fn evaluate_with_context(&self, ast: &ExprNode, ctx: &mut ExprContext) -> Result<Value> {
        let root = ctx.root().clone();
        ast.get_value(ctx, &root)
    }

    /// Parse `expression` and assign `value` through it against `root`
    pub fn assign(&self, expression: &str, root: &Value, value: Value) -> Result<()> {
        let ast = parse_expression(expression)?;
        let mut ctx = self.context_for(root.clone());
        ast.set_value(&mut ctx, root, value)
    }
}

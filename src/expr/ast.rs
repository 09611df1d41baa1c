//! Expression AST node definitions
//!
//! Each node kind is a variant of one sum type; larger variants box their
//! data to keep the enum small. Nodes are immutable after construction.
//! Constancy is structural and memoized lazily: a node that can be proven
//! constant evaluates once and short-circuits thereafter.

use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::OnceLock;

use crate::error::Result;
use crate::fieldvalue::FieldPath;
use crate::model::Value;

/// AST representation of an expression
#[derive(Debug, Clone)]
pub enum ExprNode {
    /// Literal value
    Constant(Value),

    /// Property access through a field path, with an optional base
    Property(Box<PropertyData>),

    /// Index access (`base[subscript]`)
    Index(Box<IndexData>),

    /// Unary operation (negation, logical not)
    Unary(Box<UnaryData>),

    /// Binary operation (arithmetic, comparison, logical)
    Binary(Box<BinaryData>),

    /// Type cast with the silent-null contract (`value as Type`)
    Cast(Box<CastData>),

    /// Method call on a target (`base.method(args)`)
    MethodCall(Box<MethodCallData>),

    /// Collection projection (`base.collect(body)` and friends)
    Projection(Box<ProjectionData>),

    /// Left-to-right descent: evaluate left, make it current, evaluate right
    Chain(Box<ChainData>),

    /// Context variable reference (`$name`)
    Variable(String),

    /// Static field reference (`@Type.field`), resolved via the symbol table
    StaticField(Box<StaticFieldData>),
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// Addition, or concatenation on non-numeric operands
    Add,
    /// Subtraction
    Subtract,
    /// Multiplication
    Multiply,
    /// Division
    Divide,
    /// Remainder
    Remainder,
    /// Less-than
    Less,
    /// Less-or-equal
    LessEq,
    /// Greater-than
    Greater,
    /// Greater-or-equal
    GreaterEq,
    /// Coercing equality
    Eq,
    /// Coercing inequality
    NotEq,
    /// Logical conjunction (short-circuit)
    And,
    /// Logical disjunction (short-circuit)
    Or,
}

impl BinaryOperator {
    /// The operator's source symbol
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Remainder => "%",
            BinaryOperator::Less => "<",
            BinaryOperator::LessEq => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterEq => ">=",
            BinaryOperator::Eq => "==",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Arithmetic negation
    Negate,
    /// Logical not
    Not,
}

/// Projection kinds over an iterable source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Map every element through the body
    Collect,
    /// Keep the elements whose body is truthy
    FindAll,
    /// First element whose body is truthy, or null
    Find,
    /// Accumulate through the numeric add operator
    Sum,
    /// Sum divided by element count
    Avg,
    /// Smallest element under the coercing comparison; first of equals wins
    Min,
    /// Largest element under the coercing comparison; first of equals wins
    Max,
}

impl ProjectionKind {
    /// Parse a projection method name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "collect" => Some(ProjectionKind::Collect),
            "findAll" => Some(ProjectionKind::FindAll),
            "find" => Some(ProjectionKind::Find),
            "sum" => Some(ProjectionKind::Sum),
            "avg" => Some(ProjectionKind::Avg),
            "min" => Some(ProjectionKind::Min),
            "max" => Some(ProjectionKind::Max),
            _ => None,
        }
    }

    /// The projection's method name
    pub fn name(self) -> &'static str {
        match self {
            ProjectionKind::Collect => "collect",
            ProjectionKind::FindAll => "findAll",
            ProjectionKind::Find => "find",
            ProjectionKind::Sum => "sum",
            ProjectionKind::Avg => "avg",
            ProjectionKind::Min => "min",
            ProjectionKind::Max => "max",
        }
    }
}

/// Index subscript: a computed index or a positionally relative sentinel
#[derive(Debug, Clone)]
pub enum Subscript {
    /// Computed subscript expression
    Expr(ExprNode),
    /// The whole sequence, copied into a distinct instance
    All,
    /// Index 0 when non-empty
    First,
    /// Index `len / 2` when non-empty
    Mid,
    /// Index `len - 1` when non-empty
    Last,
}

/// Lazily computed constancy memo shared by the operator nodes
#[derive(Debug, Default)]
pub struct ConstMemo {
    flag: OnceLock<bool>,
    value: OnceLock<Value>,
}

impl ConstMemo {
    /// Memoized constancy flag, computed by `f` on first use
    pub fn flag(&self, f: impl FnOnce() -> bool) -> bool {
        *self.flag.get_or_init(f)
    }

    /// Memoized constant value, computed by `f` on first use
    pub fn value(&self, f: impl FnOnce() -> Result<Value>) -> Result<Value> {
        if let Some(v) = self.value.get() {
            return Ok(v.clone());
        }
        let computed = f()?;
        let _ = self.value.set(computed.clone());
        Ok(computed)
    }
}

impl Clone for ConstMemo {
    fn clone(&self) -> Self {
        // memos restart empty; they are caches, not state
        ConstMemo::default()
    }
}

/// Property access data
#[derive(Debug, Clone)]
pub struct PropertyData {
    /// Base expression; absent means the current source object
    pub base: Option<ExprNode>,
    /// The parsed path, built once at parse finalization
    pub path: Arc<FieldPath>,
}

/// Index access data
#[derive(Debug, Clone)]
pub struct IndexData {
    /// The indexed expression
    pub base: ExprNode,
    /// The subscript
    pub subscript: Subscript,
}

/// Unary operation data
#[derive(Debug, Clone)]
pub struct UnaryData {
    /// The operator
    pub op: UnaryOperator,
    /// The operand
    pub operand: ExprNode,
    /// Constancy memo
    pub memo: ConstMemo,
}

/// Binary operation data
#[derive(Debug, Clone)]
pub struct BinaryData {
    /// The operator
    pub op: BinaryOperator,
    /// Left operand
    pub left: ExprNode,
    /// Right operand
    pub right: ExprNode,
    /// Constancy memo
    pub memo: ConstMemo,
}

/// Cast data
#[derive(Debug, Clone)]
pub struct CastData {
    /// Target type name
    pub target_type: String,
    /// The value expression being cast
    pub operand: ExprNode,
}

/// Method call data
#[derive(Debug, Clone)]
pub struct MethodCallData {
    /// Call target; absent means the current source object
    pub base: Option<ExprNode>,
    /// Method name
    pub method: String,
    /// Argument expressions
    pub args: SmallVec<[ExprNode; 4]>,
}

/// Projection data
#[derive(Debug, Clone)]
pub struct ProjectionData {
    /// The projection kind
    pub kind: ProjectionKind,
    /// The iterable source expression
    pub base: ExprNode,
    /// Per-element body; absent means the element itself
    pub body: Option<ExprNode>,
}

/// Chain data
#[derive(Debug, Clone)]
pub struct ChainData {
    /// Evaluated first
    pub left: ExprNode,
    /// Evaluated against the left result as the current object
    pub right: ExprNode,
}

/// Static field reference data
#[derive(Debug, Clone)]
pub struct StaticFieldData {
    /// The owning type name
    pub type_name: String,
    /// The static field name
    pub field: String,
}

impl ExprNode {
    /// Create a constant node
    pub fn constant(value: impl Into<Value>) -> Self {
        ExprNode::Constant(value.into())
    }

    /// Create a property node over a dotted path string
    pub fn property(base: Option<ExprNode>, path: &str) -> Result<Self> {
        Ok(ExprNode::Property(Box::new(PropertyData {
            base,
            path: FieldPath::shared(path)?,
        })))
    }

    /// Create an index node
    pub fn index(base: ExprNode, subscript: Subscript) -> Self {
        ExprNode::Index(Box::new(IndexData { base, subscript }))
    }

    /// Create a unary node
    pub fn unary(op: UnaryOperator, operand: ExprNode) -> Self {
        ExprNode::Unary(Box::new(UnaryData {
            op,
            operand,
            memo: ConstMemo::default(),
        }))
    }

    /// Create a binary node
    pub fn binary(op: BinaryOperator, left: ExprNode, right: ExprNode) -> Self {
        ExprNode::Binary(Box::new(BinaryData {
            op,
            left,
            right,
            memo: ConstMemo::default(),
        }))
    }

    /// Create a cast node
    pub fn cast(operand: ExprNode, target_type: &str) -> Self {
        ExprNode::Cast(Box::new(CastData {
            target_type: target_type.to_string(),
            operand,
        }))
    }

    /// Create a method-call node
    pub fn method_call(
        base: Option<ExprNode>,
        method: impl Into<String>,
        args: impl Into<SmallVec<[ExprNode; 4]>>,
    ) -> Self {
        ExprNode::MethodCall(Box::new(MethodCallData {
            base,
            method: method.into(),
            args: args.into(),
        }))
    }

    /// Create a projection node
    pub fn projection(kind: ProjectionKind, base: ExprNode, body: Option<ExprNode>) -> Self {
        ExprNode::Projection(Box::new(ProjectionData { kind, base, body }))
    }

    /// Create a chain node
    pub fn chain(left: ExprNode, right: ExprNode) -> Self {
        ExprNode::Chain(Box::new(ChainData { left, right }))
    }

    /// Create a variable-reference node
    pub fn variable(name: impl Into<String>) -> Self {
        ExprNode::Variable(name.into())
    }

    /// Create a static-field-reference node
    pub fn static_field(type_name: &str, field: &str) -> Self {
        ExprNode::StaticField(Box::new(StaticFieldData {
            type_name: type_name.to_string(),
            field: field.to_string(),
        }))
    }

    /// Structural constancy: literals are constant, operator nodes are
    /// constant when their children are, everything touching the target
    /// graph or the context is not. Memoized on the operator nodes.
    pub fn is_constant(&self) -> bool {
        match self {
            ExprNode::Constant(_) => true,
            ExprNode::Unary(data) => data.memo.flag(|| data.operand.is_constant()),
            ExprNode::Binary(data) => data
                .memo
                .flag(|| data.left.is_constant() && data.right.is_constant()),
            _ => false,
        }
    }

    /// Short node description for traces and diagnostics
    pub fn describe(&self) -> String {
        match self {
            ExprNode::Constant(v) => format!("constant {}", v.display_string()),
            ExprNode::Property(d) => format!("property {}", d.path),
            ExprNode::Index(_) => "index".to_string(),
            ExprNode::Unary(d) => format!("unary {:?}", d.op),
            ExprNode::Binary(d) => format!("binary {}", d.op.symbol()),
            ExprNode::Cast(d) => format!("cast as {}", d.target_type),
            ExprNode::MethodCall(d) => format!("call {}()", d.method),
            ExprNode::Projection(d) => format!("projection {}", d.kind.name()),
            ExprNode::Chain(_) => "chain".to_string(),
            ExprNode::Variable(name) => format!("variable ${name}"),
            ExprNode::StaticField(d) => format!("static @{}.{}", d.type_name, d.field),
        }
    }
}

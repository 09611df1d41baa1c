//! Tree-walking evaluation
//!
//! `get_value` is pure with respect to the AST: it mutates only the
//! context and, through `set_value`, target objects. Null tolerance
//! follows the field-path contract throughout — a null base reads as
//! `Null` and writes as a no-op — while unresolvable names and
//! incomparable operands fail loudly.

use crate::error::{FieldPathError, Result};
use crate::list::list_strategy_with;
use crate::model::{Sequence, Value};

use super::ast::{
    BinaryData, BinaryOperator, ExprNode, IndexData, ProjectionData, ProjectionKind, PropertyData,
    Subscript, UnaryOperator,
};
use super::compare::{compare_with_conversion, is_equal, truthy};
use super::context::ExprContext;
use super::methods::invoke_method;
use super::numeric;

impl ExprNode {
    /// Evaluate this node against `source` (the current object)
    pub fn get_value(&self, ctx: &mut ExprContext, source: &Value) -> Result<Value> {
        ctx.enter();
        let result = self.get_value_inner(ctx, source);
        if ctx.trace_enabled() {
            ctx.record(self.describe(), source, result.as_ref().ok());
        }
        ctx.exit();
        result
    }

    fn get_value_inner(&self, ctx: &mut ExprContext, source: &Value) -> Result<Value> {
        match self {
            ExprNode::Constant(value) => Ok(value.clone()),

            ExprNode::Variable(name) => {
                // $this is implicitly the current object unless shadowed
                if name == "this" && !ctx.symbols().is_variable("this") {
                    return Ok(ctx.current().clone());
                }
                Ok(ctx.variable(name))
            }

            ExprNode::StaticField(data) => ctx
                .symbols()
                .resolve_static(&data.type_name, &data.field)
                .ok_or_else(|| FieldPathError::no_getter(&data.field, &data.type_name)),

            ExprNode::Property(data) => self.eval_property(data, ctx, source),

            ExprNode::Index(data) => self.eval_index(data, ctx, source),

            ExprNode::Unary(data) => {
                if self.is_constant() {
                    return data
                        .memo
                        .value(|| self.eval_unary(data.op, &data.operand, ctx, source));
                }
                self.eval_unary(data.op, &data.operand, ctx, source)
            }

            ExprNode::Binary(data) => {
                if self.is_constant() {
                    return data.memo.value(|| eval_binary(data, ctx, source));
                }
                eval_binary(data, ctx, source)
            }

            ExprNode::Cast(data) => {
                let value = data.operand.get_value(ctx, source)?;
                // the cast that fails converts to null, never to an error
                Ok(ctx
                    .type_converter()
                    .convert(&value, &data.target_type, ctx.provider())
                    .unwrap_or(Value::Null))
            }

            ExprNode::MethodCall(data) => {
                let target = match &data.base {
                    Some(base) => base.get_value(ctx, source)?,
                    None => source.clone(),
                };
                if target.is_null() {
                    return Ok(Value::Null);
                }
                let mut args = Vec::with_capacity(data.args.len());
                for arg in &data.args {
                    args.push(arg.get_value(ctx, source)?);
                }
                invoke_method(ctx, &target, &data.method, &args)
            }

            ExprNode::Projection(data) => self.eval_projection(data, ctx, source),

            ExprNode::Chain(data) => {
                let left = data.left.get_value(ctx, source)?;
                if left.is_null() {
                    return Ok(Value::Null);
                }
                let prev = ctx.current().clone();
                ctx.set_current(left.clone());
                let result = data.right.get_value(ctx, &left);
                ctx.set_current(prev);
                result
            }
        }
    }

    fn eval_unary(
        &self,
        op: UnaryOperator,
        operand: &ExprNode,
        ctx: &mut ExprContext,
        source: &Value,
    ) -> Result<Value> {
        let value = operand.get_value(ctx, source)?;
        match op {
            UnaryOperator::Negate => numeric::negate(&value),
            UnaryOperator::Not => Ok(Value::Bool(!truthy(&value))),
        }
    }

    fn eval_property(
        &self,
        data: &PropertyData,
        ctx: &mut ExprContext,
        source: &Value,
    ) -> Result<Value> {
        if data.base.is_none() {
            // symbol kinds resolved ahead of evaluation: context variables
            // and static fields bypass field access entirely
            if data.path.next().is_none() && ctx.symbols().is_variable(data.path.name()) {
                return Ok(ctx.variable(data.path.name()));
            }
            if let Some(rest) = data.path.next()
                && ctx.symbols().has_statics_for(data.path.name())
            {
                let root = ctx
                    .symbols()
                    .resolve_static(data.path.name(), rest.name())
                    .ok_or_else(|| {
                        FieldPathError::no_getter(rest.name(), data.path.name())
                    })?;
                return match rest.next() {
                    None => Ok(root),
                    Some(remainder) => remainder.get_with(&root, &ctx.access_env()),
                };
            }
        }
        let target = match &data.base {
            Some(base) => base.get_value(ctx, source)?,
            None => source.clone(),
        };
        if target.is_null() {
            return Ok(Value::Null);
        }
        data.path.get_with(&target, &ctx.access_env())
    }

    fn eval_index(
        &self,
        data: &IndexData,
        ctx: &mut ExprContext,
        source: &Value,
    ) -> Result<Value> {
        let base = data.base.get_value(ctx, source)?;
        if base.is_null() {
            return Ok(Value::Null);
        }
        let list = list_strategy_with(&base, ctx.provider(), ctx.list_overrides())?;
        let size = list.size(&base)?;
        match &data.subscript {
            Subscript::All => list.copy(&base),
            Subscript::First | Subscript::Mid | Subscript::Last => {
                match dynamic_index(&data.subscript, size) {
                    Some(i) => list.element_at(&base, i),
                    None => Ok(Value::Null),
                }
            }
            Subscript::Expr(expr) => {
                let idx = expr.get_value(ctx, source)?;
                let i = concrete_index(&idx)?;
                // out-of-range reads are null, not errors
                if i < 0 || i as usize >= size {
                    return Ok(Value::Null);
                }
                list.element_at(&base, i as usize)
            }
        }
    }

    fn eval_projection(
        &self,
        data: &ProjectionData,
        ctx: &mut ExprContext,
        source: &Value,
    ) -> Result<Value> {
        let base = data.base.get_value(ctx, source)?;
        if base.is_null() {
            return Ok(Value::Null);
        }
        let list = list_strategy_with(&base, ctx.provider(), ctx.list_overrides())?;
        let elements = list.to_vec(&base)?;

        let prev = ctx.current().clone();
        let result = self.run_projection(data, ctx, &elements);
        ctx.set_current(prev);
        result
    }

    fn run_projection(
        &self,
        data: &ProjectionData,
        ctx: &mut ExprContext,
        elements: &[Value],
    ) -> Result<Value> {
        let body_value = |ctx: &mut ExprContext, element: &Value| -> Result<Value> {
            ctx.set_current(element.clone());
            match &data.body {
                Some(body) => body.get_value(ctx, element),
                None => Ok(element.clone()),
            }
        };

        match data.kind {
            ProjectionKind::Collect => {
                let mut out = Vec::with_capacity(elements.len());
                for el in elements {
                    out.push(body_value(ctx, el)?);
                }
                Ok(Value::Sequence(Sequence::from_vec(out)))
            }
            ProjectionKind::FindAll => {
                let mut out = Vec::new();
                for el in elements {
                    if truthy(&body_value(ctx, el)?) {
                        out.push(el.clone());
                    }
                }
                Ok(Value::Sequence(Sequence::from_vec(out)))
            }
            ProjectionKind::Find => {
                for el in elements {
                    if truthy(&body_value(ctx, el)?) {
                        return Ok(el.clone());
                    }
                }
                Ok(Value::Null)
            }
            ProjectionKind::Sum | ProjectionKind::Avg => {
                let mut acc: Option<Value> = None;
                for el in elements {
                    let v = body_value(ctx, el)?;
                    acc = Some(match acc {
                        None => v,
                        // accumulation runs through the numeric operators,
                        // so custom numeric types flow through unchanged
                        Some(prev) => numeric::add(&prev, &v)?,
                    });
                }
                let Some(total) = acc else {
                    return Ok(Value::Null);
                };
                if data.kind == ProjectionKind::Sum {
                    return Ok(total);
                }
                numeric::divide(&total, &Value::Long(elements.len() as i64))
            }
            ProjectionKind::Min | ProjectionKind::Max => {
                let mut best: Option<Value> = None;
                for el in elements {
                    let v = body_value(ctx, el)?;
                    if v.is_null() {
                        continue;
                    }
                    best = Some(match best {
                        None => v,
                        Some(champion) => {
                            // strict inequality: the first of equals stays
                            let replace = match data.kind {
                                ProjectionKind::Min => {
                                    compare_with_conversion(&v, &champion)?.is_lt()
                                }
                                _ => compare_with_conversion(&v, &champion)?.is_gt(),
                            };
                            if replace { v } else { champion }
                        }
                    });
                }
                Ok(best.unwrap_or(Value::Null))
            }
        }
    }

    /// Assign `value` through this node against `target`
    pub fn set_value(&self, ctx: &mut ExprContext, target: &Value, value: Value) -> Result<()> {
        match self {
            ExprNode::Variable(name) => {
                ctx.set_variable(name, value);
                Ok(())
            }

            ExprNode::Property(data) => {
                if data.base.is_none()
                    && data.path.next().is_none()
                    && ctx.symbols().is_variable(data.path.name())
                {
                    ctx.set_variable(data.path.name(), value);
                    return Ok(());
                }
                let owner = match &data.base {
                    Some(base) => base.get_value(ctx, target)?,
                    None => target.clone(),
                };
                if owner.is_null() {
                    return Ok(());
                }
                data.path.set_with(&owner, value, &ctx.access_env())
            }

            ExprNode::Index(data) => {
                let base = data.base.get_value(ctx, target)?;
                if base.is_null() {
                    return Ok(());
                }
                let list = list_strategy_with(&base, ctx.provider(), ctx.list_overrides())?;
                let size = list.size(&base)?;
                let index = match &data.subscript {
                    Subscript::All => None,
                    Subscript::First | Subscript::Mid | Subscript::Last => {
                        dynamic_index(&data.subscript, size)
                    }
                    Subscript::Expr(expr) => {
                        let idx = expr.get_value(ctx, target)?;
                        let i = concrete_index(&idx)?;
                        (i >= 0 && (i as usize) < size).then_some(i as usize)
                    }
                };
                // anything unaddressable is a silent no-op, like path sets
                match index {
                    Some(i) => list.set_element_at(&base, i, value),
                    None => Ok(()),
                }
            }

            ExprNode::Chain(data) => {
                let left = data.left.get_value(ctx, target)?;
                if left.is_null() {
                    return Ok(());
                }
                data.right.set_value(ctx, &left, value)
            }

            other => Err(FieldPathError::Type {
                message: format!("cannot assign through {}", other.describe()),
            }),
        }
    }
}

fn eval_binary(data: &BinaryData, ctx: &mut ExprContext, source: &Value) -> Result<Value> {
    // short-circuit forms first
    match data.op {
        BinaryOperator::And => {
            let left = data.left.get_value(ctx, source)?;
            if !truthy(&left) {
                return Ok(Value::Bool(false));
            }
            let right = data.right.get_value(ctx, source)?;
            return Ok(Value::Bool(truthy(&right)));
        }
        BinaryOperator::Or => {
            let left = data.left.get_value(ctx, source)?;
            if truthy(&left) {
                return Ok(Value::Bool(true));
            }
            let right = data.right.get_value(ctx, source)?;
            return Ok(Value::Bool(truthy(&right)));
        }
        _ => {}
    }

    let left = data.left.get_value(ctx, source)?;
    let right = data.right.get_value(ctx, source)?;
    match data.op {
        BinaryOperator::Add => numeric::add(&left, &right),
        BinaryOperator::Subtract => numeric::subtract(&left, &right),
        BinaryOperator::Multiply => numeric::multiply(&left, &right),
        BinaryOperator::Divide => numeric::divide(&left, &right),
        BinaryOperator::Remainder => numeric::remainder(&left, &right),
        BinaryOperator::Less => Ok(Value::Bool(compare_with_conversion(&left, &right)?.is_lt())),
        BinaryOperator::LessEq => Ok(Value::Bool(compare_with_conversion(&left, &right)?.is_le())),
        BinaryOperator::Greater => {
            Ok(Value::Bool(compare_with_conversion(&left, &right)?.is_gt()))
        }
        BinaryOperator::GreaterEq => {
            Ok(Value::Bool(compare_with_conversion(&left, &right)?.is_ge()))
        }
        BinaryOperator::Eq => Ok(Value::Bool(is_equal(&left, &right))),
        BinaryOperator::NotEq => Ok(Value::Bool(!is_equal(&left, &right))),
        BinaryOperator::And | BinaryOperator::Or => unreachable!("handled above"),
    }
}

fn dynamic_index(subscript: &Subscript, size: usize) -> Option<usize> {
    if size == 0 {
        return None;
    }
    match subscript {
        Subscript::First => Some(0),
        Subscript::Mid => Some(size / 2),
        Subscript::Last => Some(size - 1),
        _ => None,
    }
}

fn concrete_index(value: &Value) -> Result<i64> {
    match value {
        Value::Byte(n) => Ok(*n as i64),
        Value::Short(n) => Ok(*n as i64),
        Value::Int(n) => Ok(*n as i64),
        Value::Long(n) => Ok(*n),
        Value::Char(c) => Ok(*c as u32 as i64),
        other => Err(FieldPathError::Type {
            message: format!("subscript of type {} is not an index", other.type_name()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::{BinaryOperator, ProjectionKind};
    use pretty_assertions::assert_eq;

    fn eval(node: &ExprNode, root: Value) -> Result<Value> {
        let mut ctx = ExprContext::new(root.clone());
        node.get_value(&mut ctx, &root)
    }

    #[test]
    fn constant_binary_memoizes() {
        let node = ExprNode::binary(
            BinaryOperator::Multiply,
            ExprNode::constant(6),
            ExprNode::constant(7),
        );
        assert_eq!(eval(&node, Value::Null).unwrap(), Value::Int(42));
        // second evaluation takes the memoized path
        assert_eq!(eval(&node, Value::Null).unwrap(), Value::Int(42));
    }

    #[test]
    fn dynamic_subscripts_address_positionally() {
        let seq = Value::sequence((1..=5).map(Value::Int).collect());
        for (subscript, expected) in [
            (Subscript::First, Value::Int(1)),
            (Subscript::Mid, Value::Int(3)),
            (Subscript::Last, Value::Int(5)),
        ] {
            let node = ExprNode::index(ExprNode::constant(seq.clone()), subscript);
            assert_eq!(eval(&node, Value::Null).unwrap(), expected);
        }
        let all = ExprNode::index(ExprNode::constant(seq.clone()), Subscript::All);
        let copy = eval(&all, Value::Null).unwrap();
        assert_eq!(copy, seq);
        assert!(!copy.identity_eq(&seq));
    }

    #[test]
    fn out_of_range_read_is_null_and_write_is_noop() {
        let seq = Value::sequence(vec![Value::Int(1)]);
        let node = ExprNode::index(
            ExprNode::constant(seq.clone()),
            Subscript::Expr(ExprNode::constant(9)),
        );
        assert_eq!(eval(&node, Value::Null).unwrap(), Value::Null);

        let mut ctx = ExprContext::new(Value::Null);
        node.set_value(&mut ctx, &Value::Null, Value::Int(7)).unwrap();
        assert_eq!(seq, Value::sequence(vec![Value::Int(1)]));
    }

    #[test]
    fn empty_sequence_dynamic_subscript_is_null() {
        let seq = Value::sequence(vec![]);
        let node = ExprNode::index(ExprNode::constant(seq), Subscript::First);
        assert_eq!(eval(&node, Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn min_max_keep_first_of_equals() {
        let seq = Value::sequence(vec![Value::Int(2), Value::Long(2), Value::Int(5)]);
        let min = ExprNode::projection(ProjectionKind::Min, ExprNode::constant(seq.clone()), None);
        // Int(2) arrived before the equal Long(2) and must survive
        assert_eq!(eval(&min, Value::Null).unwrap(), Value::Int(2));

        let seq2 = Value::sequence(vec![Value::Long(5), Value::Int(5), Value::Int(1)]);
        let max = ExprNode::projection(ProjectionKind::Max, ExprNode::constant(seq2), None);
        assert_eq!(eval(&max, Value::Null).unwrap(), Value::Long(5));
    }

    #[test]
    fn cast_failure_is_silent_null() {
        let node = ExprNode::cast(ExprNode::constant(Value::Str("nope".into())), "Int");
        assert_eq!(eval(&node, Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn logical_operators_short_circuit() {
        // right side would error (subtraction of a sequence); && must not reach it
        let bad = ExprNode::binary(
            BinaryOperator::Subtract,
            ExprNode::constant(Value::sequence(vec![])),
            ExprNode::constant(1),
        );
        let node = ExprNode::binary(BinaryOperator::And, ExprNode::constant(false), bad);
        assert_eq!(eval(&node, Value::Null).unwrap(), Value::Bool(false));
    }

    #[test]
    fn chain_descends_and_tolerates_null() {
        let seq = Value::sequence(vec![Value::Int(4), Value::Int(6)]);
        let chain = ExprNode::chain(
            ExprNode::constant(seq),
            ExprNode::projection(
                ProjectionKind::Sum,
                ExprNode::variable("this"),
                None,
            ),
        );
        assert_eq!(eval(&chain, Value::Null).unwrap(), Value::Int(10));

        let null_chain = ExprNode::chain(
            ExprNode::constant(Value::Null),
            ExprNode::variable("this"),
        );
        assert_eq!(eval(&null_chain, Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn variables_read_and_write_through_the_context() {
        let mut ctx = ExprContext::new(Value::Null);
        let var = ExprNode::variable("count");
        var.set_value(&mut ctx, &Value::Null, Value::Int(3)).unwrap();
        assert_eq!(var.get_value(&mut ctx, &Value::Null).unwrap(), Value::Int(3));
    }
}

//! Method-call dispatch and overload resolution
//!
//! Calls resolve against the context's type-metadata provider: candidates
//! of matching name and arity are gathered most-derived class first, each
//! is scored by argument compatibility, and the best score wins with
//! earlier candidates breaking ties. A few sequence and string calls are
//! served directly so expressions can interrogate containers without any
//! registration.

use crate::error::{FieldPathError, Result};
use crate::list::list_strategy_with;
use crate::model::{MethodDef, ParamSpec, TypeMetadataProvider, Value};

use super::context::ExprContext;
use super::numeric::{NumericKind, classify};

/// Invoke `name` on `target` with already-evaluated arguments
pub fn invoke_method(
    ctx: &ExprContext,
    target: &Value,
    name: &str,
    args: &[Value],
) -> Result<Value> {
    if let Some(result) = builtin_call(ctx, target, name, args)? {
        return Ok(result);
    }

    let Value::Object(handle) = target else {
        return Err(FieldPathError::NoSuchMethod {
            method: name.to_string(),
            type_name: target.type_name().to_string(),
        });
    };

    let mut best: Option<(u32, MethodDef)> = None;
    for class in ctx.provider().ancestry(target.type_name()) {
        for method in &class.methods {
            if method.name != name || method.params.len() != args.len() {
                continue;
            }
            if let Some(score) = score_call(&method.params, args) {
                // strictly better only: earlier (more derived) wins ties
                if best.as_ref().is_none_or(|(b, _)| score > *b) {
                    best = Some((score, method.clone()));
                }
            }
        }
    }

    let Some((_, method)) = best else {
        return Err(FieldPathError::NoSuchMethod {
            method: name.to_string(),
            type_name: target.type_name().to_string(),
        });
    };
    log::trace!("dispatching {}.{name}/{}", target.type_name(), args.len());
    handle.with_mut(|any| (method.invoke)(any, args))
}

fn score_call(params: &[ParamSpec], args: &[Value]) -> Option<u32> {
    let mut total = 0;
    for (spec, arg) in params.iter().zip(args) {
        total += score_arg(spec, arg)?;
    }
    Some(total)
}

/// Compatibility score for one argument: exact kind 3, widening 2,
/// wildcard 1, incompatible none.
fn score_arg(spec: &ParamSpec, arg: &Value) -> Option<u32> {
    let kind = classify(arg);
    match spec {
        ParamSpec::Any => Some(1),
        ParamSpec::Bool => (kind == NumericKind::Bool).then_some(3),
        ParamSpec::Integral => match kind {
            NumericKind::Null => Some(1),
            k if integral(k) => Some(3),
            _ => None,
        },
        ParamSpec::Numeric => match kind {
            NumericKind::Null => Some(1),
            NumericKind::Float | NumericKind::Double | NumericKind::Decimal => Some(3),
            k if integral(k) => Some(2),
            _ => None,
        },
        ParamSpec::Text => match arg {
            Value::Str(_) => Some(3),
            Value::Char(_) => Some(2),
            Value::Null => Some(2),
            _ => None,
        },
        ParamSpec::Sequence => match arg {
            Value::Sequence(_) => Some(3),
            Value::Null => Some(2),
            _ => None,
        },
        ParamSpec::Object(type_name) => match arg {
            Value::Null => Some(2),
            Value::Object(h) if h.type_name() == type_name => Some(3),
            Value::Object(h) => {
                // subtype compatibility through the registered hierarchy
                let compatible =
                    crate::model::global_types().ancestry(h.type_name()).iter().any(|c| {
                        c.name == *type_name || c.traits.iter().any(|t| t == type_name)
                    });
                compatible.then_some(2)
            }
            _ => None,
        },
    }
}

fn integral(kind: NumericKind) -> bool {
    matches!(
        kind,
        NumericKind::Bool
            | NumericKind::Byte
            | NumericKind::Short
            | NumericKind::Char
            | NumericKind::Int
            | NumericKind::Long
            | NumericKind::BigInt
    )
}

/// Built-in calls on list-shaped values and strings
fn builtin_call(
    ctx: &ExprContext,
    target: &Value,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>> {
    match target {
        // anything with a list strategy answers the sequence calls,
        // including registered foreign array types
        Value::Sequence(_) | Value::Object(_)
            if list_strategy_with(target, ctx.provider(), ctx.list_overrides()).is_ok() =>
        {
            let list = list_strategy_with(target, ctx.provider(), ctx.list_overrides())?;
            let out = match (name, args) {
                ("size", []) => Value::Long(list.size(target)? as i64),
                ("isEmpty", []) => Value::Bool(list.is_empty(target)?),
                ("first", []) => list.first_element(target)?,
                ("last", []) => list.last_element(target)?,
                ("contains", [needle]) => Value::Bool(list.contains(target, needle)?),
                _ => return Ok(None),
            };
            Ok(Some(out))
        }
        Value::Str(s) => {
            let out = match (name, args) {
                ("length", []) => Value::Long(s.chars().count() as i64),
                ("isEmpty", []) => Value::Bool(s.is_empty()),
                ("toUpperCase", []) => Value::Str(s.to_uppercase()),
                ("toLowerCase", []) => Value::Str(s.to_lowercase()),
                ("contains", [Value::Str(needle)]) => Value::Bool(s.contains(needle.as_str())),
                _ => return Ok(None),
            };
            Ok(Some(out))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassBuilder, ObjectHandle, register_class};

    struct Calc {
        total: i64,
    }

    #[test]
    fn overloads_resolve_by_argument_kind() {
        register_class(
            ClassBuilder::new("OverloadCalc")
                .method::<Calc, _>("apply", &[ParamSpec::Integral], |c, args| {
                    if let Some(Value::Long(n)) = args.first() {
                        c.total += n;
                    }
                    Ok(Value::Str("integral".into()))
                })
                .method::<Calc, _>("apply", &[ParamSpec::Text], |_, _| {
                    Ok(Value::Str("text".into()))
                })
                .build(),
        );
        let ctx = ExprContext::new(Value::Null);
        let target = Value::Object(ObjectHandle::new("OverloadCalc", Calc { total: 0 }));
        assert_eq!(
            invoke_method(&ctx, &target, "apply", &[Value::Long(1)]).unwrap(),
            Value::Str("integral".into())
        );
        assert_eq!(
            invoke_method(&ctx, &target, "apply", &[Value::Str("x".into())]).unwrap(),
            Value::Str("text".into())
        );
    }

    #[test]
    fn missing_method_names_type_and_method() {
        let ctx = ExprContext::new(Value::Null);
        let target = Value::Object(ObjectHandle::new("OverloadCalc", Calc { total: 0 }));
        let err = invoke_method(&ctx, &target, "vanish", &[]).unwrap_err();
        assert!(matches!(err, FieldPathError::NoSuchMethod { .. }));
    }

    #[test]
    fn sequence_builtins_answer_without_registration() {
        let ctx = ExprContext::new(Value::Null);
        let seq = Value::sequence(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(
            invoke_method(&ctx, &seq, "size", &[]).unwrap(),
            Value::Long(2)
        );
        assert_eq!(
            invoke_method(&ctx, &seq, "contains", &[Value::Int(2)]).unwrap(),
            Value::Bool(true)
        );
    }
}

//! Default resolution policy for the reference engine

use std::sync::Arc;

use tracing::trace;

use crate::action::{
    Action, ActionDescriptor, ActionKind, BindError, Binder, CallDescriptor, ConversionError,
    ConversionOutcome, ConvertDescriptor, GetMemberDescriptor, Rule, SetMemberDescriptor,
};
use crate::runtime::error::RuntimeError;
use crate::runtime::value::{Native, Value, ValueKind};

/// Binds member access on objects, calls on natives and primitive conversions
///
/// Argument layout per action:
/// - Call: `[callee, args...]`
/// - GetMember: `[receiver]`
/// - SetMember: `[receiver, value]`
/// - Convert: `[value]`
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBinder;

impl DefaultBinder {
    pub fn new() -> Self {
        Self
    }

    /// Convert `value` under the descriptor's policy
    pub fn convert(
        value: &Value,
        descriptor: &ConvertDescriptor,
    ) -> Result<ConversionOutcome, ConversionError> {
        let found = convert_value(value, descriptor.target, descriptor.policy.allows_explicit());
        descriptor.complete(value.kind(), found)
    }
}

fn expect_args(kind: ActionKind, args: &[Value], expected: usize) -> Result<(), BindError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(BindError::ArgumentCount {
            kind,
            expected,
            actual: args.len(),
        })
    }
}

impl Binder for DefaultBinder {
    fn bind(&self, descriptor: &ActionDescriptor, args: &[Value]) -> Result<Rule, BindError> {
        trace!(target: "ember::action", kind = ?descriptor.kind(), argc = args.len(), "binding");
        match descriptor.action() {
            Action::Call(call) => bind_call(call, args),
            Action::GetMember(get) => bind_get_member(*get, args),
            Action::SetMember(set) => bind_set_member(*set, args),
            Action::Convert(convert) => bind_convert(*convert, args),
        }
    }
}

fn bind_call(call: &CallDescriptor, args: &[Value]) -> Result<Rule, BindError> {
    let expected = call.shape.len() + 1;
    expect_args(ActionKind::Call, args, expected)?;
    let Value::Native(native) = &args[0] else {
        return Err(BindError::NoRule {
            kind: ActionKind::Call,
            detail: format!("{} is not callable", args[0].kind()),
        });
    };
    let native = native.clone();
    let guard_native = native.clone();
    Ok(Rule::new(
        move |args| {
            args.len() == expected
                && matches!(&args[0], Value::Native(n) if Arc::ptr_eq(n, &guard_native))
        },
        move |args| native.invoke(&args[1..]),
    ))
}

fn bind_get_member(get: GetMemberDescriptor, args: &[Value]) -> Result<Rule, BindError> {
    expect_args(ActionKind::GetMember, args, 1)?;
    match &args[0] {
        Value::Object(_) => Ok(Rule::new(
            |args| args.len() == 1 && args[0].kind() == ValueKind::Object,
            move |args| {
                let Some(object) = args[0].as_object() else {
                    return Ok(Value::Nil);
                };
                match object.get(get.name) {
                    Some(Value::Native(method)) if get.bound => Ok(bind_receiver(method, args[0].clone())),
                    Some(value) => Ok(value),
                    None if get.no_throw => Ok(Value::Nil),
                    None => Err(RuntimeError::MissingMember(get.name)),
                }
            },
        )),
        other if get.no_throw => {
            let kind = other.kind();
            Ok(Rule::new(
                move |args| args.len() == 1 && args[0].kind() == kind,
                |_| Ok(Value::Nil),
            ))
        }
        other => Err(BindError::NoRule {
            kind: ActionKind::GetMember,
            detail: format!("{} has no members", other.kind()),
        }),
    }
}

/// Native with `receiver` prepended to its arguments
fn bind_receiver(method: Arc<Native>, receiver: Value) -> Value {
    let arity = method.arity.map(|n| n.saturating_sub(1));
    let name = method.name;
    Value::Native(Native::new(name, arity, move |args| {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(receiver.clone());
        full.extend_from_slice(args);
        method.invoke(&full)
    }))
}

fn bind_set_member(set: SetMemberDescriptor, args: &[Value]) -> Result<Rule, BindError> {
    expect_args(ActionKind::SetMember, args, 2)?;
    if args[0].kind() != ValueKind::Object {
        return Err(BindError::NoRule {
            kind: ActionKind::SetMember,
            detail: format!("cannot set members on {}", args[0].kind()),
        });
    }
    Ok(Rule::new(
        |args| args.len() == 2 && args[0].kind() == ValueKind::Object,
        move |args| {
            if let Some(object) = args[0].as_object() {
                object.set(set.name, args[1].clone());
            }
            Ok(args[1].clone())
        },
    ))
}

fn bind_convert(convert: ConvertDescriptor, args: &[Value]) -> Result<Rule, BindError> {
    expect_args(ActionKind::Convert, args, 1)?;
    let from = args[0].kind();
    Ok(Rule::new(
        move |args| args.len() == 1 && args[0].kind() == from,
        move |args| {
            let outcome = DefaultBinder::convert(&args[0], &convert)?;
            Ok(outcome.into_sentinel(convert.target))
        },
    ))
}

fn convert_value(value: &Value, target: ValueKind, explicit: bool) -> Option<Value> {
    if value.kind() == target {
        return Some(value.clone());
    }
    let implicit = match (value, target) {
        (Value::Int(i), ValueKind::Float) => Some(Value::Float(*i as f64)),
        (Value::Bool(b), ValueKind::Int) => Some(Value::Int(i64::from(*b))),
        _ => None,
    };
    if implicit.is_some() || !explicit {
        return implicit;
    }
    match (value, target) {
        (Value::Float(f), ValueKind::Int) if f.is_finite() => Some(Value::Int(f.trunc() as i64)),
        (Value::Str(s), ValueKind::Int) => s.trim().parse().ok().map(Value::Int),
        (Value::Str(s), ValueKind::Float) => s.trim().parse().ok().map(Value::Float),
        (_, ValueKind::Bool) => Some(Value::Bool(value.is_truthy())),
        (Value::Nil, ValueKind::Str) => Some(Value::str("nil")),
        (Value::Bool(b), ValueKind::Str) => Some(Value::str(&b.to_string())),
        (Value::Int(i), ValueKind::Str) => Some(Value::str(&i.to_string())),
        (Value::Float(f), ValueKind::Str) => Some(Value::str(&f.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ArgumentShape, BinderRef, CallSite, ConversionResultKind};
    use crate::ident::intern;
    use crate::runtime::value::Object;

    fn binder() -> BinderRef {
        BinderRef::new(Arc::new(DefaultBinder::new()))
    }

    fn convert(value: Value, target: ValueKind, policy: ConversionResultKind) -> Result<ConversionOutcome, ConversionError> {
        DefaultBinder::convert(&value, &ConvertDescriptor { target, policy })
    }

    #[test]
    fn test_implicit_conversions() {
        assert_eq!(
            convert(Value::Int(2), ValueKind::Float, ConversionResultKind::ImplicitThrow).unwrap(),
            ConversionOutcome::Converted(Value::Float(2.0))
        );
        assert_eq!(
            convert(Value::Bool(true), ValueKind::Int, ConversionResultKind::ImplicitThrow).unwrap(),
            ConversionOutcome::Converted(Value::Int(1))
        );
    }

    #[test]
    fn test_lossy_conversion_needs_explicit_policy() {
        assert!(convert(Value::Float(2.7), ValueKind::Int, ConversionResultKind::ImplicitThrow).is_err());
        assert_eq!(
            convert(Value::Float(2.7), ValueKind::Int, ConversionResultKind::ImplicitTry).unwrap(),
            ConversionOutcome::NoConversion
        );
        assert_eq!(
            convert(Value::Float(2.7), ValueKind::Int, ConversionResultKind::ExplicitThrow).unwrap(),
            ConversionOutcome::Converted(Value::Int(2))
        );
        assert_eq!(
            convert(Value::str("41"), ValueKind::Int, ConversionResultKind::ExplicitTry).unwrap(),
            ConversionOutcome::Converted(Value::Int(41))
        );
        assert_eq!(
            convert(Value::str("x"), ValueKind::Int, ConversionResultKind::ExplicitTry).unwrap(),
            ConversionOutcome::NoConversion
        );
    }

    #[test]
    fn test_get_and_set_member_through_call_sites() {
        let b = binder();
        let name = intern("hp");
        let set = CallSite::with_capacity(ActionDescriptor::set_member(b.clone(), name), 4);
        let get = CallSite::with_capacity(ActionDescriptor::get_member(b.clone(), name, false, false), 4);

        let obj = Value::Object(Object::new(intern("Player")));
        set.invoke(&[obj.clone(), Value::Int(10)]).unwrap();
        assert_eq!(get.invoke(&[obj.clone()]).unwrap(), Value::Int(10));

        let missing = CallSite::with_capacity(
            ActionDescriptor::get_member(b.clone(), intern("mp"), false, false),
            4,
        );
        assert_eq!(
            missing.invoke(&[obj.clone()]).unwrap_err(),
            RuntimeError::MissingMember(intern("mp"))
        );

        let lenient = CallSite::with_capacity(
            ActionDescriptor::get_member(b, intern("mp"), false, true),
            4,
        );
        assert_eq!(lenient.invoke(&[obj]).unwrap(), Value::Nil);
        assert_eq!(lenient.invoke(&[Value::Int(3)]).unwrap(), Value::Nil);
    }

    #[test]
    fn test_call_native() {
        let b = binder();
        let add = Value::Native(Native::new(intern("add"), Some(2), |args| {
            match (&args[0], &args[1]) {
                (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
                _ => Err(RuntimeError::Native("ints only".into())),
            }
        }));
        let site = CallSite::with_capacity(ActionDescriptor::call(b, ArgumentShape::simple(2)), 4);
        assert_eq!(site.invoke(&[add.clone(), Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(3));
        assert_eq!(site.invoke(&[add, Value::Int(5), Value::Int(5)]).unwrap(), Value::Int(10));
        assert_eq!(site.stats().misses, 1);

        assert!(matches!(
            site.invoke(&[Value::Int(1), Value::Int(1), Value::Int(1)]),
            Err(RuntimeError::Bind(BindError::NoRule { kind: ActionKind::Call, .. }))
        ));
    }

    #[test]
    fn test_bound_member_captures_receiver() {
        let b = binder();
        let obj = Object::new(intern("Counter"));
        obj.set(intern("count"), Value::Int(3));
        obj.set(
            intern("get"),
            Value::Native(Native::new(intern("get"), Some(1), |args| {
                let this = args[0].as_object().ok_or_else(|| RuntimeError::Native("no receiver".into()))?;
                Ok(this.get(intern("count")).unwrap_or_default())
            })),
        );
        let get = CallSite::with_capacity(ActionDescriptor::get_member(b.clone(), intern("get"), true, false), 4);
        let method = get.invoke(&[Value::Object(obj)]).unwrap();
        let call = CallSite::with_capacity(ActionDescriptor::call(b, ArgumentShape::simple(0)), 4);
        assert_eq!(call.invoke(&[method]).unwrap(), Value::Int(3));
    }
}

//! Runtime values of the reference engine

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::error::RuntimeError;
use crate::ident::Identifier;

/// Host function callable through a Call descriptor
pub type NativeFn = dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync;

/// Dynamically typed value
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Object(Arc<Object>),
    Native(Arc<Native>),
}

/// Primitive kind of a [`Value`]; used as a conversion target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Nil,
    Bool,
    Int,
    Float,
    Str,
    Object,
    Native,
}

/// Object with identifier-keyed fields
pub struct Object {
    pub class: Identifier,
    fields: RwLock<HashMap<Identifier, Value>>,
}

/// Named host function
pub struct Native {
    pub name: Identifier,
    pub arity: Option<usize>,
    func: Box<NativeFn>,
}

impl Value {
    pub fn str(text: &str) -> Self {
        Value::Str(Arc::from(text))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Object(_) => ValueKind::Object,
            Value::Native(_) => ValueKind::Native,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Native(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl ValueKind {
    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Nil => "nil",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "str",
            ValueKind::Object => "object",
            ValueKind::Native => "native",
        }
    }

    /// Value a failed Try conversion historically produced
    pub fn default_value(&self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int => Value::Int(0),
            ValueKind::Float => Value::Float(0.0),
            ValueKind::Nil | ValueKind::Str | ValueKind::Object | ValueKind::Native => Value::Nil,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Object {
    pub fn new(class: Identifier) -> Arc<Self> {
        Arc::new(Self {
            class,
            fields: RwLock::new(HashMap::new()),
        })
    }

    pub fn get(&self, name: Identifier) -> Option<Value> {
        self.fields.read().get(&name).cloned()
    }

    pub fn set(&self, name: Identifier, value: Value) {
        self.fields.write().insert(name, value);
    }
}

impl Native {
    pub fn new<F>(name: Identifier, arity: Option<usize>, func: F) -> Arc<Self>
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            name,
            arity,
            func: Box::new(func),
        })
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        if let Some(arity) = self.arity {
            if args.len() != arity {
                return Err(RuntimeError::Arity {
                    name: self.name,
                    expected: arity,
                    actual: args.len(),
                });
            }
        }
        (self.func)(args)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(obj) => write!(f, "<{} object>", obj.class),
            Value::Native(native) => write!(f, "<native {}>", native.name),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::intern;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(3).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::Object(Object::new(intern("Point"))).is_truthy());
    }

    #[test]
    fn test_object_identity_equality() {
        let a = Object::new(intern("Point"));
        let b = Object::new(intern("Point"));
        assert_eq!(Value::Object(a.clone()), Value::Object(a));
        assert_ne!(
            Value::Object(b),
            Value::Object(Object::new(intern("Point")))
        );
    }

    #[test]
    fn test_native_arity_checked() {
        let native = Native::new(intern("one_arg"), Some(1), |args| Ok(args[0].clone()));
        assert_eq!(native.invoke(&[Value::Int(5)]).unwrap(), Value::Int(5));
        assert!(matches!(
            native.invoke(&[]),
            Err(RuntimeError::Arity { expected: 1, actual: 0, .. })
        ));
    }
}

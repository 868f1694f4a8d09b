//! The resolution seam: binders turn a descriptor plus arguments into a rule

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use thiserror::Error;

use super::{ActionDescriptor, ActionKind};
use crate::runtime::error::RuntimeError;
use crate::runtime::value::Value;

/// Resolution policy
///
/// A binder is consulted on every cache miss. It must not cache on its own
/// behalf; caching is the call site's job.
pub trait Binder: Send + Sync {
    fn bind(&self, descriptor: &ActionDescriptor, args: &[Value]) -> Result<Rule, BindError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    #[error("no {kind:?} rule applies: {detail}")]
    NoRule { kind: ActionKind, detail: String },

    #[error("{kind:?} expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        kind: ActionKind,
        expected: usize,
        actual: usize,
    },
}

/// Shared handle to a binder, compared by reference
///
/// Two descriptors built against different binder instances never compare
/// equal, even when the binders behave identically.
#[derive(Clone)]
pub struct BinderRef(Arc<dyn Binder>);

impl BinderRef {
    pub fn new(binder: Arc<dyn Binder>) -> Self {
        Self(binder)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }

    pub fn same(&self, other: &BinderRef) -> bool {
        self.addr() == other.addr()
    }

    pub fn bind(&self, descriptor: &ActionDescriptor, args: &[Value]) -> Result<Rule, BindError> {
        self.0.bind(descriptor, args)
    }
}

impl PartialEq for BinderRef {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for BinderRef {}

impl Hash for BinderRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (self.addr() as usize).hash(state);
    }
}

impl fmt::Debug for BinderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinderRef({:p})", self.addr())
    }
}

type Guard = dyn Fn(&[Value]) -> bool + Send + Sync;
type Target = dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync;

/// Executable binding produced by a binder
///
/// The guard decides whether the rule still applies to a new argument list;
/// the target performs the operation.
#[derive(Clone)]
pub struct Rule {
    guard: Arc<Guard>,
    target: Arc<Target>,
}

impl Rule {
    pub fn new<G, T>(guard: G, target: T) -> Self
    where
        G: Fn(&[Value]) -> bool + Send + Sync + 'static,
        T: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        Self {
            guard: Arc::new(guard),
            target: Arc::new(target),
        }
    }

    #[inline]
    pub fn applies(&self, args: &[Value]) -> bool {
        (self.guard)(args)
    }

    #[inline]
    pub fn invoke(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.target)(args)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").finish_non_exhaustive()
    }
}

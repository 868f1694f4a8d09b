//! Action descriptors
//!
//! An action descriptor is the cache key of a dynamic call site: a side-effect
//! free summary of *what kind* of late-bound operation is attempted, with no
//! reference to the concrete values involved. Two descriptors are equal when
//! their case, payload and binder identity are equal.
//!
//! ```text
//! call site ──(descriptor, args)──▶ Binder ──▶ Rule { guard, target }
//!     ▲                                             │
//!     └──────────── cached in CallSite ◀────────────┘
//! ```

mod binder;
mod call_site;
mod convert;

use serde::{Deserialize, Serialize};

use crate::ident::Identifier;
use crate::runtime::value::ValueKind;

pub use binder::{BindError, Binder, BinderRef, Rule};
pub use call_site::{CallSite, CallSiteStats};
pub use convert::{ConversionError, ConversionOutcome, ConversionResultKind};

/// How one argument is passed at a call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgumentKind {
    /// Plain positional argument
    Simple,
    /// Keyword argument
    Named(Identifier),
    /// Splatted sequence
    List,
    /// Splatted keyword mapping
    Dictionary,
    /// Receiver of a method call
    Instance,
    /// Trailing block argument
    Block,
}

/// Ordered argument kinds of a call
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ArgumentShape {
    kinds: Vec<ArgumentKind>,
}

impl ArgumentShape {
    pub fn new(kinds: Vec<ArgumentKind>) -> Self {
        Self { kinds }
    }

    /// `count` plain positional arguments
    pub fn simple(count: usize) -> Self {
        Self {
            kinds: vec![ArgumentKind::Simple; count],
        }
    }

    pub fn kinds(&self) -> &[ArgumentKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// True when every argument is a plain positional one
    pub fn is_simple(&self) -> bool {
        self.kinds.iter().all(|k| *k == ArgumentKind::Simple)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub shape: ArgumentShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GetMemberDescriptor {
    pub name: Identifier,
    /// Produce a bound member (receiver captured) rather than the raw one
    pub bound: bool,
    /// A missing member yields nil instead of failing
    pub no_throw: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetMemberDescriptor {
    pub name: Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvertDescriptor {
    pub target: ValueKind,
    pub policy: ConversionResultKind,
}

/// Case tag of an [`Action`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Call,
    GetMember,
    SetMember,
    Convert,
}

/// The {case, payload} part of a descriptor; serializable, binder-free
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum Action {
    Call(CallDescriptor),
    GetMember(GetMemberDescriptor),
    SetMember(SetMemberDescriptor),
    Convert(ConvertDescriptor),
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Call(_) => ActionKind::Call,
            Action::GetMember(_) => ActionKind::GetMember,
            Action::SetMember(_) => ActionKind::SetMember,
            Action::Convert(_) => ActionKind::Convert,
        }
    }
}

/// Immutable cache key of a dynamic operation
///
/// Descriptors are never mutated; a call site that needs a different shape
/// builds a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionDescriptor {
    action: Action,
    binder: BinderRef,
}

impl ActionDescriptor {
    /// Rebuild a descriptor from its {case, payload} and a resolution policy
    pub fn from_action(action: Action, binder: BinderRef) -> Self {
        Self { action, binder }
    }

    pub fn call(binder: BinderRef, shape: ArgumentShape) -> Self {
        Self::from_action(Action::Call(CallDescriptor { shape }), binder)
    }

    pub fn get_member(binder: BinderRef, name: Identifier, bound: bool, no_throw: bool) -> Self {
        Self::from_action(
            Action::GetMember(GetMemberDescriptor {
                name,
                bound,
                no_throw,
            }),
            binder,
        )
    }

    pub fn set_member(binder: BinderRef, name: Identifier) -> Self {
        Self::from_action(Action::SetMember(SetMemberDescriptor { name }), binder)
    }

    pub fn convert(binder: BinderRef, target: ValueKind, policy: ConversionResultKind) -> Self {
        Self::from_action(Action::Convert(ConvertDescriptor { target, policy }), binder)
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn binder(&self) -> &BinderRef {
        &self.binder
    }

    /// Member name for GetMember/SetMember descriptors
    pub fn member_name(&self) -> Option<Identifier> {
        match &self.action {
            Action::GetMember(d) => Some(d.name),
            Action::SetMember(d) => Some(d.name),
            _ => None,
        }
    }
}

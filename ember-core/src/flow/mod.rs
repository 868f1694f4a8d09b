//! Control-flow signal
//!
//! Every statement evaluates to a [`Signal`] that tells the dispatch loop what
//! to do next, so jumps and generator suspension never need unwinding.
//!
//! | signal           | dispatch loop                                        |
//! |------------------|------------------------------------------------------|
//! | `Fallthrough`    | advance to the textually next statement              |
//! | `Goto`           | continue at the statement bound to `label`           |
//! | `YieldReturn`    | suspend the generator, deliver the value             |
//! | `YieldBreak`     | finish iteration with no value                       |
//! | `NextForYield`   | resumed statement completed; advance                 |
//!
//! The constant-payload variants are unit variants and cost nothing to produce.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ident::{self, Identifier};
use crate::runtime::value::Value;

/// Jump target within one function
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label(Identifier);

impl Label {
    /// Function exit; a `Goto` here returns its value to the caller
    pub const RETURN: Label = Label(Identifier::EMPTY);

    /// Label named `name`; the empty name is [`Label::RETURN`]
    pub fn new(name: &str) -> Self {
        Label(ident::intern(name))
    }

    pub fn name(&self) -> Identifier {
        self.0
    }

    pub fn is_return(&self) -> bool {
        *self == Self::RETURN
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_return() {
            write!(f, "Label(<return>)")
        } else {
            write!(f, "Label({})", self.0)
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_return() {
            f.write_str("<return>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Result of evaluating one statement
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Signal {
    #[default]
    Fallthrough,
    Goto {
        label: Label,
        value: Option<Value>,
    },
    YieldReturn(Value),
    YieldBreak,
    NextForYield,
}

impl Signal {
    pub fn goto(label: Label) -> Self {
        Signal::Goto { label, value: None }
    }

    pub fn goto_with(label: Label, value: Value) -> Self {
        Signal::Goto {
            label,
            value: Some(value),
        }
    }

    /// `Goto` to the function exit carrying the return value
    pub fn ret(value: Value) -> Self {
        Self::goto_with(Label::RETURN, value)
    }

    pub fn yield_return(value: Value) -> Self {
        Signal::YieldReturn(value)
    }
}

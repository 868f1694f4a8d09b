//! Runtime errors of the reference engine

use thiserror::Error;

use crate::action::{BindError, ConversionError};
use crate::flow::Label;
use crate::ident::Identifier;
use crate::runtime::value::ValueKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("undefined function '{0}'")]
    UndefinedFunction(Identifier),

    #[error("'{name}' expects {expected} argument(s), got {actual}")]
    Arity {
        name: Identifier,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported operand kinds for {op}: {left} and {right}")]
    Operands {
        op: &'static str,
        left: ValueKind,
        right: ValueKind,
    },

    #[error("object has no member '{0}'")]
    MissingMember(Identifier),

    #[error("jump to unknown label '{0}'")]
    UnknownLabel(Label),

    #[error("call site #{0} does not exist")]
    UnknownCallSite(usize),

    #[error("local slot {0} does not exist")]
    UnknownSlot(usize),

    #[error("maximum recursion depth {0} exceeded")]
    RecursionLimit(usize),

    #[error("'{0}' is a generator and must be started with start_generator")]
    GeneratorCall(Identifier),

    #[error("'{0}' is not a generator")]
    NotAGenerator(Identifier),

    #[error("generator has already finished")]
    GeneratorFinished,

    #[error("yield outside of a generator")]
    YieldOutsideGenerator,

    #[error("binding failed: {0}")]
    Bind(#[from] BindError),

    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("{0}")]
    Native(String),
}

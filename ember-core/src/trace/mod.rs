//! Trace pipeline
//!
//! ```text
//! engine ──RawTraceEvent──▶ TraceSession ──TraceEvent──▶ user callback
//!   ▲                           │
//!   └──── set_next_statement ◀──┘ try_set_next_statement(file, span)
//! ```
//!
//! The engine knows frames and sequence-point indices; the session translates
//! them into file/span coordinates and a lazily built locals view.

mod debug_info;
mod engine;
mod session;

use thiserror::Error;

pub use debug_info::{
    DebugSourceFile, FunctionInfo, SequencePoint, SourceLocation, SourceSpan, VariableInfo,
};
pub use engine::{RawTraceEvent, RawTraceHandler, TraceEngine, TraceEventKind, TraceHandlerSlot};
pub use session::{TraceCallback, TraceEvent, TraceSession};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceError {
    /// The engine already has a trace handler
    #[error("a trace pipeline is already attached to this engine")]
    AlreadyAttached,

    #[error("pipeline closed")]
    Closed,
}

//! Ember Core - dynamic-language runtime core
//!
//! # Modules
//!
//! - `ident`: process-wide identifier interning
//! - `action`: action descriptors, binders and call-site caches
//! - `flow`: control-flow signals for the statement dispatcher
//! - `frame`: activation records and variable views
//! - `trace`: debug info and the trace session
//! - `runtime`: the reference interpreter

pub mod action;
pub mod flow;
pub mod frame;
pub mod ident;
pub mod runtime;
pub mod trace;

pub use action::{
    Action, ActionDescriptor, ActionKind, ArgumentKind, ArgumentShape, BindError, Binder,
    BinderRef, CallSite, CallSiteStats, ConversionError, ConversionOutcome, ConversionResultKind,
    Rule,
};
pub use flow::{Label, Signal};
pub use frame::{Frame, FrameVariableView, FrameViewError, Slot};
pub use ident::{Identifier, IdentifierTable};
pub use runtime::{
    DefaultBinder, Expr, Function, FunctionBuilder, Generator, GeneratorState, Interpreter,
    RuntimeError, Stmt, Value, ValueKind,
};
pub use trace::{
    DebugSourceFile, FunctionInfo, RawTraceEvent, RawTraceHandler, SequencePoint, SourceLocation,
    SourceSpan, TraceCallback, TraceEngine, TraceError, TraceEvent, TraceEventKind, TraceSession,
    VariableInfo,
};

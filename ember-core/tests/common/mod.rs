//! Shared helpers for the trace and engine tests

#![allow(dead_code)]

use std::sync::Arc;

use ember_core::ident;
use ember_core::{
    FunctionBuilder, Interpreter, TraceEvent, TraceEventKind, TraceSession, Value,
};
use parking_lot::Mutex;

/// What a recording callback keeps from each event
#[derive(Debug, Clone, PartialEq)]
pub struct Seen {
    pub kind: TraceEventKind,
    pub function: Option<String>,
    /// Start line of the event's span, if it has a location
    pub line: Option<u32>,
    pub payload: Option<Value>,
}

impl Seen {
    pub fn from_event(event: &TraceEvent) -> Self {
        Self {
            kind: event.kind,
            function: event
                .function_name
                .and_then(ident::resolve)
                .map(|name| name.to_string()),
            line: event.span.is_valid().then_some(event.span.start.line),
            payload: event.payload.clone(),
        }
    }
}

pub type Log = Arc<Mutex<Vec<Seen>>>;

/// Install a callback that appends every event to the returned log
pub fn record(session: &TraceSession) -> Log {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    session
        .set_trace_callback(Some(Arc::new(move |event: &TraceEvent| {
            sink.lock().push(Seen::from_event(event));
        })))
        .unwrap();
    log
}

pub fn kinds(log: &Log) -> Vec<TraceEventKind> {
    log.lock().iter().map(|seen| seen.kind).collect()
}

/// Lines of the step events, in order
pub fn step_lines(log: &Log) -> Vec<u32> {
    log.lock()
        .iter()
        .filter(|seen| seen.kind == TraceEventKind::TracePoint)
        .filter_map(|seen| seen.line)
        .collect()
}

/// Build and register a function whose first statement sits on `line`
pub fn define(
    interp: &Interpreter,
    name: &str,
    file: &str,
    line: u32,
    body: impl FnOnce(&mut FunctionBuilder),
) {
    let mut builder = interp.function_builder(name, file);
    builder.starting_line(line);
    body(&mut builder);
    interp.define(builder.build().unwrap());
}

//! What the trace pipeline needs from an execution engine

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DebugSourceFile, FunctionInfo, TraceError};
use crate::frame::Frame;
use crate::runtime::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TraceEventKind {
    FrameEnter,
    FrameExit,
    ThreadExit,
    /// A statement is about to execute
    TracePoint,
    Exception,
    ExceptionUnwind,
}

impl TraceEventKind {
    /// Events forwarded without frame or location resolution
    pub fn is_exit(&self) -> bool {
        matches!(self, TraceEventKind::FrameExit | TraceEventKind::ThreadExit)
    }
}

/// Event as raised by the engine on the firing thread
#[derive(Debug, Clone)]
pub struct RawTraceEvent {
    pub kind: TraceEventKind,
    pub thread: ThreadId,
    /// Absent for `ThreadExit`
    pub function: Option<Arc<FunctionInfo>>,
    pub sequence_point: Option<usize>,
    pub stack_depth: usize,
    pub payload: Option<Value>,
}

pub trait RawTraceHandler: Send + Sync {
    fn on_trace_event(&self, event: &RawTraceEvent);
}

/// Engine-side hooks used by [`TraceSession`](super::TraceSession)
pub trait TraceEngine: Send + Sync {
    /// Fails with [`TraceError::AlreadyAttached`] if a handler is registered
    fn register_trace_handler(&self, handler: Arc<dyn RawTraceHandler>) -> Result<(), TraceError>;

    fn unregister_trace_handler(&self);

    fn set_full_instrumentation(&self, enabled: bool);

    /// Innermost active frame of `thread`
    fn leaf_frame(&self, thread: ThreadId) -> Option<Arc<Frame>>;

    fn lookup_source_file(&self, name: &str) -> Option<Arc<DebugSourceFile>>;
}

/// Single-handler registration cell for engines
#[derive(Default)]
pub struct TraceHandlerSlot {
    handler: RwLock<Option<Arc<dyn RawTraceHandler>>>,
}

impl TraceHandlerSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn RawTraceHandler>) -> Result<(), TraceError> {
        let mut slot = self.handler.write();
        if slot.is_some() {
            debug!(target: "ember::trace", "handler registration rejected");
            return Err(TraceError::AlreadyAttached);
        }
        *slot = Some(handler);
        Ok(())
    }

    pub fn unregister(&self) {
        self.handler.write().take();
    }

    pub fn is_registered(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Cloned out so no lock is held while the handler runs
    pub fn current(&self) -> Option<Arc<dyn RawTraceHandler>> {
        self.handler.read().clone()
    }
}

impl fmt::Debug for TraceHandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceHandlerSlot")
            .field("registered", &self.is_registered())
            .finish()
    }
}

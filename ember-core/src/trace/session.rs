//! Trace session: turns raw engine events into source-level events

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use ember_config::TraceConfig;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::engine::{RawTraceEvent, RawTraceHandler, TraceEngine, TraceEventKind};
use super::{SourceSpan, TraceError};
use crate::frame::{Frame, FrameVariableView};
use crate::ident::Identifier;
use crate::runtime::value::Value;

/// User observer of trace events
pub trait TraceCallback: Send + Sync {
    fn on_trace(&self, event: &TraceEvent);
}

impl<F> TraceCallback for F
where
    F: Fn(&TraceEvent) + Send + Sync,
{
    fn on_trace(&self, event: &TraceEvent) {
        self(event)
    }
}

/// Source-level trace event handed to the callback
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub kind: TraceEventKind,
    pub thread: ThreadId,
    /// Absent for `ThreadExit`
    pub function_name: Option<Identifier>,
    pub file: Option<Arc<str>>,
    /// `SourceSpan::NONE` when no location applies
    pub span: SourceSpan,
    pub payload: Option<Value>,
    pub function_payload: Option<Value>,
    frame: Option<Arc<Frame>>,
}

impl TraceEvent {
    /// Live view over the frame's locals; built on each call
    pub fn locals(&self) -> Option<FrameVariableView> {
        self.frame.as_ref().map(|frame| frame.locals_view())
    }

    pub fn frame(&self) -> Option<&Arc<Frame>> {
        self.frame.as_ref()
    }
}

type CurrentFrames = RwLock<HashMap<ThreadId, Arc<Frame>>>;

struct Shared {
    engine: Arc<dyn TraceEngine>,
    config: TraceConfig,
    callback: RwLock<Option<Arc<dyn TraceCallback>>>,
    current: CurrentFrames,
    closed: AtomicBool,
}

/// Registered with the engine; weak so the engine never keeps a session alive
struct SessionHandler(Weak<Shared>);

impl RawTraceHandler for SessionHandler {
    fn on_trace_event(&self, event: &RawTraceEvent) {
        if let Some(shared) = self.0.upgrade() {
            shared.dispatch(event);
        }
    }
}

/// Makes `frame` the thread's current frame until dropped
struct CurrentFrameGuard<'a> {
    frames: &'a CurrentFrames,
    thread: ThreadId,
    previous: Option<Arc<Frame>>,
}

impl<'a> CurrentFrameGuard<'a> {
    fn enter(frames: &'a CurrentFrames, thread: ThreadId, frame: Arc<Frame>) -> Self {
        let previous = frames.write().insert(thread, frame);
        Self {
            frames,
            thread,
            previous,
        }
    }
}

impl Drop for CurrentFrameGuard<'_> {
    fn drop(&mut self) {
        let mut frames = self.frames.write();
        match self.previous.take() {
            Some(frame) => {
                frames.insert(self.thread, frame);
            }
            None => {
                frames.remove(&self.thread);
            }
        }
    }
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), TraceError> {
        if self.is_closed() {
            Err(TraceError::Closed)
        } else {
            Ok(())
        }
    }

    fn deliver(&self, event: TraceEvent) {
        let callback = self.callback.read().clone();
        match callback {
            Some(callback) => callback.on_trace(&event),
            None => trace!(target: "ember::trace", kind = ?event.kind, "no callback, event dropped"),
        }
    }

    fn dispatch(&self, raw: &RawTraceEvent) {
        if self.is_closed() {
            return;
        }
        match raw.kind {
            TraceEventKind::FrameEnter if !self.config.forward_frame_enter => return,
            TraceEventKind::ExceptionUnwind if !self.config.forward_exception_unwind => return,
            _ => {}
        }

        if raw.kind.is_exit() {
            let function_name = match raw.kind {
                TraceEventKind::FrameExit => raw.function.as_ref().map(|f| f.name()),
                _ => None,
            };
            self.deliver(TraceEvent {
                kind: raw.kind,
                thread: raw.thread,
                function_name,
                file: None,
                span: SourceSpan::NONE,
                payload: raw.payload.clone(),
                function_payload: None,
                frame: None,
            });
            return;
        }

        let frame = self.engine.leaf_frame(raw.thread);
        let _guard = frame
            .clone()
            .map(|frame| CurrentFrameGuard::enter(&self.current, raw.thread, frame));
        if frame.is_none() {
            debug!(target: "ember::trace", kind = ?raw.kind, "no leaf frame for event");
        }

        let function = raw
            .function
            .clone()
            .or_else(|| frame.as_ref().map(|f| f.function().clone()));
        let span = match (&function, raw.sequence_point) {
            (Some(function), Some(index)) => function
                .sequence_point(index)
                .map(|sp| sp.span)
                .unwrap_or(SourceSpan::NONE),
            _ => SourceSpan::NONE,
        };

        self.deliver(TraceEvent {
            kind: raw.kind,
            thread: raw.thread,
            function_name: function.as_ref().map(|f| f.name()),
            file: function.as_ref().map(|f| f.file().clone()),
            span,
            payload: raw.payload.clone(),
            function_payload: function.as_ref().and_then(|f| f.custom_payload().cloned()),
            frame,
        });
    }
}

/// A debugger's connection to one engine
///
/// At most one session is attached to an engine at a time. Dropping an open
/// session closes it.
pub struct TraceSession {
    shared: Arc<Shared>,
}

impl TraceSession {
    pub fn attach(engine: Arc<dyn TraceEngine>) -> Result<Self, TraceError> {
        Self::attach_with_config(engine, TraceConfig::default())
    }

    pub fn attach_with_config(
        engine: Arc<dyn TraceEngine>,
        config: TraceConfig,
    ) -> Result<Self, TraceError> {
        let shared = Arc::new(Shared {
            engine,
            config,
            callback: RwLock::new(None),
            current: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        let handler = Arc::new(SessionHandler(Arc::downgrade(&shared)));
        shared.engine.register_trace_handler(handler)?;
        shared.engine.set_full_instrumentation(true);
        debug!(target: "ember::trace", "session attached");
        Ok(Self { shared })
    }

    pub fn config(&self) -> &TraceConfig {
        &self.shared.config
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn set_trace_callback(
        &self,
        callback: Option<Arc<dyn TraceCallback>>,
    ) -> Result<(), TraceError> {
        self.shared.ensure_open()?;
        *self.shared.callback.write() = callback;
        Ok(())
    }

    pub fn trace_callback(&self) -> Result<Option<Arc<dyn TraceCallback>>, TraceError> {
        self.shared.ensure_open()?;
        Ok(self.shared.callback.read().clone())
    }

    /// Frame whose event is being delivered on the calling thread
    pub fn current_frame(&self) -> Result<Option<Arc<Frame>>, TraceError> {
        self.shared.ensure_open()?;
        Ok(self.shared.current.read().get(&thread::current().id()).cloned())
    }

    /// Redirect the calling thread's current frame to the statement at `span`
    ///
    /// Only meaningful from inside a callback. Returns `Ok(false)` when the
    /// target cannot be resolved within the current frame's function.
    pub fn try_set_next_statement(&self, file: &str, span: SourceSpan) -> Result<bool, TraceError> {
        self.shared.ensure_open()?;
        if !span.is_valid() {
            return Ok(false);
        }
        let Some(source) = self.shared.engine.lookup_source_file(file) else {
            debug!(target: "ember::trace", file, "unknown source file");
            return Ok(false);
        };
        let Some(frame) = self.shared.current.read().get(&thread::current().id()).cloned() else {
            return Ok(false);
        };
        let Some(function) = source.function_at(&span) else {
            return Ok(false);
        };
        if !Arc::ptr_eq(&function, frame.function()) {
            debug!(
                target: "ember::trace",
                target_function = %function.name(),
                current = %frame.function().name(),
                "refusing cross-function redirect"
            );
            return Ok(false);
        }
        let Some(index) = function.sequence_point_at(&span) else {
            return Ok(false);
        };
        frame.set_next_statement(index);
        Ok(true)
    }

    pub fn close(&self) -> Result<(), TraceError> {
        self.shared
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TraceError::Closed)?;
        self.shared.engine.unregister_trace_handler();
        self.shared.engine.set_full_instrumentation(false);
        self.shared.callback.write().take();
        debug!(target: "ember::trace", "session closed");
        Ok(())
    }
}

impl Drop for TraceSession {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.close();
        }
    }
}

impl fmt::Debug for TraceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceSession")
            .field("config", &self.shared.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

//! Tree-walking reference engine
//!
//! Statements are dispatched in a loop driven by [`Signal`]s; a function call
//! activates a new [`Frame`] on the calling thread's stack. When a trace
//! handler is registered and full instrumentation is on, every statement is
//! preceded by a `TracePoint` event and pending redirects are honoured there.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use ember_config::EmberConfig;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::action::BinderRef;
use crate::flow::Signal;
use crate::frame::{new_slot, Frame, Slot};
use crate::ident::{self, Identifier};
use crate::runtime::ast::{Expr, Stmt};
use crate::runtime::binder::DefaultBinder;
use crate::runtime::error::RuntimeError;
use crate::runtime::function::{Function, FunctionBuilder};
use crate::runtime::value::Value;
use crate::trace::{
    DebugSourceFile, RawTraceEvent, RawTraceHandler, TraceEngine, TraceError, TraceEventKind,
    TraceHandlerSlot,
};

type FrameStacks = RwLock<HashMap<ThreadId, Vec<Arc<Frame>>>>;

/// How a function body stopped
#[derive(Debug)]
enum Exit {
    Return(Value),
    Yield { value: Value, at: usize },
    Finished,
}

/// Error on its way out of a frame
enum Fault {
    /// Failed in this frame; not yet reported
    Raised(RuntimeError),
    /// Came out of a callee that already reported it
    Unwinding(RuntimeError),
}

impl From<RuntimeError> for Fault {
    fn from(err: RuntimeError) -> Self {
        Fault::Raised(err)
    }
}

impl Fault {
    fn into_error(self) -> RuntimeError {
        match self {
            Fault::Raised(err) | Fault::Unwinding(err) => err,
        }
    }
}

/// Pushes a frame on the thread's stack; pops and retires it on drop
struct StackEntry<'a> {
    stacks: &'a FrameStacks,
    thread: ThreadId,
}

impl<'a> StackEntry<'a> {
    fn push(stacks: &'a FrameStacks, thread: ThreadId, frame: Arc<Frame>) -> Self {
        stacks.write().entry(thread).or_default().push(frame);
        Self { stacks, thread }
    }
}

impl Drop for StackEntry<'_> {
    fn drop(&mut self) {
        let mut stacks = self.stacks.write();
        if let Some(stack) = stacks.get_mut(&self.thread) {
            if let Some(frame) = stack.pop() {
                frame.mark_exited();
            }
            if stack.is_empty() {
                stacks.remove(&self.thread);
            }
        }
    }
}

pub struct Interpreter {
    config: EmberConfig,
    binder: BinderRef,
    functions: RwLock<HashMap<Identifier, Arc<Function>>>,
    files: RwLock<HashMap<Arc<str>, Arc<DebugSourceFile>>>,
    handler: TraceHandlerSlot,
    instrumented: AtomicBool,
    stacks: FrameStacks,
}

impl Interpreter {
    pub fn new() -> Arc<Self> {
        Self::with_config(EmberConfig::default())
    }

    pub fn with_config(config: EmberConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            binder: BinderRef::new(Arc::new(DefaultBinder::new())),
            functions: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            handler: TraceHandlerSlot::new(),
            instrumented: AtomicBool::new(false),
            stacks: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EmberConfig {
        &self.config
    }

    /// Binder used for descriptors of this engine's call sites
    pub fn binder(&self) -> BinderRef {
        self.binder.clone()
    }

    /// Builder preconfigured with this engine's cache settings
    pub fn function_builder(&self, name: &str, file: &str) -> FunctionBuilder {
        let mut builder = FunctionBuilder::new(name, file);
        builder.with_cache(self.config.cache.clone());
        builder
    }

    /// Register a function and its debug information
    pub fn define(&self, function: Arc<Function>) {
        let info = function.info().clone();
        let file = {
            let mut files = self.files.write();
            files
                .entry(info.file().clone())
                .or_insert_with(|| DebugSourceFile::new(info.file()))
                .clone()
        };
        if let Some(previous) = self.functions.write().insert(function.name(), function) {
            file.remove_function(previous.info());
        }
        file.add_function(info.clone());
        debug!(target: "ember::interp", function = %info.name(), file = %info.file(), "function defined");
    }

    pub fn function(&self, name: &str) -> Option<Arc<Function>> {
        self.lookup(ident::intern(name)).ok()
    }

    fn lookup(&self, name: Identifier) -> Result<Arc<Function>, RuntimeError> {
        self.functions
            .read()
            .get(&name)
            .cloned()
            .ok_or(RuntimeError::UndefinedFunction(name))
    }

    pub fn is_instrumented(&self) -> bool {
        self.instrumented.load(Ordering::Acquire)
    }

    /// Active frames on the calling thread
    pub fn stack_depth(&self) -> usize {
        self.stacks
            .read()
            .get(&thread::current().id())
            .map_or(0, Vec::len)
    }

    /// Run `name` to completion on the calling thread
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let function = self.lookup(ident::intern(name))?;
        debug!(target: "ember::interp", function = name, argc = args.len(), "call");
        self.invoke(&function, args)
    }

    /// Create a suspended generator; nothing runs until the first resume
    pub fn start_generator(
        self: &Arc<Self>,
        name: &str,
        args: &[Value],
    ) -> Result<Generator, RuntimeError> {
        let function = self.lookup(ident::intern(name))?;
        if !function.is_generator() {
            return Err(RuntimeError::NotAGenerator(function.name()));
        }
        let slots = Self::bind_params(&function, args)?;
        Ok(Generator {
            interp: self.clone(),
            function,
            slots,
            state: GeneratorState::Created,
        })
    }

    /// Report that the calling thread is done running code
    pub fn finish_thread(&self) {
        let thread = thread::current().id();
        self.stacks.write().remove(&thread);
        debug!(target: "ember::interp", ?thread, "thread exit");
        self.emit(RawTraceEvent {
            kind: TraceEventKind::ThreadExit,
            thread,
            function: None,
            sequence_point: None,
            stack_depth: 0,
            payload: None,
        });
    }

    // ==================== activation ====================

    fn bind_params(function: &Function, args: &[Value]) -> Result<Vec<Slot>, RuntimeError> {
        if args.len() != function.params() {
            return Err(RuntimeError::Arity {
                name: function.name(),
                expected: function.params(),
                actual: args.len(),
            });
        }
        Ok((0..function.slot_count())
            .map(|i| new_slot(args.get(i).cloned().unwrap_or_default()))
            .collect())
    }

    fn check_depth(&self) -> Result<usize, RuntimeError> {
        let depth = self.stack_depth();
        let limit = self.config.limits.max_recursion_depth;
        if depth >= limit {
            return Err(RuntimeError::RecursionLimit(limit));
        }
        Ok(depth)
    }

    /// Validate and run a non-generator function
    fn invoke(&self, function: &Arc<Function>, args: &[Value]) -> Result<Value, RuntimeError> {
        if function.is_generator() {
            return Err(RuntimeError::GeneratorCall(function.name()));
        }
        let slots = Self::bind_params(function, args)?;
        let depth = self.check_depth()?;
        match self.activate(function, slots, depth, 0, None)? {
            Exit::Return(value) => Ok(value),
            Exit::Finished => Ok(Value::Nil),
            Exit::Yield { .. } => Err(RuntimeError::YieldOutsideGenerator),
        }
    }

    fn activate(
        &self,
        function: &Arc<Function>,
        slots: Vec<Slot>,
        depth: usize,
        start: usize,
        resume: Option<Value>,
    ) -> Result<Exit, RuntimeError> {
        let thread = thread::current().id();
        let frame = Frame::with_slots(function.info().clone(), slots, depth);
        frame.set_position(start);
        let _entry = StackEntry::push(&self.stacks, thread, frame.clone());

        self.raise(TraceEventKind::FrameEnter, &frame, Some(start), None);
        let result = self.run(function, &frame, start, resume);

        let exit_payload = match &result {
            Ok(Exit::Return(value)) => Some(value.clone()),
            Ok(_) => None,
            Err(fault) => {
                let err = match fault {
                    Fault::Raised(err) | Fault::Unwinding(err) => err,
                };
                let payload = Some(Value::str(&err.to_string()));
                self.raise(
                    TraceEventKind::ExceptionUnwind,
                    &frame,
                    Some(frame.position()),
                    payload,
                );
                None
            }
        };
        self.raise(TraceEventKind::FrameExit, &frame, None, exit_payload);
        result.map_err(Fault::into_error)
    }

    // ==================== dispatch ====================

    fn run(
        &self,
        function: &Function,
        frame: &Arc<Frame>,
        start: usize,
        mut resume: Option<Value>,
    ) -> Result<Exit, Fault> {
        let len = function.body().len();
        let mut pc = start;

        while pc < len {
            frame.set_position(pc);
            if self.is_instrumented() {
                let landed = self.step(frame, pc, len);
                if landed != pc {
                    resume = None;
                    pc = landed;
                }
            }

            let signal = match self.exec(function, frame, pc, resume.take()) {
                Ok(signal) => signal,
                Err(Fault::Raised(err)) => {
                    let payload = Some(Value::str(&err.to_string()));
                    self.raise(TraceEventKind::Exception, frame, Some(pc), payload);
                    return Err(Fault::Raised(err));
                }
                Err(fault) => return Err(fault),
            };
            trace!(target: "ember::flow", pc, ?signal, "statement done");

            match signal {
                Signal::Fallthrough | Signal::NextForYield => pc += 1,
                Signal::Goto { label, value } => {
                    if label.is_return() {
                        return Ok(Exit::Return(value.unwrap_or_default()));
                    }
                    pc = function
                        .label_index(label)
                        .ok_or(RuntimeError::UnknownLabel(label))?;
                }
                Signal::YieldReturn(value) => return Ok(Exit::Yield { value, at: pc }),
                Signal::YieldBreak => return Ok(Exit::Finished),
            }
        }

        Ok(if function.is_generator() {
            Exit::Finished
        } else {
            Exit::Return(Value::Nil)
        })
    }

    /// Report the step at `pc`, following redirects; returns where execution lands
    fn step(&self, frame: &Arc<Frame>, mut pc: usize, len: usize) -> usize {
        loop {
            frame.set_position(pc);
            self.raise(TraceEventKind::TracePoint, frame, Some(pc), None);
            match frame.take_redirect() {
                Some(target) if target < len => {
                    debug!(target: "ember::interp", from = pc, to = target, "redirected");
                    pc = target;
                }
                Some(target) => {
                    debug!(target: "ember::interp", to = target, "redirect out of range ignored");
                    return pc;
                }
                None => return pc,
            }
        }
    }

    fn exec(
        &self,
        function: &Function,
        frame: &Arc<Frame>,
        pc: usize,
        resumed: Option<Value>,
    ) -> Result<Signal, Fault> {
        let Some(stmt) = function.body().get(pc) else {
            return Ok(Signal::Fallthrough);
        };
        let signal = match stmt {
            // ===== plain =====
            Stmt::Expr(expr) => {
                self.eval(function, frame, expr)?;
                Signal::Fallthrough
            }
            Stmt::Assign { slot, value } => {
                let value = self.eval(function, frame, value)?;
                if !frame.store(*slot, value) {
                    return Err(RuntimeError::UnknownSlot(*slot).into());
                }
                Signal::Fallthrough
            }
            Stmt::Label(_) => Signal::Fallthrough,

            // ===== jumps =====
            Stmt::Goto { label, value } => {
                let value = match value {
                    Some(expr) => Some(self.eval(function, frame, expr)?),
                    None => None,
                };
                Signal::Goto {
                    label: *label,
                    value,
                }
            }
            Stmt::GotoUnless { cond, label } => {
                if self.eval(function, frame, cond)?.is_truthy() {
                    Signal::Fallthrough
                } else {
                    Signal::goto(*label)
                }
            }
            Stmt::Return(expr) => Signal::ret(self.eval(function, frame, expr)?),

            // ===== generators =====
            Stmt::Yield { value, store } => {
                if !function.is_generator() {
                    return Err(RuntimeError::YieldOutsideGenerator.into());
                }
                match resumed {
                    Some(sent) => {
                        if let Some(slot) = store {
                            if !frame.store(*slot, sent) {
                                return Err(RuntimeError::UnknownSlot(*slot).into());
                            }
                        }
                        Signal::NextForYield
                    }
                    None => Signal::yield_return(self.eval(function, frame, value)?),
                }
            }
            Stmt::YieldBreak => {
                if !function.is_generator() {
                    return Err(RuntimeError::YieldOutsideGenerator.into());
                }
                Signal::YieldBreak
            }
        };
        Ok(signal)
    }

    fn eval(&self, function: &Function, frame: &Arc<Frame>, expr: &Expr) -> Result<Value, Fault> {
        match expr {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Local(slot) => Ok(frame.load(*slot).ok_or(RuntimeError::UnknownSlot(*slot))?),
            Expr::Add(left, right) => {
                let left = self.eval(function, frame, left)?;
                let right = self.eval(function, frame, right)?;
                Ok(add(&left, &right)?)
            }
            Expr::Less(left, right) => {
                let left = self.eval(function, frame, left)?;
                let right = self.eval(function, frame, right)?;
                Ok(less(&left, &right)?)
            }
            Expr::Call(name, args) => {
                let callee = self.lookup(*name)?;
                if callee.is_generator() {
                    return Err(RuntimeError::GeneratorCall(*name).into());
                }
                let args = self.eval_all(function, frame, args)?;
                let slots = Self::bind_params(&callee, &args)?;
                let depth = self.check_depth()?;
                match self
                    .activate(&callee, slots, depth, 0, None)
                    .map_err(Fault::Unwinding)?
                {
                    Exit::Return(value) => Ok(value),
                    _ => Ok(Value::Nil),
                }
            }
            Expr::Dynamic(index, args) => {
                let site = function
                    .call_site(*index)
                    .ok_or(RuntimeError::UnknownCallSite(*index))?;
                let args = self.eval_all(function, frame, args)?;
                Ok(site.invoke(&args)?)
            }
        }
    }

    fn eval_all(&self, function: &Function, frame: &Arc<Frame>, exprs: &[Expr]) -> Result<Vec<Value>, Fault> {
        exprs.iter().map(|e| self.eval(function, frame, e)).collect()
    }

    // ==================== events ====================

    fn raise(&self, kind: TraceEventKind, frame: &Frame, sequence_point: Option<usize>, payload: Option<Value>) {
        self.emit(RawTraceEvent {
            kind,
            thread: thread::current().id(),
            function: Some(frame.function().clone()),
            sequence_point,
            stack_depth: frame.depth() + 1,
            payload,
        });
    }

    fn emit(&self, event: RawTraceEvent) {
        if !self.is_instrumented() {
            return;
        }
        if let Some(handler) = self.handler.current() {
            trace!(target: "ember::interp", kind = ?event.kind, "raising trace event");
            handler.on_trace_event(&event);
        }
    }
}

impl TraceEngine for Interpreter {
    fn register_trace_handler(&self, handler: Arc<dyn RawTraceHandler>) -> Result<(), TraceError> {
        self.handler.register(handler)
    }

    fn unregister_trace_handler(&self) {
        self.handler.unregister();
    }

    fn set_full_instrumentation(&self, enabled: bool) {
        debug!(target: "ember::interp", enabled, "full instrumentation");
        self.instrumented.store(enabled, Ordering::Release);
    }

    fn leaf_frame(&self, thread: ThreadId) -> Option<Arc<Frame>> {
        self.stacks
            .read()
            .get(&thread)
            .and_then(|stack| stack.last().cloned())
    }

    fn lookup_source_file(&self, name: &str) -> Option<Arc<DebugSourceFile>> {
        self.files.read().get(name).cloned()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("functions", &self.functions.read().len())
            .field("files", &self.files.read().len())
            .field("instrumented", &self.is_instrumented())
            .field("handler", &self.handler)
            .finish()
    }
}

fn add(left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(*a as f64 + b)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + *b as f64)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::str(&format!("{a}{b}"))),
        _ => Err(RuntimeError::Operands {
            op: "+",
            left: left.kind(),
            right: right.kind(),
        }),
    }
}

fn less(left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    let result = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a < b,
        (Value::Int(a), Value::Float(b)) => (*a as f64) < *b,
        (Value::Float(a), Value::Int(b)) => *a < *b as f64,
        (Value::Float(a), Value::Float(b)) => a < b,
        (Value::Str(a), Value::Str(b)) => a < b,
        _ => {
            return Err(RuntimeError::Operands {
                op: "<",
                left: left.kind(),
                right: right.kind(),
            })
        }
    };
    Ok(Value::Bool(result))
}

// ==================== generators ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Created,
    /// Suspended at the yield statement with this index
    Suspended(usize),
    Finished,
}

/// A started generator function
///
/// Locals live in shared slots that outlast each activation; every resume
/// pushes a fresh frame over them.
pub struct Generator {
    interp: Arc<Interpreter>,
    function: Arc<Function>,
    slots: Vec<Slot>,
    state: GeneratorState,
}

impl Generator {
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Run until the next yield; `Ok(None)` once the body finishes
    ///
    /// `sent` becomes the value of the suspended yield statement and is
    /// ignored on the first resume.
    pub fn resume(&mut self, sent: Option<Value>) -> Result<Option<Value>, RuntimeError> {
        let (start, resumed) = match self.state {
            GeneratorState::Created => (0, None),
            GeneratorState::Suspended(at) => (at, Some(sent.unwrap_or_default())),
            GeneratorState::Finished => return Err(RuntimeError::GeneratorFinished),
        };
        let depth = self.interp.check_depth()?;
        let result = self
            .interp
            .activate(&self.function, self.slots.clone(), depth, start, resumed);

        match result {
            Ok(Exit::Yield { value, at }) => {
                self.state = GeneratorState::Suspended(at);
                Ok(Some(value))
            }
            Ok(Exit::Return(_)) | Ok(Exit::Finished) => {
                self.state = GeneratorState::Finished;
                Ok(None)
            }
            Err(err) => {
                self.state = GeneratorState::Finished;
                Err(err)
            }
        }
    }
}

impl Iterator for Generator {
    type Item = Result<Value, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == GeneratorState::Finished {
            return None;
        }
        self.resume(None).transpose()
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("function", &self.function.name())
            .field("state", &self.state)
            .finish()
    }
}

//! Activation records and the fixed-length variable view over them
//!
//! Slots are shared cells: a [`FrameVariableView`] and the running frame see
//! the same storage, so a write through the view is visible to the frame's
//! next read of that slot and vice versa.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, trace};

use crate::ident::Identifier;
use crate::runtime::value::Value;
use crate::trace::FunctionInfo;

/// Storage cell for one local
pub type Slot = Arc<RwLock<Value>>;

pub fn new_slot(value: Value) -> Slot {
    Arc::new(RwLock::new(value))
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameViewError {
    #[error("index {index} out of range for view of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("frame has exited")]
    FrameExited,

    #[error("frame variable view has a fixed length")]
    FixedLength,

    #[error("frame has no slot {0}")]
    MissingSlot(usize),
}

/// One function invocation
pub struct Frame {
    function: Arc<FunctionInfo>,
    slots: Vec<Slot>,
    position: AtomicUsize,
    redirect: Mutex<Option<usize>>,
    exited: AtomicBool,
    thread: ThreadId,
    depth: usize,
}

impl Frame {
    /// Fresh frame with `slot_count` nil locals, owned by the current thread
    pub fn new(function: Arc<FunctionInfo>, slot_count: usize, depth: usize) -> Arc<Self> {
        let slots = (0..slot_count).map(|_| new_slot(Value::Nil)).collect();
        Self::with_slots(function, slots, depth)
    }

    /// Frame over existing cells, e.g. a resumed generator's locals
    pub fn with_slots(function: Arc<FunctionInfo>, slots: Vec<Slot>, depth: usize) -> Arc<Self> {
        trace!(
            target: "ember::frame",
            function = %function.name(),
            slots = slots.len(),
            depth,
            "frame created"
        );
        Arc::new(Self {
            function,
            slots,
            position: AtomicUsize::new(0),
            redirect: Mutex::new(None),
            exited: AtomicBool::new(false),
            thread: thread::current().id(),
            depth,
        })
    }

    pub fn function(&self) -> &Arc<FunctionInfo> {
        &self.function
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn load(&self, index: usize) -> Option<Value> {
        self.slots.get(index).map(|slot| slot.read().clone())
    }

    pub fn store(&self, index: usize, value: Value) -> bool {
        match self.slots.get(index) {
            Some(slot) => {
                *slot.write() = value;
                true
            }
            None => false,
        }
    }

    /// Index of the statement currently executing
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    pub fn set_position(&self, index: usize) {
        self.position.store(index, Ordering::Release);
    }

    /// Request that execution continue at statement `index`
    pub fn set_next_statement(&self, index: usize) {
        debug!(
            target: "ember::frame",
            function = %self.function.name(),
            from = self.position(),
            to = index,
            "next statement requested"
        );
        *self.redirect.lock() = Some(index);
    }

    /// Consume a pending redirect
    pub fn take_redirect(&self) -> Option<usize> {
        self.redirect.lock().take()
    }

    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn mark_exited(&self) {
        self.exited.store(true, Ordering::Release);
    }

    /// View over the variables declared in `scope`
    pub fn scope_view(self: &Arc<Self>, scope: Identifier) -> Option<FrameVariableView> {
        let slots = self.function.scope_slots(scope)?.clone();
        Some(FrameVariableView::new(self.clone(), slots))
    }

    /// View over every declared variable
    pub fn locals_view(self: &Arc<Self>) -> FrameVariableView {
        FrameVariableView::new(self.clone(), self.function.all_slots().clone())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("function", &self.function.name())
            .field("position", &self.position())
            .field("depth", &self.depth)
            .field("exited", &self.is_exited())
            .finish()
    }
}

/// Fixed-length, index-addressable window onto a frame's locals
///
/// Construction clones two `Arc`s and never touches slot values.
#[derive(Clone)]
pub struct FrameVariableView {
    frame: Arc<Frame>,
    slots: Arc<[usize]>,
}

impl FrameVariableView {
    pub fn new(frame: Arc<Frame>, slots: Arc<[usize]>) -> Self {
        Self { frame, slots }
    }

    pub fn frame(&self) -> &Arc<Frame> {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn cell(&self, index: usize) -> Result<&Slot, FrameViewError> {
        if self.frame.is_exited() {
            return Err(FrameViewError::FrameExited);
        }
        let slot = *self.slots.get(index).ok_or(FrameViewError::IndexOutOfRange {
            index,
            len: self.slots.len(),
        })?;
        self.frame.slot(slot).ok_or(FrameViewError::MissingSlot(slot))
    }

    pub fn get(&self, index: usize) -> Result<Value, FrameViewError> {
        Ok(self.cell(index)?.read().clone())
    }

    pub fn set(&self, index: usize, value: Value) -> Result<(), FrameViewError> {
        let cell = self.cell(index)?;
        trace!(target: "ember::frame", index, "view write");
        *cell.write() = value;
        Ok(())
    }

    /// Names in lexical declaration order; `INVALID` for undeclared slots
    pub fn names(&self) -> Vec<Identifier> {
        self.slots
            .iter()
            .map(|&slot| {
                self.frame
                    .function()
                    .variable_for_slot(slot)
                    .map(|v| v.name)
                    .unwrap_or(Identifier::INVALID)
            })
            .collect()
    }

    /// Snapshot of `(name, value)` pairs
    pub fn iter(&self) -> Result<impl Iterator<Item = (Identifier, Value)>, FrameViewError> {
        let values = (0..self.len())
            .map(|i| self.get(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.names().into_iter().zip(values))
    }

    pub fn insert(&self, _index: usize, _value: Value) -> Result<(), FrameViewError> {
        Err(FrameViewError::FixedLength)
    }

    pub fn remove(&self, _index: usize) -> Result<Value, FrameViewError> {
        Err(FrameViewError::FixedLength)
    }
}

impl std::fmt::Debug for FrameVariableView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameVariableView")
            .field("frame", &self.frame)
            .field("slots", &self.slots)
            .finish()
    }
}

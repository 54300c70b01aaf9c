//! Per-instance stacks of in-progress execute calls.

use dashmap::DashMap;
use tracing::{trace, warn};

use crate::amx::{Cell, InstanceId, VmError};

/// Opaque awaitable token, forwarded to the task collaborator untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub Cell);

/// Memory-reclamation marker handed to thread detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReclaimMarker(pub Cell);

/// Why an execute call returned the sleep status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseReason {
    #[default]
    None,
    Await,
    Detach,
}

/// One intercepted execute call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    pub reason: PauseReason,
    /// Value reported to the caller once the suspension is routed.
    pub result: Cell,
    pub awaiting: Option<TaskId>,
    pub reclaim: ReclaimMarker,
}

/// Call frames of one instance, innermost last.
#[derive(Debug, Default)]
pub struct ExecContext {
    frames: Vec<Frame>,
}

impl ExecContext {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }
}

/// Execution contexts of every live instance. Created lazily on the first push and
/// dropped on unload.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: DashMap<InstanceId, ExecContext>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a fresh frame and return the new depth.
    pub fn push(&self, instance: InstanceId) -> usize {
        let mut context = self.contexts.entry(instance).or_default();
        context.frames.push(Frame::default());
        context.depth()
    }

    pub fn pop(&self, instance: InstanceId) -> Option<Frame> {
        let frame = self.contexts.get_mut(&instance).and_then(|mut context| context.frames.pop());
        if frame.is_none() {
            warn!(target: "vmhook::hooks", %instance, "pop without a pushed frame");
        }
        frame
    }

    pub fn top(&self, instance: InstanceId) -> Option<Frame> {
        self.contexts.get(&instance).and_then(|context| context.top().copied())
    }

    pub fn depth(&self, instance: InstanceId) -> usize {
        self.contexts.get(&instance).map_or(0, |context| context.depth())
    }

    /// Edit the innermost frame in place. `None` when the instance is not executing.
    pub fn with_top_mut<R>(&self, instance: InstanceId, f: impl FnOnce(&mut Frame) -> R) -> Option<R> {
        let mut context = self.contexts.get_mut(&instance)?;
        context.top_mut().map(f)
    }

    /// Mark the innermost frame as awaiting `task`. Returns the status the requesting
    /// native must hand back to the VM: `Sleep`, or `InvalidState` outside any execution.
    pub fn request_await(&self, instance: InstanceId, task: TaskId, result: Cell) -> VmError {
        let marked = self.with_top_mut(instance, |frame| {
            frame.reason = PauseReason::Await;
            frame.awaiting = Some(task);
            frame.result = result;
        });
        match marked {
            Some(()) => {
                trace!(target: "vmhook::hooks", %instance, task = task.0, "await requested");
                VmError::Sleep
            }
            None => VmError::InvalidState,
        }
    }

    /// Mark the innermost frame for detach with `marker`.
    pub fn request_detach(&self, instance: InstanceId, marker: ReclaimMarker, result: Cell) -> VmError {
        let marked = self.with_top_mut(instance, |frame| {
            frame.reason = PauseReason::Detach;
            frame.reclaim = marker;
            frame.result = result;
        });
        match marked {
            Some(()) => {
                trace!(target: "vmhook::hooks", %instance, marker = marker.0, "detach requested");
                VmError::Sleep
            }
            None => VmError::InvalidState,
        }
    }

    pub fn remove(&self, instance: InstanceId) -> bool {
        self.contexts.remove(&instance).is_some()
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod context_test;

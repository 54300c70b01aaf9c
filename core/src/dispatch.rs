//! Routing of the sleep status to the task and thread collaborators.

use std::sync::Arc;

use anyhow::bail;
use tracing::{debug, error, warn};

use crate::amx::{Amx, Cell, ResumeToken, VmError, VmResult};
use crate::context::{Frame, PauseReason, ReclaimMarker, TaskId};

/// Task system that resumes awaiting instances once their task completes.
pub trait TaskRegistry: Send + Sync {
    /// Remember `token` until `task` completes. Called at most once per suspension.
    fn register(&self, task: TaskId, token: ResumeToken) -> anyhow::Result<()>;
}

/// Thread system that takes over a detached instance.
pub trait ThreadDetach: Send + Sync {
    fn detach(&self, amx: &mut Amx, marker: ReclaimMarker);
}

/// Source of synthetic callbacks: names resolved to ids by the lookup hook, and the code
/// run when such an id reaches the execute hook.
pub trait CallbackEvents: Send + Sync {
    fn callback_id(&self, amx: &Amx, name: &str) -> Option<u32>;

    /// Handle callback `id`. Returning a public name executes that public in its place;
    /// `None` means the call was fully handled here.
    fn invoke(&self, id: u32, amx: &mut Amx, retval: Option<&mut Cell>) -> Option<String>;
}

/// Stand-in for absent collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl TaskRegistry for Unsupported {
    fn register(&self, task: TaskId, _token: ResumeToken) -> anyhow::Result<()> {
        bail!("no task system to await task {}", task.0)
    }
}

impl ThreadDetach for Unsupported {
    fn detach(&self, amx: &mut Amx, marker: ReclaimMarker) {
        warn!(target: "vmhook::dispatch", instance = %amx.id(), marker = marker.0, "no thread system, detach ignored");
    }
}

impl CallbackEvents for Unsupported {
    fn callback_id(&self, _amx: &Amx, _name: &str) -> Option<u32> {
        None
    }

    fn invoke(&self, _id: u32, _amx: &mut Amx, _retval: Option<&mut Cell>) -> Option<String> {
        None
    }
}

/// External systems the subsystem hands work to.
#[derive(Clone)]
pub struct Collaborators {
    pub tasks: Arc<dyn TaskRegistry>,
    pub threads: Arc<dyn ThreadDetach>,
    pub events: Arc<dyn CallbackEvents>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            tasks: Arc::new(Unsupported),
            threads: Arc::new(Unsupported),
            events: Arc::new(Unsupported),
        }
    }
}

impl Collaborators {
    pub fn with_tasks(mut self, tasks: Arc<dyn TaskRegistry>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_threads(mut self, threads: Arc<dyn ThreadDetach>) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn CallbackEvents>) -> Self {
        self.events = events;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

pub(crate) struct SuspensionDispatch {
    tasks: Arc<dyn TaskRegistry>,
    threads: Arc<dyn ThreadDetach>,
}

impl SuspensionDispatch {
    pub(crate) fn new(tasks: Arc<dyn TaskRegistry>, threads: Arc<dyn ThreadDetach>) -> Self {
        Self { tasks, threads }
    }

    /// Interpret a sleep status against the frame that produced it. Success means the
    /// suspension was handed off and the caller sees a completed call.
    pub(crate) fn route(&self, amx: &mut Amx, retval: Option<&mut Cell>, frame: Frame) -> VmResult<()> {
        match frame.reason {
            PauseReason::Await => {
                let Some(task) = frame.awaiting else {
                    return Err(reject(amx, "await without a task"));
                };
                if let Err(err) = self.tasks.register(task, amx.resume_token()) {
                    error!(target: "vmhook::dispatch", instance = %amx.id(), task = task.0, "task registration failed: {err:#}");
                    return Err(amx.raise(VmError::InvalidState));
                }
                debug!(target: "vmhook::dispatch", instance = %amx.id(), task = task.0, "awaiting task");
                complete(amx, retval, frame.result);
                Ok(())
            }
            PauseReason::Detach => {
                if let Some(retval) = retval {
                    *retval = frame.result;
                }
                self.threads.detach(amx, frame.reclaim);
                debug!(target: "vmhook::dispatch", instance = %amx.id(), marker = frame.reclaim.0, "detached");
                amx.error = None;
                Ok(())
            }
            PauseReason::None => Err(reject(amx, "sleep without a pause reason")),
        }
    }
}

fn complete(amx: &mut Amx, retval: Option<&mut Cell>, result: Cell) {
    if let Some(retval) = retval {
        *retval = result;
    }
    amx.error = None;
}

fn reject(amx: &mut Amx, why: &str) -> VmError {
    error!(target: "vmhook::dispatch", instance = %amx.id(), "{why}");
    amx.raise(VmError::InvalidState)
}

//! In-process tasks that scripts can await.

use std::sync::Arc;

use anyhow::bail;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};
use vmhook_core::Subsystem;
use vmhook_core::amx::{Amx, Cell, Native, ResumeToken};
use vmhook_core::context::TaskId;
use vmhook_core::dispatch::TaskRegistry;

use crate::error::{NativeResult, TaskError, require};
use crate::{NativeModule, native};

/// Continues instances whose awaited task completed.
pub trait Resumer: Send + Sync {
    fn resume(&self, token: ResumeToken, result: Cell);
}

/// Resumer for hosts that never continue awaited instances.
#[derive(Debug, Default)]
pub struct DropResumer;

impl Resumer for DropResumer {
    fn resume(&self, token: ResumeToken, _result: Cell) {
        warn!(target: "vmhook::tasks", instance = %token.instance(), "no resumer, waiter dropped");
    }
}

#[derive(Debug, Default)]
struct Task {
    result: Option<Cell>,
    waiters: Vec<ResumeToken>,
}

#[derive(Debug, Default)]
struct TaskTable {
    tasks: FxHashMap<Cell, Task>,
    next: Cell,
}

/// Tasks keyed by the ids scripts hold. Completing a task resumes each waiter once.
pub struct TaskPool {
    table: Mutex<TaskTable>,
    resumer: Arc<dyn Resumer>,
}

impl TaskPool {
    pub fn new(resumer: Arc<dyn Resumer>) -> Self {
        Self {
            table: Mutex::new(TaskTable::default()),
            resumer,
        }
    }

    pub fn create(&self) -> TaskId {
        let mut table = self.table.lock();
        table.next = table.next.checked_add(1).unwrap_or(1);
        while table.tasks.contains_key(&table.next) {
            table.next = table.next.checked_add(1).unwrap_or(1);
        }
        let id = table.next;
        table.tasks.insert(id, Task::default());
        debug!(target: "vmhook::tasks", task = id, "task created");
        TaskId(id)
    }

    pub fn contains(&self, task: TaskId) -> bool {
        self.table.lock().tasks.contains_key(&task.0)
    }

    /// `None` while the task is still pending.
    pub fn result(&self, task: TaskId) -> Result<Option<Cell>, TaskError> {
        let table = self.table.lock();
        let entry = table.tasks.get(&task.0).ok_or(TaskError::InvalidId(task.0))?;
        Ok(entry.result)
    }

    /// Complete `task` and resume its waiters. Returns how many were resumed.
    pub fn set_result(&self, task: TaskId, value: Cell) -> Result<usize, TaskError> {
        let waiters = {
            let mut table = self.table.lock();
            let entry = table.tasks.get_mut(&task.0).ok_or(TaskError::InvalidId(task.0))?;
            if entry.result.is_some() {
                return Err(TaskError::Completed(task.0));
            }
            entry.result = Some(value);
            std::mem::take(&mut entry.waiters)
        };
        debug!(target: "vmhook::tasks", task = task.0, waiters = waiters.len(), "task completed");
        let resumed = waiters.len();
        for token in waiters {
            self.resumer.resume(token, value);
        }
        Ok(resumed)
    }

    /// Drop a task; pending waiters are never resumed.
    pub fn remove(&self, task: TaskId) -> bool {
        self.table.lock().tasks.remove(&task.0).is_some()
    }

    pub fn len(&self) -> usize {
        self.table.lock().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new(Arc::new(DropResumer))
    }
}

impl TaskRegistry for TaskPool {
    fn register(&self, task: TaskId, token: ResumeToken) -> anyhow::Result<()> {
        let mut table = self.table.lock();
        let Some(entry) = table.tasks.get_mut(&task.0) else {
            bail!(TaskError::InvalidId(task.0));
        };
        if entry.result.is_some() {
            bail!(TaskError::Completed(task.0));
        }
        entry.waiters.push(token);
        Ok(())
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool").field("tasks", &self.len()).finish_non_exhaustive()
    }
}

/// What the task natives act on.
struct TaskState {
    tasks: Arc<TaskPool>,
    subsystem: Arc<Subsystem>,
}

/// Natives over a [`TaskPool`], suspending through the subsystem.
#[derive(Debug)]
pub struct TaskNatives {
    state: Arc<TaskState>,
}

impl TaskNatives {
    pub fn new(tasks: Arc<TaskPool>, subsystem: Arc<Subsystem>) -> Self {
        Self {
            state: Arc::new(TaskState { tasks, subsystem }),
        }
    }
}

impl std::fmt::Debug for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskState").field("tasks", &self.tasks).finish_non_exhaustive()
    }
}

impl NativeModule for TaskNatives {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        "Awaitable tasks"
    }

    fn exports(&self) -> Vec<(&'static str, Native)> {
        let state = &self.state;
        vec![
            native(state, "task_new", task_new),
            native(state, "task_set_result", task_set_result),
            native(state, "task_get_result", task_get_result),
            native(state, "task_valid", task_valid),
            native(state, "task_await", task_await),
        ]
    }
}

fn task_new(state: &TaskState, _amx: &mut Amx, _params: &[Cell]) -> NativeResult<Cell> {
    Ok(state.tasks.create().0)
}

fn task_set_result(state: &TaskState, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 2)?;
    state.tasks.set_result(TaskId(params[0]), params[1])?;
    Ok(1)
}

fn task_get_result(state: &TaskState, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    let task = TaskId(params[0]);
    Ok(state.tasks.result(task)?.ok_or(TaskError::Pending(task.0))?)
}

fn task_valid(state: &TaskState, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    Ok(Cell::from(state.tasks.contains(TaskId(params[0]))))
}

// Completed tasks return their result straight away; pending ones suspend the caller.
fn task_await(state: &TaskState, amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    let task = TaskId(params[0]);
    match state.tasks.result(task)? {
        Some(value) => Ok(value),
        None => Err(state.subsystem.request_await(amx, task, 0).into()),
    }
}

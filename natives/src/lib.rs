//! Script-callable natives over the vmhook core.
//!
//! Each module hands a list of natives to the instance it is registered with; natives are
//! closures over the shared pool, task pool or subsystem they act on.

pub mod error;
pub mod string;
pub mod task;
pub mod thread;

#[cfg(test)]
mod string_test;

use std::sync::Arc;

use tracing::debug;
use vmhook_core::Subsystem;
use vmhook_core::amx::{Amx, Cell, Native};

use crate::error::{NativeResult, finish};

pub use error::{NativeError, TaskError};
pub use string::StringNatives;
pub use task::{Resumer, TaskNatives, TaskPool};
pub use thread::ThreadNatives;

/// A group of natives registered together.
pub trait NativeModule: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn enabled(&self) -> bool {
        true
    }

    fn exports(&self) -> Vec<(&'static str, Native)>;

    /// Register every export with `amx`. Returns how many were registered.
    fn register(&self, amx: &mut Amx) -> usize {
        if !self.enabled() {
            return 0;
        }
        let exports = self.exports();
        let count = exports.len();
        amx.register_natives(exports);
        debug!(target: "vmhook::natives", module = self.name(), instance = %amx.id(), count, "natives registered");
        count
    }
}

/// Register the string, task and thread natives with `amx`.
pub fn register_all(amx: &mut Amx, subsystem: &Arc<Subsystem>, tasks: &Arc<TaskPool>) -> usize {
    let modules: [Box<dyn NativeModule>; 3] = [
        Box::new(StringNatives::new(Arc::clone(subsystem.pool()))),
        Box::new(TaskNatives::new(Arc::clone(tasks), Arc::clone(subsystem))),
        Box::new(ThreadNatives::new(Arc::clone(subsystem))),
    ];
    modules.iter().map(|module| module.register(amx)).sum()
}

/// Wrap a native body over shared state `S` as a VM native.
pub(crate) fn native<S>(
    state: &Arc<S>,
    name: &'static str,
    body: fn(&S, &mut Amx, &[Cell]) -> NativeResult<Cell>,
) -> (&'static str, Native)
where
    S: Send + Sync + ?Sized + 'static,
{
    let state = Arc::clone(state);
    let native: Native = Arc::new(move |amx: &mut Amx, params: &[Cell]| {
        let result = body(&state, amx, params);
        finish(amx, name, result)
    });
    (name, native)
}

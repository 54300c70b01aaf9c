use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::{debug, info};

use crate::amx::{Amx, Callback, Cell, Export, ExportTable, VmError};
use crate::callbacks::CallbackRegistry;
use crate::config::HookConfig;
use crate::context::{ContextRegistry, ReclaimMarker, TaskId};
use crate::dispatch::{CallbackEvents, Collaborators, SuspensionDispatch};
use crate::hooks::HookTable;
use crate::logging;
use crate::strings::StringPool;

/// Everything the detours reach through their weak handle.
pub(crate) struct HookState {
    pub(crate) exports: Arc<ExportTable>,
    pub(crate) hooks: HookTable,
    pub(crate) contexts: ContextRegistry,
    /// Intercepted execute calls in flight across every instance.
    pub(crate) exec_depth: AtomicUsize,
    pub(crate) pool: Arc<StringPool>,
    pub(crate) events: Arc<dyn CallbackEvents>,
    pub(crate) dispatch: SuspensionDispatch,
    pub(crate) callbacks: CallbackRegistry,
    pub(crate) custom_callback: Callback,
    pub(crate) ref_args: AtomicBool,
}

/// Process-scoped owner of the hooks and the state behind them.
///
/// Lifecycle: [`Subsystem::new`], then [`Subsystem::install`]; hooks come out again on
/// [`Subsystem::uninstall`] or drop.
pub struct Subsystem {
    state: Arc<HookState>,
    config: HookConfig,
}

impl Subsystem {
    /// Starts the stderr subscriber if the config names a trace filter.
    pub fn new(exports: Arc<ExportTable>, config: HookConfig, collaborators: Collaborators) -> Self {
        if let Some(filter) = &config.trace {
            logging::init_tracing(filter);
        }
        let Collaborators { tasks, threads, events } = collaborators;
        let state = Arc::new_cyclic(|weak: &Weak<HookState>| {
            let handle = weak.clone();
            let custom_callback: Callback = Arc::new(move |amx: &mut Amx, index: Cell, params: &[Cell]| {
                match handle.upgrade() {
                    Some(state) => state.forward_native(amx, index, params),
                    None => Err(amx.raise(VmError::Callback)),
                }
            });
            HookState {
                hooks: HookTable::new(&exports, weak.clone()),
                exports,
                contexts: ContextRegistry::new(),
                exec_depth: AtomicUsize::new(0),
                pool: Arc::new(StringPool::new()),
                events,
                dispatch: SuspensionDispatch::new(tasks, threads),
                callbacks: CallbackRegistry::new(),
                custom_callback,
                ref_args: AtomicBool::new(config.hook_ref_args),
            }
        });
        Self { state, config }
    }

    /// Install the hooks the config asks for. Returns how many were newly installed.
    pub fn install(&self) -> usize {
        let installed = Export::ALL
            .into_iter()
            .filter(|export| *export != Export::StrLen || self.config.hook_str_len)
            .filter(|export| self.state.hooks.toggle(*export, true))
            .count();
        info!(
            target: "vmhook::hooks",
            installed,
            str_len = self.config.hook_str_len,
            ref_args = self.ref_args_enabled(),
            "hooks installed"
        );
        installed
    }

    /// Restore every original entry. Returns how many hooks were removed.
    pub fn uninstall(&self) -> usize {
        let removed = self.state.hooks.remove();
        if removed > 0 {
            info!(target: "vmhook::hooks", removed, "hooks removed");
        }
        removed
    }

    pub fn hooks(&self) -> &HookTable {
        &self.state.hooks
    }

    pub fn config(&self) -> &HookConfig {
        &self.config
    }

    pub fn toggle_str_len(&self, on: bool) -> bool {
        self.state.hooks.toggle(Export::StrLen, on)
    }

    pub fn toggle_ref_args(&self, on: bool) {
        self.state.ref_args.store(on, Ordering::Relaxed);
        debug!(target: "vmhook::hooks", on, "ref-args mode toggled");
    }

    pub fn ref_args_enabled(&self) -> bool {
        self.state.ref_args.load(Ordering::Relaxed)
    }

    pub fn pool(&self) -> &Arc<StringPool> {
        &self.state.pool
    }

    pub fn contexts(&self) -> &ContextRegistry {
        &self.state.contexts
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.state.callbacks
    }

    pub fn exports(&self) -> &Arc<ExportTable> {
        &self.state.exports
    }

    /// Intercepted execute calls currently in flight.
    pub fn exec_depth(&self) -> usize {
        self.state.exec_depth.load(Ordering::Acquire)
    }

    /// Ask for the current execution to be suspended until `task` completes. The native
    /// making the request returns the result of this call as its error status.
    pub fn request_await(&self, amx: &Amx, task: TaskId, result: Cell) -> VmError {
        self.state.contexts.request_await(amx.id(), task, result)
    }

    /// Ask for the current execution to be handed to the thread system.
    pub fn request_detach(&self, amx: &Amx, marker: ReclaimMarker, result: Cell) -> VmError {
        self.state.contexts.request_detach(amx.id(), marker, result)
    }

    /// Forget an instance that is being unloaded.
    pub fn unload(&self, amx: &Amx) {
        let instance = amx.id();
        let context = self.state.contexts.remove(instance);
        let callback = self.state.callbacks.forget(instance);
        let bindings = self.state.pool.forget_instance(instance);
        debug!(target: "vmhook::hooks", %instance, context, callback, bindings, "instance unloaded");
    }
}

impl Drop for Subsystem {
    fn drop(&mut self) {
        self.uninstall();
    }
}

impl std::fmt::Debug for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subsystem")
            .field("config", &self.config)
            .field("exec_depth", &self.exec_depth())
            .field("pool", &self.state.pool)
            .finish_non_exhaustive()
    }
}

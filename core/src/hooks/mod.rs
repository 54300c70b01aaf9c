//! Runtime redirection of the VM's exported entry points.
//!
//! A [`Hook`] owns one slot of the [`ExportTable`]: installing it writes the detour into the
//! slot, removing it writes back the entry captured when the hook was created. Hooks never
//! chain through each other; the detour reaches the original through [`Hook::original_call`].

mod intercept;

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::amx::{ExecFn, Export, ExportTable, FindPublicFn, GetAddrFn, StrLenFn};
use crate::subsystem::HookState;

/// One intercepted entry point.
pub struct Hook<F: ?Sized + 'static> {
    export: Export,
    table: Arc<ExportTable>,
    slot: fn(&ExportTable) -> &RwLock<Arc<F>>,
    original: Arc<F>,
    detour: Arc<F>,
    state: Mutex<HookFlags>,
}

/// `wanted` follows [`Hook::install`] and [`Hook::remove`]; `attached` also follows the
/// temporary removals made for original calls.
#[derive(Debug, Default, Clone, Copy)]
struct HookFlags {
    wanted: bool,
    attached: bool,
}

impl<F: ?Sized + 'static> Hook<F> {
    fn new(
        export: Export,
        table: Arc<ExportTable>,
        slot: fn(&ExportTable) -> &RwLock<Arc<F>>,
        original: Arc<F>,
        detour: Arc<F>,
    ) -> Self {
        Self {
            export,
            table,
            slot,
            original,
            detour,
            state: Mutex::new(HookFlags::default()),
        }
    }

    #[inline]
    pub fn export(&self) -> Export {
        self.export
    }

    /// Whether the detour is in the export table right now.
    pub fn is_installed(&self) -> bool {
        self.state.lock().attached
    }

    /// Whether the hook is switched on, even if an original call has it out of the table.
    pub fn is_wanted(&self) -> bool {
        self.state.lock().wanted
    }

    /// Point the export slot at the detour. Returns `false` if it already was.
    pub fn install(&self) -> bool {
        let mut state = self.state.lock();
        state.wanted = true;
        let changed = self.attach(&mut state);
        if changed {
            debug!(target: "vmhook::hooks", export = %self.export, "hook installed");
        }
        changed
    }

    /// Point the export slot back at the original. Returns `false` if it already was.
    /// Original calls in flight do not bring the hook back.
    pub fn remove(&self) -> bool {
        let mut state = self.state.lock();
        let was_wanted = std::mem::replace(&mut state.wanted, false);
        let detached = self.detach(&mut state);
        if detached || was_wanted {
            debug!(target: "vmhook::hooks", export = %self.export, "hook removed");
        }
        detached || was_wanted
    }

    /// Put the detour back if the hook is still switched on. Returns whether it is in the
    /// table afterwards.
    pub(crate) fn reattach(&self) -> bool {
        let mut state = self.state.lock();
        if state.wanted {
            self.attach(&mut state);
        }
        state.attached
    }

    /// Take the hook out of the export table until the returned guard drops, so calls
    /// through the table reach the original entry. The guard puts it back only if it was
    /// attached here and nobody removed the hook in the meantime.
    pub fn original_call(&self) -> OriginalCall<'_, F> {
        let reattach = {
            let mut state = self.state.lock();
            self.detach(&mut state)
        };
        OriginalCall { hook: self, reattach }
    }

    fn attach(&self, state: &mut HookFlags) -> bool {
        if state.attached {
            return false;
        }
        *(self.slot)(&self.table).write() = Arc::clone(&self.detour);
        state.attached = true;
        true
    }

    fn detach(&self, state: &mut HookFlags) -> bool {
        if !state.attached {
            return false;
        }
        *(self.slot)(&self.table).write() = Arc::clone(&self.original);
        state.attached = false;
        true
    }
}

/// Scope during which a hook is out of the export table.
#[must_use = "the hook is reinstalled as soon as the guard drops"]
pub struct OriginalCall<'a, F: ?Sized + 'static> {
    hook: &'a Hook<F>,
    reattach: bool,
}

impl<F: ?Sized + 'static> Drop for OriginalCall<'_, F> {
    fn drop(&mut self) {
        if self.reattach {
            self.hook.reattach();
        }
    }
}

/// The four hooks, all bound to the same export table.
pub struct HookTable {
    pub(crate) exec: Hook<ExecFn>,
    pub(crate) get_addr: Hook<GetAddrFn>,
    pub(crate) str_len: Hook<StrLenFn>,
    pub(crate) find_public: Hook<FindPublicFn>,
}

impl HookTable {
    /// Capture the table's current entries and prepare detours that forward to `state`.
    /// Nothing is installed yet.
    pub(crate) fn new(table: &Arc<ExportTable>, state: Weak<HookState>) -> Self {
        let exec = Arc::clone(&table.exec_slot().read());
        let get_addr = Arc::clone(&table.get_addr_slot().read());
        let str_len = Arc::clone(&table.str_len_slot().read());
        let find_public = Arc::clone(&table.find_public_slot().read());

        Self {
            exec: Hook::new(
                Export::Exec,
                Arc::clone(table),
                ExportTable::exec_slot,
                Arc::clone(&exec),
                intercept::exec_detour(state.clone(), exec),
            ),
            get_addr: Hook::new(
                Export::GetAddr,
                Arc::clone(table),
                ExportTable::get_addr_slot,
                Arc::clone(&get_addr),
                intercept::get_addr_detour(state.clone(), get_addr),
            ),
            str_len: Hook::new(
                Export::StrLen,
                Arc::clone(table),
                ExportTable::str_len_slot,
                Arc::clone(&str_len),
                intercept::str_len_detour(state.clone(), str_len),
            ),
            find_public: Hook::new(
                Export::FindPublic,
                Arc::clone(table),
                ExportTable::find_public_slot,
                Arc::clone(&find_public),
                intercept::find_public_detour(state, find_public),
            ),
        }
    }

    /// Install every hook. Returns how many were newly installed.
    pub fn install(&self) -> usize {
        Export::ALL.into_iter().filter(|export| self.toggle(*export, true)).count()
    }

    /// Remove every hook. Returns how many were actually removed.
    pub fn remove(&self) -> usize {
        Export::ALL.into_iter().filter(|export| self.toggle(*export, false)).count()
    }

    /// Install or remove a single hook. Returns whether anything changed.
    pub fn toggle(&self, export: Export, on: bool) -> bool {
        match (export, on) {
            (Export::Exec, true) => self.exec.install(),
            (Export::Exec, false) => self.exec.remove(),
            (Export::GetAddr, true) => self.get_addr.install(),
            (Export::GetAddr, false) => self.get_addr.remove(),
            (Export::StrLen, true) => self.str_len.install(),
            (Export::StrLen, false) => self.str_len.remove(),
            (Export::FindPublic, true) => self.find_public.install(),
            (Export::FindPublic, false) => self.find_public.remove(),
        }
    }

    pub fn is_installed(&self, export: Export) -> bool {
        match export {
            Export::Exec => self.exec.is_installed(),
            Export::GetAddr => self.get_addr.is_installed(),
            Export::StrLen => self.str_len.is_installed(),
            Export::FindPublic => self.find_public.is_installed(),
        }
    }
}

#[cfg(test)]
mod hooks_test;

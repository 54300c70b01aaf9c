use std::ptr::NonNull;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use tracing::{error, trace};

use crate::amx::{Amx, Cell, ExecFn, ExecIndex, FindPublicFn, GetAddrFn, InstanceId, StrLenFn, VmError, VmResult};
use crate::context::Frame;
use crate::subsystem::HookState;

// Detours hold the state weakly; once the subsystem is gone they degrade to the original.

pub(super) fn exec_detour(state: Weak<HookState>, original: Arc<ExecFn>) -> Arc<ExecFn> {
    Arc::new(move |amx: &mut Amx, retval: Option<&mut Cell>, index: i32| match state.upgrade() {
        Some(state) => state.exec(amx, retval, index),
        None => original(amx, retval, index),
    })
}

pub(super) fn get_addr_detour(state: Weak<HookState>, original: Arc<GetAddrFn>) -> Arc<GetAddrFn> {
    Arc::new(move |amx: &mut Amx, addr: Cell| match state.upgrade() {
        Some(state) => state.get_addr(amx, addr),
        None => original(amx, addr),
    })
}

pub(super) fn str_len_detour(state: Weak<HookState>, original: Arc<StrLenFn>) -> Arc<StrLenFn> {
    Arc::new(move |ptr: NonNull<Cell>| match state.upgrade() {
        Some(state) => state.str_len(ptr),
        None => original(ptr),
    })
}

pub(super) fn find_public_detour(state: Weak<HookState>, original: Arc<FindPublicFn>) -> Arc<FindPublicFn> {
    Arc::new(move |amx: &Amx, name: &str| match state.upgrade() {
        Some(state) => state.find_public(amx, name),
        None => original(amx, name),
    })
}

/// One frame of an intercepted execute call. Pushes on entry and pops on every exit path;
/// leaving the outermost frame collects temporary strings.
pub(crate) struct ExecScope<'a> {
    state: &'a HookState,
    instance: InstanceId,
}

impl<'a> ExecScope<'a> {
    fn enter(state: &'a HookState, instance: InstanceId) -> Self {
        let depth = state.contexts.push(instance);
        state.exec_depth.fetch_add(1, Ordering::AcqRel);
        trace!(target: "vmhook::hooks", %instance, depth, "frame pushed");
        Self { state, instance }
    }

    /// The frame this scope pushed; nested scopes have already popped theirs. `None` once
    /// the instance was unloaded mid-call.
    fn frame(&self) -> Option<Frame> {
        self.state.contexts.top(self.instance)
    }
}

impl Drop for ExecScope<'_> {
    fn drop(&mut self) {
        self.state.contexts.pop(self.instance);
        trace!(target: "vmhook::hooks", instance = %self.instance, "frame popped");
        if self.state.exec_depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.pool.collect();
        }
    }
}

impl HookState {
    pub(crate) fn exec(&self, amx: &mut Amx, mut retval: Option<&mut Cell>, index: i32) -> VmResult<()> {
        let mut index = index;
        if let ExecIndex::Synthetic(id) = ExecIndex::decode(index) {
            match self.events.invoke(id, amx, retval.as_deref_mut()) {
                Some(public) => index = self.find_public_original(amx, &public)?,
                None => return Ok(()),
            }
        }

        let scope = ExecScope::enter(self, amx.id());
        match self.exec_original(amx, retval.as_deref_mut(), index) {
            Err(VmError::Sleep) => match scope.frame() {
                Some(frame) => self.dispatch.route(amx, retval, frame),
                None => {
                    error!(target: "vmhook::dispatch", instance = %amx.id(), "execution context lost while suspended");
                    Err(amx.raise(VmError::InvalidState))
                }
            },
            status => status,
        }
    }

    /// Run the real executor. While the exec hook is out of the table, the first native
    /// call goes through the custom callback, which puts the hook back (unless it was
    /// removed meanwhile) so natives that re-enter the VM are intercepted again.
    fn exec_original(&self, amx: &mut Amx, retval: Option<&mut Cell>, index: i32) -> VmResult<()> {
        if !self.hooks.exec.is_installed() {
            return self.exports.exec(amx, retval, index);
        }

        self.callbacks.swap(amx, Arc::clone(&self.custom_callback));
        let status = {
            let _original = self.hooks.exec.original_call();
            self.exports.exec(amx, retval, index)
        };
        self.callbacks.restore(amx);
        status
    }

    /// Body of the custom callback.
    pub(crate) fn forward_native(&self, amx: &mut Amx, index: Cell, params: &[Cell]) -> VmResult<Cell> {
        match self.callbacks.take(amx.id()) {
            Some(original) => {
                self.hooks.exec.reattach();
                amx.callback = Arc::clone(&original);
                original(amx, index, params)
            }
            None => {
                error!(target: "vmhook::hooks", instance = %amx.id(), "callback hook cannot be restored");
                Err(amx.raise(VmError::Callback))
            }
        }
    }

    pub(crate) fn get_addr(&self, amx: &mut Amx, addr: Cell) -> VmResult<NonNull<Cell>> {
        let resolved = {
            let _original = self.hooks.get_addr.original_call();
            self.exports.get_addr(amx, addr)
        };

        match resolved {
            Err(VmError::MemAccess) => self.resolve_virtual(amx.id(), addr).ok_or(VmError::MemAccess),
            Ok(ptr) if self.ref_args.load(Ordering::Relaxed) => {
                // Variadic arguments arrive by reference, so the cell behind a valid address
                // may itself be a pooled address. A plain number can be misread as one.
                // SAFETY: the real resolver just returned `ptr` for a mapped cell.
                let value = unsafe { ptr.as_ptr().read() };
                Ok(self.resolve_virtual(amx.id(), value).unwrap_or(ptr))
            }
            status => status,
        }
    }

    fn resolve_virtual(&self, instance: InstanceId, addr: Cell) -> Option<NonNull<Cell>> {
        if self.pool.is_null_address(addr) {
            return Some(self.pool.null_buffer());
        }
        let (id, ptr) = self.pool.resolve(instance, addr)?;
        self.pool.set_cache(id);
        Some(ptr)
    }

    pub(crate) fn str_len(&self, ptr: NonNull<Cell>) -> VmResult<usize> {
        if let Some(len) = self.pool.find_cache(ptr) {
            return Ok(len);
        }
        let _original = self.hooks.str_len.original_call();
        // SAFETY: forwarded unchanged from the caller, who upholds the export table contract.
        unsafe { self.exports.str_len(ptr) }
    }

    pub(crate) fn find_public(&self, amx: &Amx, name: &str) -> VmResult<i32> {
        if let Some(id) = self.events.callback_id(amx, name) {
            return ExecIndex::Synthetic(id).encode().ok_or(VmError::Index);
        }
        self.find_public_original(amx, name)
    }

    fn find_public_original(&self, amx: &Amx, name: &str) -> VmResult<i32> {
        let _original = self.hooks.find_public.original_call();
        self.exports.find_public(amx, name)
    }
}

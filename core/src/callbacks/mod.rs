//! Original dispatch callbacks of instances whose callback is temporarily swapped.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use crate::amx::{Amx, Callback, InstanceId};

#[derive(Default)]
pub struct CallbackRegistry {
    saved: DashMap<InstanceId, Callback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `replacement` as the instance's callback, saving the current one.
    ///
    /// When an original is already saved (a nested swap before the first native call),
    /// it is kept and the instance's current callback is dropped instead.
    pub fn swap(&self, amx: &mut Amx, replacement: Callback) {
        let current = std::mem::replace(&mut amx.callback, replacement);
        match self.saved.entry(amx.id()) {
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(current);
                trace!(target: "vmhook::hooks", instance = %amx.id(), "callback saved");
            }
        }
    }

    /// Remove the saved original without touching the instance.
    pub fn take(&self, instance: InstanceId) -> Option<Callback> {
        self.saved.remove(&instance).map(|(_, callback)| callback)
    }

    /// Put the saved original back on the instance, if one is still saved.
    pub fn restore(&self, amx: &mut Amx) -> bool {
        match self.take(amx.id()) {
            Some(original) => {
                amx.callback = original;
                trace!(target: "vmhook::hooks", instance = %amx.id(), "callback restored");
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, instance: InstanceId) -> bool {
        self.saved.contains_key(&instance)
    }

    /// Drop whatever is saved for an unloaded instance.
    pub fn forget(&self, instance: InstanceId) -> bool {
        self.saved.remove(&instance).is_some()
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry").field("saved", &self.saved.len()).finish()
    }
}

/// Whether two callbacks are the same closure.
pub fn same_callback(a: &Callback, b: &Callback) -> bool {
    Arc::ptr_eq(a, b)
}

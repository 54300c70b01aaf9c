use std::ptr::NonNull;
use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use crate::amx::{Cell, InstanceId};

use super::address::{self, BindingKind};
use super::{NULL_ADDRESS, PoolError, StringId, StringObject};

struct Entry {
    object: StringObject,
    refs: u32,
    /// Birth reference, dropped by the next [`StringPool::collect`].
    implicit: bool,
    pinned: bool,
}

impl Entry {
    fn is_unreferenced(&self) -> bool {
        self.refs == 0 && !self.implicit && !self.pinned
    }
}

#[derive(Default)]
struct PoolInner {
    slots: Vec<Option<Entry>>,
    free: Vec<usize>,
    live: usize,
    bindings: FxHashMap<InstanceId, FxHashSet<Cell>>,
    cache: Option<StringId>,
}

impl PoolInner {
    fn entry(&self, id: StringId) -> Option<&Entry> {
        self.slots.get(id.slot()?)?.as_ref()
    }

    fn entry_mut(&mut self, id: StringId) -> Option<&mut Entry> {
        self.slots.get_mut(id.slot()?)?.as_mut()
    }

    fn insert(&mut self, entry: Entry) -> StringId {
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        // The slab cannot outgrow memory long before it outgrows a cell.
        StringId::new((slot + 1) as Cell)
    }

    fn destroy(&mut self, id: StringId) -> Option<StringObject> {
        let slot = id.slot()?;
        let entry = self.slots.get_mut(slot)?.take()?;
        self.free.push(slot);
        self.live -= 1;
        if self.cache == Some(id) {
            self.cache = None;
        }
        let addresses = [BindingKind::View, BindingKind::Record].map(|kind| address::encode(id, kind));
        self.bindings.retain(|_, bound| {
            for addr in addresses.iter().flatten() {
                bound.remove(addr);
            }
            !bound.is_empty()
        });
        trace!(target: "vmhook::strings", %id, "destroyed");
        Some(entry.object)
    }

    fn bind(&mut self, instance: InstanceId, id: StringId, kind: BindingKind) -> Result<Cell, PoolError> {
        if id.is_null() {
            return Ok(NULL_ADDRESS);
        }
        if self.entry(id).is_none() {
            return Err(PoolError::InvalidId(id.get()));
        }
        let addr = address::encode(id, kind).ok_or(PoolError::AddressOutOfRange(id.get()))?;
        self.bindings.entry(instance).or_default().insert(addr);
        Ok(addr)
    }
}

/// Identifier-indexed store of string objects.
///
/// Closures passed to the accessors run under the pool lock and must not call back into
/// the VM or the pool.
pub struct StringPool {
    inner: Mutex<PoolInner>,
    null_cell: Box<AtomicI32>,
}

impl StringPool {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PoolInner::default()),
            null_cell: Box::new(AtomicI32::new(0)),
        }
    }

    /// Store a temporary object: it lives until the end of the outermost execution unless
    /// a reference is acquired first.
    pub fn add(&self, object: StringObject) -> StringId {
        let id = self.inner.lock().insert(Entry {
            object,
            refs: 0,
            implicit: true,
            pinned: false,
        });
        trace!(target: "vmhook::strings", %id, "added");
        id
    }

    /// Store an object that only [`StringPool::remove_by_id`] destroys.
    pub fn add_pinned(&self, object: StringObject) -> StringId {
        let id = self.inner.lock().insert(Entry {
            object,
            refs: 0,
            implicit: false,
            pinned: true,
        });
        trace!(target: "vmhook::strings", %id, "added pinned");
        id
    }

    pub fn contains(&self, id: StringId) -> bool {
        self.inner.lock().entry(id).is_some()
    }

    pub fn get_by_id<R>(&self, id: StringId, f: impl FnOnce(&StringObject) -> R) -> Option<R> {
        self.inner.lock().entry(id).map(|entry| f(&entry.object))
    }

    pub fn get_by_id_mut<R>(&self, id: StringId, f: impl FnOnce(&mut StringObject) -> R) -> Option<R> {
        self.inner.lock().entry_mut(id).map(|entry| f(&mut entry.object))
    }

    pub fn remove_by_id(&self, id: StringId) -> Result<StringObject, PoolError> {
        self.inner.lock().destroy(id).ok_or(PoolError::InvalidId(id.get()))
    }

    /// Add a manual reference. Returns the new count.
    pub fn acquire_ref(&self, id: StringId) -> Result<u32, PoolError> {
        let mut inner = self.inner.lock();
        let entry = inner.entry_mut(id).ok_or(PoolError::InvalidId(id.get()))?;
        entry.refs = entry.refs.checked_add(1).ok_or(PoolError::CannotAcquire(id.get()))?;
        Ok(entry.refs)
    }

    /// Drop a manual reference. Returns the remaining count; the object is destroyed when
    /// nothing else keeps it alive.
    pub fn release_ref(&self, id: StringId) -> Result<u32, PoolError> {
        let mut inner = self.inner.lock();
        let entry = inner.entry_mut(id).ok_or(PoolError::InvalidId(id.get()))?;
        entry.refs = entry.refs.checked_sub(1).ok_or(PoolError::CannotRelease(id.get()))?;
        let refs = entry.refs;
        if entry.is_unreferenced() {
            inner.destroy(id);
        }
        Ok(refs)
    }

    pub fn ref_count(&self, id: StringId) -> Option<u32> {
        self.inner.lock().entry(id).map(|entry| entry.refs)
    }

    /// Drop every implicit reference and destroy what is left unreferenced. Returns how
    /// many objects were destroyed.
    pub fn collect(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut doomed = Vec::new();
        for (slot, entry) in inner.slots.iter_mut().enumerate() {
            if let Some(entry) = entry {
                entry.implicit = false;
                if entry.is_unreferenced() {
                    doomed.push(StringId::new((slot + 1) as Cell));
                }
            }
        }
        for id in &doomed {
            inner.destroy(*id);
        }
        if !doomed.is_empty() {
            debug!(target: "vmhook::strings", collected = doomed.len(), live = inner.live, "temporary strings collected");
        }
        doomed.len()
    }

    /// Synthetic address of the null-terminated view of `id`, valid for `instance` only.
    pub fn get_address(&self, instance: InstanceId, id: StringId) -> Result<Cell, PoolError> {
        self.inner.lock().bind(instance, id, BindingKind::View)
    }

    /// Synthetic address of the length-prefixed record of `id`, valid for `instance` only.
    pub fn get_inner_address(&self, instance: InstanceId, id: StringId) -> Result<Cell, PoolError> {
        self.inner.lock().bind(instance, id, BindingKind::Record)
    }

    /// Physical pointer behind a synthetic address bound for `instance`.
    pub fn resolve(&self, instance: InstanceId, addr: Cell) -> Option<(StringId, NonNull<Cell>)> {
        let (id, kind) = address::decode(addr)?;
        let mut inner = self.inner.lock();
        if !inner.bindings.get(&instance).is_some_and(|bound| bound.contains(&addr)) {
            return None;
        }
        let entry = inner.entry_mut(id)?;
        let ptr = match kind {
            BindingKind::View => entry.object.view_ptr(),
            BindingKind::Record => entry.object.record_ptr(),
        };
        Some((id, ptr))
    }

    pub fn is_null_address(&self, addr: Cell) -> bool {
        address::is_null(addr)
    }

    /// The shared one-cell buffer standing in for the null string, reset to empty.
    pub fn null_buffer(&self) -> NonNull<Cell> {
        self.null_cell.store(0, Ordering::Relaxed);
        NonNull::from(&*self.null_cell).cast::<Cell>()
    }

    /// Remember the most recently resolved object for the length fast path.
    pub fn set_cache(&self, id: StringId) {
        self.inner.lock().cache = Some(id);
    }

    /// Current extent of the cached object if `ptr` is where its view or record starts now.
    /// A view measures the object's length; a record also counts the length header, so
    /// measuring never walks into the header or stops at an embedded zero.
    pub fn find_cache(&self, ptr: NonNull<Cell>) -> Option<usize> {
        let inner = self.inner.lock();
        let object = &inner.entry(inner.cache?)?.object;
        let ptr = ptr.as_ptr().cast_const();
        if ptr == object.view_addr() {
            Some(object.len())
        } else if ptr == object.record_addr() {
            Some(object.len() + 1)
        } else {
            None
        }
    }

    /// Drop every binding of an unloaded instance.
    pub fn forget_instance(&self, instance: InstanceId) -> usize {
        self.inner
            .lock()
            .bindings
            .remove(&instance)
            .map_or(0, |bound| bound.len())
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.inner.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StringPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("StringPool")
            .field("live", &inner.live)
            .field("free", &inner.free.len())
            .field("cache", &inner.cache)
            .finish()
    }
}

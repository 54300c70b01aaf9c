use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{Amx, Cell, VmResult};

/// Runs a public function (or a special index) to completion, error or pause.
pub type ExecFn = dyn Fn(&mut Amx, Option<&mut Cell>, i32) -> VmResult<()> + Send + Sync;
/// Turns a VM address into a physical pointer.
pub type GetAddrFn = dyn Fn(&mut Amx, Cell) -> VmResult<NonNull<Cell>> + Send + Sync;
/// Measures the null-terminated string behind a physical pointer.
pub type StrLenFn = dyn Fn(NonNull<Cell>) -> VmResult<usize> + Send + Sync;
/// Looks a public function up by name and returns its execute index.
pub type FindPublicFn = dyn Fn(&Amx, &str) -> VmResult<i32> + Send + Sync;

/// Entry points of the export table that can be intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Export {
    Exec,
    GetAddr,
    StrLen,
    FindPublic,
}

impl Export {
    pub const ALL: [Export; 4] = [Export::Exec, Export::GetAddr, Export::StrLen, Export::FindPublic];

    pub fn name(self) -> &'static str {
        match self {
            Export::Exec => "Exec",
            Export::GetAddr => "GetAddr",
            Export::StrLen => "StrLen",
            Export::FindPublic => "FindPublic",
        }
    }
}

impl fmt::Display for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Process-wide function table every VM instance calls through.
///
/// Each slot is swapped atomically; callers clone the current entry and release the lock
/// before invoking it, so an entry may freely re-enter the table.
pub struct ExportTable {
    exec: RwLock<Arc<ExecFn>>,
    get_addr: RwLock<Arc<GetAddrFn>>,
    str_len: RwLock<Arc<StrLenFn>>,
    find_public: RwLock<Arc<FindPublicFn>>,
}

impl ExportTable {
    pub fn new(
        exec: Arc<ExecFn>,
        get_addr: Arc<GetAddrFn>,
        str_len: Arc<StrLenFn>,
        find_public: Arc<FindPublicFn>,
    ) -> Self {
        Self {
            exec: RwLock::new(exec),
            get_addr: RwLock::new(get_addr),
            str_len: RwLock::new(str_len),
            find_public: RwLock::new(find_public),
        }
    }

    pub fn exec(&self, amx: &mut Amx, retval: Option<&mut Cell>, index: i32) -> VmResult<()> {
        let entry = Arc::clone(&self.exec.read());
        entry(amx, retval, index)
    }

    pub fn get_addr(&self, amx: &mut Amx, addr: Cell) -> VmResult<NonNull<Cell>> {
        let entry = Arc::clone(&self.get_addr.read());
        entry(amx, addr)
    }

    /// # Safety
    ///
    /// `ptr` must point at a readable, null-terminated cell sequence, such as one returned by
    /// [`ExportTable::get_addr`] that has not been invalidated since.
    pub unsafe fn str_len(&self, ptr: NonNull<Cell>) -> VmResult<usize> {
        let entry = Arc::clone(&self.str_len.read());
        entry(ptr)
    }

    pub fn find_public(&self, amx: &Amx, name: &str) -> VmResult<i32> {
        let entry = Arc::clone(&self.find_public.read());
        entry(amx, name)
    }

    pub(crate) fn exec_slot(&self) -> &RwLock<Arc<ExecFn>> {
        &self.exec
    }

    pub(crate) fn get_addr_slot(&self) -> &RwLock<Arc<GetAddrFn>> {
        &self.get_addr
    }

    pub(crate) fn str_len_slot(&self) -> &RwLock<Arc<StrLenFn>> {
        &self.str_len
    }

    pub(crate) fn find_public_slot(&self) -> &RwLock<Arc<FindPublicFn>> {
        &self.find_public
    }
}

impl fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportTable").finish_non_exhaustive()
    }
}

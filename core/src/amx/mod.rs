//! In-process model of the script VM's ABI surface.
//!
//! The hook layer never owns a VM. It sees one through [`Amx`], the instance record the
//! host passes to every entry point, and through [`ExportTable`], the process-wide table of
//! entry points that hooks rewrite.

mod error;
mod exports;
mod index;
pub mod reference;

use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use error::{VmError, VmResult};
pub use exports::{ExecFn, Export, ExportTable, FindPublicFn, GetAddrFn, StrLenFn};
pub use index::{EXEC_CONT, EXEC_MAIN, ExecIndex};

/// Native scalar value of the VM; the unit of its linear memory.
pub type Cell = i32;

/// Size of one cell in bytes. VM addresses are byte offsets.
pub const CELL_BYTES: Cell = std::mem::size_of::<Cell>() as Cell;

/// Dispatch callback the VM invokes for every native call.
pub type Callback = Arc<dyn Fn(&mut Amx, Cell, &[Cell]) -> VmResult<Cell> + Send + Sync>;

/// A script-callable native function.
pub type Native = Arc<dyn Fn(&mut Amx, &[Cell]) -> VmResult<Cell> + Send + Sync>;

/// Body of a public function as seen by the reference executor.
pub type Script = Arc<dyn Fn(&mut Amx) -> VmResult<Cell> + Send + Sync>;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a VM instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amx#{}", self.0)
    }
}

/// Register file of an instance. Addresses are byte offsets into linear memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub cip: Cell,
    pub frm: Cell,
    pub stk: Cell,
    pub hea: Cell,
    pub pri: Cell,
    pub alt: Cell,
}

/// Snapshot of a suspended instance, enough for the owner of an awaited task to resume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeToken {
    instance: InstanceId,
    registers: Registers,
}

impl ResumeToken {
    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn registers(&self) -> Registers {
        self.registers
    }
}

/// One running script environment: linear memory, registers, publics, natives and the
/// dispatch callback.
pub struct Amx {
    id: InstanceId,
    exports: Arc<ExportTable>,
    /// Native dispatch callback. Swapped temporarily by the execute hook.
    pub callback: Callback,
    /// Status of the last failed operation, cleared when a suspension is routed.
    pub error: Option<VmError>,
    pub regs: Registers,
    memory: Box<[Cell]>,
    publics: Vec<(String, Script)>,
    natives: Vec<(String, Native)>,
}

impl Amx {
    /// Create an instance with `memory_cells` cells of linear memory bound to `exports`.
    pub fn new(exports: Arc<ExportTable>, memory_cells: usize) -> Self {
        let memory = vec![0; memory_cells].into_boxed_slice();
        let top = Cell::try_from(memory_cells)
            .ok()
            .and_then(|cells| cells.checked_mul(CELL_BYTES))
            .unwrap_or(Cell::MAX - (Cell::MAX % CELL_BYTES));
        Self {
            id: InstanceId::next(),
            exports,
            callback: Arc::new(reference::dispatch_native),
            error: None,
            regs: Registers {
                stk: top,
                frm: top,
                ..Registers::default()
            },
            memory,
            publics: Vec::new(),
            natives: Vec::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Export table this instance calls through.
    #[inline]
    pub fn exports(&self) -> Arc<ExportTable> {
        Arc::clone(&self.exports)
    }

    /// One past the highest valid byte address.
    pub fn stack_top(&self) -> Cell {
        Cell::try_from(self.memory.len())
            .ok()
            .and_then(|cells| cells.checked_mul(CELL_BYTES))
            .unwrap_or(Cell::MAX - (Cell::MAX % CELL_BYTES))
    }

    /// Record `err` as the instance status and hand it back for propagation.
    pub fn raise(&mut self, err: VmError) -> VmError {
        self.error = Some(err);
        err
    }

    /// Physical pointer for a real VM address: heap below `hea`, stack from `stk` up.
    pub(crate) fn cell_ptr(&mut self, addr: Cell) -> Option<NonNull<Cell>> {
        if addr < 0 || addr % CELL_BYTES != 0 {
            return None;
        }
        let in_heap = addr < self.regs.hea;
        let in_stack = addr >= self.regs.stk && addr < self.stack_top();
        if !(in_heap || in_stack) {
            return None;
        }
        let index = usize::try_from(addr / CELL_BYTES).ok()?;
        self.memory.get_mut(index).map(NonNull::from)
    }

    /// Reserve `cells` zeroed cells on the heap and return their address.
    pub fn allot(&mut self, cells: usize) -> VmResult<Cell> {
        let bytes = Cell::try_from(cells)
            .ok()
            .and_then(|cells| cells.checked_mul(CELL_BYTES))
            .ok_or(VmError::Memory)?;
        let base = self.regs.hea;
        let end = base.checked_add(bytes).ok_or(VmError::Memory)?;
        if end > self.regs.stk {
            return Err(self.raise(VmError::StackErr));
        }
        let start = (base / CELL_BYTES) as usize;
        self.memory[start..start + cells].fill(0);
        self.regs.hea = end;
        Ok(base)
    }

    /// Drop heap allocations above `hea`.
    pub fn release(&mut self, hea: Cell) {
        if hea >= 0 && hea < self.regs.hea {
            self.regs.hea = hea;
        }
    }

    /// Allocate a null-terminated copy of `text` on the heap.
    pub fn alloc_string(&mut self, text: &str) -> VmResult<Cell> {
        let cells: Vec<Cell> = text.chars().map(|c| c as Cell).collect();
        self.alloc_cells(&cells)
    }

    /// Allocate `cells` plus a terminator on the heap.
    pub fn alloc_cells(&mut self, cells: &[Cell]) -> VmResult<Cell> {
        let addr = self.allot(cells.len() + 1)?;
        let start = (addr / CELL_BYTES) as usize;
        self.memory[start..start + cells.len()].copy_from_slice(cells);
        Ok(addr)
    }

    /// Resolve `addr` through the export table (and therefore through installed hooks).
    pub fn get_addr(&mut self, addr: Cell) -> VmResult<NonNull<Cell>> {
        let exports = self.exports();
        exports.get_addr(self, addr)
    }

    /// Read the null-terminated string at `addr`, measuring it through the export table.
    pub fn read_string(&mut self, addr: Cell) -> VmResult<Vec<Cell>> {
        let ptr = self.get_addr(addr)?;
        let exports = self.exports();
        // SAFETY: `ptr` was just produced by the resolver for this instance.
        let len = unsafe { exports.str_len(ptr)? };
        // SAFETY: the resolver guarantees `len` readable cells before the terminator.
        let cells = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
        Ok(cells.to_vec())
    }

    /// Copy `count` cells starting at `addr`. As with the VM's own array natives, the caller
    /// vouches for the array size.
    pub fn read_cells(&mut self, addr: Cell, count: usize) -> VmResult<Vec<Cell>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let ptr = self.get_addr(addr)?;
        // SAFETY: see above; the first cell was resolved for this instance.
        let cells = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), count) };
        Ok(cells.to_vec())
    }

    /// Copy `cells` into the buffer at `addr` of `capacity` cells, always terminating it.
    /// Returns the number of cells written, excluding the terminator.
    pub fn write_string(&mut self, addr: Cell, cells: &[Cell], capacity: usize) -> VmResult<usize> {
        if capacity == 0 {
            return Ok(0);
        }
        let ptr = self.get_addr(addr)?;
        let count = cells.len().min(capacity - 1);
        // SAFETY: the caller vouches for `capacity` writable cells at `addr`, as the VM's
        // own string natives do.
        unsafe {
            std::ptr::copy_nonoverlapping(cells.as_ptr(), ptr.as_ptr(), count);
            ptr.as_ptr().add(count).write(0);
        }
        Ok(count)
    }

    /// Register a public function and return its index.
    pub fn add_public<F>(&mut self, name: &str, body: F) -> usize
    where
        F: Fn(&mut Amx) -> VmResult<Cell> + Send + Sync + 'static,
    {
        self.publics.push((name.to_string(), Arc::new(body)));
        self.publics.len() - 1
    }

    pub fn public(&self, index: usize) -> Option<Script> {
        self.publics.get(index).map(|(_, body)| Arc::clone(body))
    }

    pub fn find_public_index(&self, name: &str) -> Option<usize> {
        self.publics.iter().position(|(public, _)| public == name)
    }

    /// Register natives; later registrations under an existing name replace it.
    pub fn register_natives<I, S>(&mut self, natives: I)
    where
        I: IntoIterator<Item = (S, Native)>,
        S: Into<String>,
    {
        for (name, native) in natives {
            let name = name.into();
            match self.natives.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = native,
                None => self.natives.push((name, native)),
            }
        }
    }

    pub fn register_native<F>(&mut self, name: &str, native: F)
    where
        F: Fn(&mut Amx, &[Cell]) -> VmResult<Cell> + Send + Sync + 'static,
    {
        let native: Native = Arc::new(native);
        self.register_natives([(name, native)]);
    }

    pub fn find_native(&self, name: &str) -> Option<Cell> {
        self.natives
            .iter()
            .position(|(native, _)| native == name)
            .and_then(|index| Cell::try_from(index).ok())
    }

    pub fn native(&self, index: Cell) -> Option<Native> {
        let index = usize::try_from(index).ok()?;
        self.natives.get(index).map(|(_, native)| Arc::clone(native))
    }

    /// Call a native by name through the current dispatch callback, as compiled code would.
    pub fn call_native(&mut self, name: &str, args: &[Cell]) -> VmResult<Cell> {
        let index = self.find_native(name).ok_or(VmError::NotFound)?;
        let callback = Arc::clone(&self.callback);
        callback(self, index, args)
    }

    /// Execute through the export table and return the script's return value.
    pub fn exec(&mut self, index: i32) -> VmResult<Cell> {
        let exports = self.exports();
        let mut retval = 0;
        exports.exec(self, Some(&mut retval), index)?;
        Ok(retval)
    }

    /// Look a public up through the export table and execute it.
    pub fn exec_public(&mut self, name: &str) -> VmResult<Cell> {
        let exports = self.exports();
        let index = exports.find_public(self, name)?;
        self.exec(index)
    }

    pub fn resume_token(&self) -> ResumeToken {
        ResumeToken {
            instance: self.id,
            registers: self.regs,
        }
    }

    /// Restore registers captured by [`Amx::resume_token`].
    pub fn restore(&mut self, token: &ResumeToken) -> VmResult<()> {
        if token.instance != self.id {
            return Err(self.raise(VmError::InvalidState));
        }
        self.regs = token.registers;
        Ok(())
    }
}

impl fmt::Debug for Amx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Amx")
            .field("id", &self.id)
            .field("error", &self.error)
            .field("regs", &self.regs)
            .field("memory_cells", &self.memory.len())
            .field("publics", &self.publics.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .field("natives", &self.natives.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod amx_test;
#[cfg(test)]
mod index_test;

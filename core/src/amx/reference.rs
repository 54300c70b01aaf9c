//! Reference implementations of the four entry points over the in-process [`Amx`] model.
//!
//! These stand in for the foreign VM's own exports: hooks capture them as the "original"
//! functions and call back into them.

use std::ptr::NonNull;
use std::sync::Arc;

use super::{Amx, Cell, ExecIndex, ExportTable, VmError, VmResult};

/// Name of the public run for [`ExecIndex::Main`].
pub const MAIN: &str = "main";

/// Export table populated with the reference entries.
pub fn exports() -> ExportTable {
    ExportTable::new(Arc::new(exec), Arc::new(get_addr), Arc::new(str_len), Arc::new(find_public))
}

pub fn exec(amx: &mut Amx, retval: Option<&mut Cell>, index: i32) -> VmResult<()> {
    let script = match ExecIndex::decode(index) {
        ExecIndex::Main => amx.find_public_index(MAIN).and_then(|index| amx.public(index)),
        ExecIndex::Public(index) => amx.public(index as usize),
        // Nothing is ever left half-run by the reference executor, and synthetic ids must be
        // decoded before they reach the VM.
        ExecIndex::Continue | ExecIndex::Synthetic(_) => None,
    };
    let Some(script) = script else {
        return Err(amx.raise(VmError::Index));
    };

    match script(amx) {
        Ok(value) => {
            if let Some(retval) = retval {
                *retval = value;
            }
            Ok(())
        }
        Err(err) => Err(amx.raise(err)),
    }
}

pub fn get_addr(amx: &mut Amx, addr: Cell) -> VmResult<NonNull<Cell>> {
    amx.cell_ptr(addr).ok_or(VmError::MemAccess)
}

pub fn str_len(ptr: NonNull<Cell>) -> VmResult<usize> {
    let mut len = 0usize;
    // SAFETY: the export table contract requires a null-terminated sequence behind `ptr`.
    unsafe {
        while ptr.as_ptr().add(len).read() != 0 {
            len += 1;
        }
    }
    Ok(len)
}

pub fn find_public(amx: &Amx, name: &str) -> VmResult<i32> {
    amx.find_public_index(name)
        .and_then(|index| i32::try_from(index).ok())
        .ok_or(VmError::NotFound)
}

/// Default dispatch callback: look the native up by index and run it.
pub fn dispatch_native(amx: &mut Amx, index: Cell, params: &[Cell]) -> VmResult<Cell> {
    let Some(native) = amx.native(index) else {
        return Err(amx.raise(VmError::NotFound));
    };
    native(amx, params)
}

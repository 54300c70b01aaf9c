use crate::amx::{CELL_BYTES, Cell};

use super::StringId;

/// Lowest synthetic address. Real instance memory never reaches this far.
pub const POOL_ADDRESS_BASE: Cell = 0x4000_0000;

/// Address handed out for the null string.
pub const NULL_ADDRESS: Cell = POOL_ADDRESS_BASE;

/// Which part of an object's buffer a synthetic address points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// The null-terminated cells.
    View,
    /// The length-prefixed record, one cell before the view.
    Record,
}

impl BindingKind {
    fn bit(self) -> Cell {
        match self {
            BindingKind::View => 0,
            BindingKind::Record => 1,
        }
    }
}

// Each id owns two consecutive cell-sized slots above the base: view, then record.

pub(super) fn encode(id: StringId, kind: BindingKind) -> Option<Cell> {
    let slot = id.get().checked_mul(2)?.checked_add(kind.bit())?;
    POOL_ADDRESS_BASE.checked_add(slot.checked_mul(CELL_BYTES)?)
}

pub(super) fn decode(addr: Cell) -> Option<(StringId, BindingKind)> {
    let offset = addr.checked_sub(POOL_ADDRESS_BASE)?;
    if offset < 0 || offset % CELL_BYTES != 0 {
        return None;
    }
    let slot = offset / CELL_BYTES;
    let kind = if slot % 2 == 0 { BindingKind::View } else { BindingKind::Record };
    let id = StringId::new(slot / 2);
    (!id.is_null()).then_some((id, kind))
}

pub(super) fn is_null(addr: Cell) -> bool {
    addr == NULL_ADDRESS || addr == NULL_ADDRESS + CELL_BYTES
}

//! Pool of reference-counted string objects that scripts address as ordinary memory.

mod address;
mod object;
mod pool;

use std::fmt;

use thiserror::Error;

use crate::amx::Cell;

pub use address::{BindingKind, NULL_ADDRESS, POOL_ADDRESS_BASE};
pub use object::StringObject;
pub use pool::StringPool;

/// Handle of a pooled string as scripts see it. `0` is the null string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StringId(Cell);

impl StringId {
    pub const NULL: StringId = StringId(0);

    #[inline]
    pub fn new(raw: Cell) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> Cell {
        self.0
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Slab slot of a non-null id.
    pub(crate) fn slot(self) -> Option<usize> {
        usize::try_from(self.0).ok()?.checked_sub(1)
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "str#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("invalid string id {0}")]
    InvalidId(Cell),
    #[error("reference count of string {0} cannot be increased")]
    CannotAcquire(Cell),
    #[error("reference count of string {0} cannot be decreased")]
    CannotRelease(Cell),
    #[error("string {0} has no representable address")]
    AddressOutOfRange(Cell),
}

/// How cells copied out of VM memory are adjusted on creation. Bit `1` keeps the low byte
/// of each cell; bit `2` replaces embedded zero cells so they do not terminate the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateMode {
    pub truncate: bool,
    pub no_nulls: bool,
}

impl CreateMode {
    pub const TRUNCATE: Cell = 1;
    pub const NO_NULLS: Cell = 2;

    /// Stand-in for an embedded zero cell under `no_nulls`.
    pub const NULL_REPLACEMENT: Cell = 0x00FF_FF00;

    pub fn from_flags(flags: Cell) -> Self {
        Self {
            truncate: flags & Self::TRUNCATE != 0,
            no_nulls: flags & Self::NO_NULLS != 0,
        }
    }

    pub fn apply(self, cell: Cell) -> Cell {
        let cell = if self.truncate { cell & 0xFF } else { cell };
        if self.no_nulls && cell == 0 {
            Self::NULL_REPLACEMENT
        } else {
            cell
        }
    }
}

#[cfg(test)]
mod object_test;

use std::cmp::Ordering;
use std::fmt;
use std::ptr::NonNull;

use crate::amx::Cell;

use super::CreateMode;

/// Resizable cell string.
///
/// The backing buffer is always `[len, cells..., 0]`, so the same allocation serves as a
/// null-terminated view (from cell 1) and as a length-prefixed record (from cell 0).
/// Pointers into the buffer are invalidated by any edit that grows it.
#[derive(Clone)]
pub struct StringObject {
    buf: Vec<Cell>,
}

impl StringObject {
    pub fn new() -> Self {
        Self { buf: vec![0, 0] }
    }

    pub fn from_cells(cells: &[Cell]) -> Self {
        let mut buf = Vec::with_capacity(cells.len() + 2);
        buf.push(0);
        buf.extend_from_slice(cells);
        buf.push(0);
        let mut object = Self { buf };
        object.seal();
        object
    }

    /// Copy cells read from VM memory, adjusting each per `mode`.
    pub fn from_vm(cells: &[Cell], mode: CreateMode) -> Self {
        let mut object = Self::from_cells(cells);
        if mode != CreateMode::default() {
            object.cells_mut().iter_mut().for_each(|cell| *cell = mode.apply(*cell));
        }
        object
    }

    pub fn len(&self) -> usize {
        self.buf.len() - 2
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_cells(&self) -> &[Cell] {
        &self.buf[1..self.buf.len() - 1]
    }

    fn cells_mut(&mut self) -> &mut [Cell] {
        let end = self.buf.len() - 1;
        &mut self.buf[1..end]
    }

    /// The length header followed by the cells and terminator.
    pub fn as_record(&self) -> &[Cell] {
        &self.buf
    }

    pub fn get(&self, index: usize) -> Option<Cell> {
        self.as_cells().get(index).copied()
    }

    /// Overwrite one cell. Returns `false` when `index` is out of range.
    pub fn set(&mut self, index: usize, cell: Cell) -> bool {
        match self.cells_mut().get_mut(index) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, cell: Cell) {
        let end = self.buf.len() - 1;
        self.buf.insert(end, cell);
        self.seal();
    }

    pub fn extend_from_slice(&mut self, cells: &[Cell]) {
        let end = self.buf.len() - 1;
        self.buf.splice(end..end, cells.iter().copied());
        self.seal();
    }

    /// Insert `cells` before position `at`. Returns `false` when `at` is past the end.
    pub fn insert(&mut self, at: usize, cells: &[Cell]) -> bool {
        if at > self.len() {
            return false;
        }
        self.buf.splice(at + 1..at + 1, cells.iter().copied());
        self.seal();
        true
    }

    /// Remove up to `count` cells starting at `start`; out-of-range parts are ignored.
    pub fn erase(&mut self, start: usize, count: usize) {
        let start = start.min(self.len());
        let end = start.saturating_add(count).min(self.len());
        self.buf.drain(start + 1..end + 1);
        self.seal();
    }

    pub fn resize(&mut self, len: usize, fill: Cell) {
        self.buf.pop();
        self.buf.resize(len + 1, fill);
        self.buf.push(0);
        self.seal();
    }

    pub fn clear(&mut self) {
        self.buf.truncate(1);
        self.buf.push(0);
        self.seal();
    }

    /// Copy of `len` cells from `start`, clamped to the string.
    pub fn substring(&self, start: usize, len: usize) -> StringObject {
        let start = start.min(self.len());
        let end = start.saturating_add(len).min(self.len());
        Self::from_cells(&self.as_cells()[start..end])
    }

    pub fn to_upper(&mut self) {
        self.map_ascii(u8::to_ascii_uppercase);
    }

    pub fn to_lower(&mut self) {
        self.map_ascii(u8::to_ascii_lowercase);
    }

    fn map_ascii(&mut self, f: fn(&u8) -> u8) {
        for cell in self.cells_mut() {
            if let Ok(byte) = u8::try_from(*cell) {
                *cell = Cell::from(f(&byte));
            }
        }
    }

    /// Cells as text; cells that are not scalar values become U+FFFD.
    pub fn to_string_lossy(&self) -> String {
        self.as_cells()
            .iter()
            .map(|cell| u32::try_from(*cell).ok().and_then(char::from_u32).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// Pointer to the first cell of the null-terminated view.
    pub(crate) fn view_ptr(&mut self) -> NonNull<Cell> {
        // SAFETY: the buffer always holds at least the header and the terminator.
        unsafe { self.record_ptr().add(1) }
    }

    /// Pointer to the length header.
    pub(crate) fn record_ptr(&mut self) -> NonNull<Cell> {
        NonNull::from(self.buf.as_mut_slice()).cast::<Cell>()
    }

    /// Where the view currently starts, for identity checks only.
    pub(crate) fn view_addr(&self) -> *const Cell {
        self.buf[1..].as_ptr()
    }

    /// Where the length header currently sits, for identity checks only.
    pub(crate) fn record_addr(&self) -> *const Cell {
        self.buf.as_ptr()
    }

    fn seal(&mut self) {
        let len = Cell::try_from(self.len()).unwrap_or(Cell::MAX);
        self.buf[0] = len;
    }
}

impl Default for StringObject {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for StringObject {
    fn from(text: &str) -> Self {
        let cells: Vec<Cell> = text.chars().map(|c| c as Cell).collect();
        Self::from_cells(&cells)
    }
}

impl PartialEq for StringObject {
    fn eq(&self, other: &Self) -> bool {
        self.as_cells() == other.as_cells()
    }
}

impl Eq for StringObject {}

impl PartialOrd for StringObject {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StringObject {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_cells().cmp(other.as_cells())
    }
}

impl fmt::Debug for StringObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringObject({:?})", self.to_string_lossy())
    }
}

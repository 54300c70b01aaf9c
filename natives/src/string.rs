use std::sync::Arc;

use vmhook_core::amx::{Amx, Cell, Native};
use vmhook_core::strings::{CreateMode, PoolError, StringId, StringObject, StringPool};

use crate::error::{NativeError, NativeResult, opt, require, to_usize};
use crate::{NativeModule, native};

/// Returned by `str_getc` and `str_setc` for an invalid id or position.
pub const INVALID_CHAR: Cell = 0xFFFF_FF00_u32 as Cell;

/// Natives over the string pool.
#[derive(Debug)]
pub struct StringNatives {
    pool: Arc<StringPool>,
}

impl StringNatives {
    pub fn new(pool: Arc<StringPool>) -> Self {
        Self { pool }
    }
}

impl NativeModule for StringNatives {
    fn name(&self) -> &str {
        "string"
    }

    fn description(&self) -> &str {
        "Pooled, reference-counted strings"
    }

    fn exports(&self) -> Vec<(&'static str, Native)> {
        let pool = &self.pool;
        vec![
            native(pool, "str_new", str_new),
            native(pool, "str_new_arr", str_new_arr),
            native(pool, "str_new_buf", str_new_buf),
            native(pool, "str_addr", str_addr),
            native(pool, "str_buf_addr", str_buf_addr),
            native(pool, "str_acquire", str_acquire),
            native(pool, "str_release", str_release),
            native(pool, "str_delete", str_delete),
            native(pool, "str_valid", str_valid),
            native(pool, "str_clone", str_clone),
            native(pool, "str_len", str_len),
            native(pool, "str_get", str_get),
            native(pool, "str_getc", str_getc),
            native(pool, "str_setc", str_setc),
            native(pool, "str_append", str_append),
            native(pool, "str_cat", str_cat),
            native(pool, "str_resize", str_resize),
            native(pool, "str_clear", str_clear),
            native(pool, "str_to_upper", str_to_upper),
            native(pool, "str_to_lower", str_to_lower),
        ]
    }
}

fn invalid(id: StringId) -> NativeError {
    PoolError::InvalidId(id.get()).into()
}

/// Copy of a live object; the null id reads as the empty string.
fn snapshot(pool: &StringPool, id: StringId) -> NativeResult<StringObject> {
    if id.is_null() {
        return Ok(StringObject::new());
    }
    pool.get_by_id(id, StringObject::clone).ok_or_else(|| invalid(id))
}

fn edit<R>(pool: &StringPool, id: StringId, f: impl FnOnce(&mut StringObject) -> R) -> NativeResult<R> {
    pool.get_by_id_mut(id, f).ok_or_else(|| invalid(id))
}

fn id_arg(params: &[Cell], index: usize) -> StringId {
    StringId::new(opt(params, index, 0))
}

// str_new(const str[], mode = 0)
fn str_new(pool: &StringPool, amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    let cells = amx.read_string(params[0])?;
    let mode = CreateMode::from_flags(opt(params, 1, 0));
    Ok(pool.add(StringObject::from_vm(&cells, mode)).get())
}

// str_new_arr(const arr[], size, mode = 0)
fn str_new_arr(pool: &StringPool, amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 2)?;
    let size = to_usize("size", params[1])?;
    let cells = amx.read_cells(params[0], size)?;
    let mode = CreateMode::from_flags(opt(params, 2, 0));
    Ok(pool.add(StringObject::from_vm(&cells, mode)).get())
}

// str_new_buf(size): room for `size - 1` cells plus the terminator
fn str_new_buf(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    if params[0] < 1 {
        return Err(NativeError::OutOfRange {
            what: "size",
            value: params[0],
        });
    }
    let len = to_usize("size", params[0] - 1)?;
    let mut object = StringObject::new();
    object.resize(len, 0);
    Ok(pool.add(object).get())
}

fn str_addr(pool: &StringPool, amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    Ok(pool.get_address(amx.id(), id_arg(params, 0))?)
}

fn str_buf_addr(pool: &StringPool, amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    Ok(pool.get_inner_address(amx.id(), id_arg(params, 0))?)
}

fn str_acquire(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    pool.acquire_ref(id_arg(params, 0))?;
    Ok(params[0])
}

fn str_release(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    pool.release_ref(id_arg(params, 0))?;
    Ok(params[0])
}

fn str_delete(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    pool.remove_by_id(id_arg(params, 0))?;
    Ok(1)
}

fn str_valid(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    Ok(Cell::from(pool.contains(id_arg(params, 0))))
}

fn str_clone(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    let id = id_arg(params, 0);
    let copy = pool.get_by_id(id, StringObject::clone).ok_or_else(|| invalid(id))?;
    Ok(pool.add(copy).get())
}

fn str_len(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    let len = snapshot(pool, id_arg(params, 0))?.len();
    Ok(Cell::try_from(len).unwrap_or(Cell::MAX))
}

// str_get(str, buffer[], size, start = 0, end = cellmax)
fn str_get(pool: &StringPool, amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 3)?;
    let capacity = to_usize("size", params[2])?;
    if capacity == 0 {
        return Ok(0);
    }
    let object = snapshot(pool, id_arg(params, 0))?;
    let start = to_usize("start", opt(params, 3, 0).max(0))?.min(object.len());
    let end = to_usize("end", opt(params, 4, Cell::MAX).max(0))?.min(object.len());
    let slice = object.as_cells().get(start..end).unwrap_or_default();
    let written = amx.write_string(params[1], slice, capacity)?;
    Ok(Cell::try_from(written).unwrap_or(Cell::MAX))
}

fn str_getc(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 2)?;
    let Ok(pos) = usize::try_from(params[1]) else {
        return Ok(INVALID_CHAR);
    };
    Ok(pool.get_by_id(id_arg(params, 0), |s| s.get(pos)).flatten().unwrap_or(INVALID_CHAR))
}

// str_setc(str, pos, value) -> previous cell
fn str_setc(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 3)?;
    let Ok(pos) = usize::try_from(params[1]) else {
        return Ok(INVALID_CHAR);
    };
    let value = params[2];
    let previous = pool.get_by_id_mut(id_arg(params, 0), |s| {
        let previous = s.get(pos)?;
        s.set(pos, value);
        Some(previous)
    });
    Ok(previous.flatten().unwrap_or(INVALID_CHAR))
}

fn str_append(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 2)?;
    let other = snapshot(pool, id_arg(params, 1))?;
    edit(pool, id_arg(params, 0), |target| target.extend_from_slice(other.as_cells()))?;
    Ok(params[0])
}

fn str_cat(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 2)?;
    let mut joined = snapshot(pool, id_arg(params, 0))?;
    joined.extend_from_slice(snapshot(pool, id_arg(params, 1))?.as_cells());
    Ok(pool.add(joined).get())
}

// str_resize(str, size, padding = 0)
fn str_resize(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 2)?;
    let len = to_usize("size", params[1])?;
    let padding = opt(params, 2, 0);
    edit(pool, id_arg(params, 0), |s| s.resize(len, padding))?;
    Ok(params[0])
}

fn str_clear(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    edit(pool, id_arg(params, 0), StringObject::clear)?;
    Ok(params[0])
}

fn str_to_upper(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    let mut copy = snapshot(pool, id_arg(params, 0))?;
    copy.to_upper();
    Ok(pool.add(copy).get())
}

fn str_to_lower(pool: &StringPool, _amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    require(params, 1)?;
    let mut copy = snapshot(pool, id_arg(params, 0))?;
    copy.to_lower();
    Ok(pool.add(copy).get())
}

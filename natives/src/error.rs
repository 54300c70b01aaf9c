use thiserror::Error;
use tracing::error;
use vmhook_core::amx::{Amx, Cell, VmError, VmResult};
use vmhook_core::strings::PoolError;

/// Misuse of a native by a script. Anything but [`NativeError::Vm`] is reported as a
/// logic error and fails the native.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NativeError {
    #[error("expected at least {expected} arguments, got {got}")]
    Params { expected: usize, got: usize },
    #[error("{what} out of range: {value}")]
    OutOfRange { what: &'static str, value: Cell },
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Task(#[from] TaskError),
    /// A VM status to hand back unchanged, such as a suspension request.
    #[error(transparent)]
    Vm(#[from] VmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("invalid task id {0}")]
    InvalidId(Cell),
    #[error("task {0} already completed")]
    Completed(Cell),
    #[error("task {0} has not completed")]
    Pending(Cell),
}

pub type NativeResult<T> = Result<T, NativeError>;

/// Turn the outcome of a native body into what the VM sees.
pub(crate) fn finish(amx: &mut Amx, native: &str, result: NativeResult<Cell>) -> VmResult<Cell> {
    match result {
        Ok(value) => Ok(value),
        Err(NativeError::Vm(status)) => Err(status),
        Err(err) => {
            error!(target: "vmhook::natives", native, instance = %amx.id(), "{err}");
            Err(amx.raise(VmError::Native))
        }
    }
}

pub(crate) fn require(params: &[Cell], expected: usize) -> NativeResult<()> {
    if params.len() < expected {
        return Err(NativeError::Params {
            expected,
            got: params.len(),
        });
    }
    Ok(())
}

/// Optional trailing argument.
#[inline]
pub(crate) fn opt(params: &[Cell], index: usize, default: Cell) -> Cell {
    params.get(index).copied().unwrap_or(default)
}

/// Non-negative argument as a size or position.
pub(crate) fn to_usize(what: &'static str, value: Cell) -> NativeResult<usize> {
    usize::try_from(value).map_err(|_| NativeError::OutOfRange { what, value })
}

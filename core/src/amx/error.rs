use thiserror::Error;

/// Status codes the VM reports from its entry points. Success is `Ok(..)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum VmError {
    #[error("forced exit")]
    Exit,
    #[error("assertion failed")]
    Assert,
    #[error("stack/heap collision")]
    StackErr,
    #[error("index out of bounds")]
    Bounds,
    #[error("invalid memory access")]
    MemAccess,
    #[error("invalid instruction")]
    InvalidInstruction,
    #[error("stack underflow")]
    StackLow,
    #[error("heap underflow")]
    HeapLow,
    #[error("no callback, or invalid callback")]
    Callback,
    #[error("native function failed")]
    Native,
    #[error("divide by zero")]
    Divide,
    #[error("execution paused")]
    Sleep,
    #[error("invalid state for this access")]
    InvalidState,
    #[error("out of memory")]
    Memory,
    #[error("invalid file format")]
    Format,
    #[error("file is for a newer version of the VM")]
    Version,
    #[error("function not found")]
    NotFound,
    #[error("invalid index parameter")]
    Index,
    #[error("parameter error")]
    Params,
    #[error("general error")]
    General,
}

pub type VmResult<T> = Result<T, VmError>;

impl VmError {
    /// Numeric status code as reported across the VM boundary.
    pub const fn code(self) -> i32 {
        match self {
            VmError::Exit => 1,
            VmError::Assert => 2,
            VmError::StackErr => 3,
            VmError::Bounds => 4,
            VmError::MemAccess => 5,
            VmError::InvalidInstruction => 6,
            VmError::StackLow => 7,
            VmError::HeapLow => 8,
            VmError::Callback => 9,
            VmError::Native => 10,
            VmError::Divide => 11,
            VmError::Sleep => 12,
            VmError::InvalidState => 13,
            VmError::Memory => 16,
            VmError::Format => 17,
            VmError::Version => 18,
            VmError::NotFound => 19,
            VmError::Index => 20,
            VmError::Params => 25,
            VmError::General => 27,
        }
    }

    /// Decode a status code; `0` (no error) yields `None`, unknown codes map to `General`.
    pub fn from_code(code: i32) -> Option<Self> {
        let err = match code {
            0 => return None,
            1 => VmError::Exit,
            2 => VmError::Assert,
            3 => VmError::StackErr,
            4 => VmError::Bounds,
            5 => VmError::MemAccess,
            6 => VmError::InvalidInstruction,
            7 => VmError::StackLow,
            8 => VmError::HeapLow,
            9 => VmError::Callback,
            10 => VmError::Native,
            11 => VmError::Divide,
            12 => VmError::Sleep,
            13 => VmError::InvalidState,
            16 => VmError::Memory,
            17 => VmError::Format,
            18 => VmError::Version,
            19 => VmError::NotFound,
            20 => VmError::Index,
            25 => VmError::Params,
            _ => VmError::General,
        };
        Some(err)
    }
}

/// Execute index that runs the entry point (`main`).
pub const EXEC_MAIN: i32 = -1;
/// Execute index that continues a previously paused execution.
pub const EXEC_CONT: i32 = -2;

const SYNTHETIC_BASE: i32 = -3;

/// Decoded form of the `index` argument of the execute entry point.
///
/// Synthetic callbacks share the index parameter with real publics: an id is folded in as
/// `-3 - id`, so every value at or below `-3` names one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecIndex {
    Main,
    Continue,
    Public(u32),
    Synthetic(u32),
}

impl ExecIndex {
    pub fn decode(raw: i32) -> Self {
        match raw {
            EXEC_MAIN => ExecIndex::Main,
            EXEC_CONT => ExecIndex::Continue,
            n if n >= 0 => ExecIndex::Public(n as u32),
            n => ExecIndex::Synthetic((SYNTHETIC_BASE - n) as u32),
        }
    }

    /// Fold back into the raw index; `None` when the payload does not fit.
    pub fn encode(self) -> Option<i32> {
        match self {
            ExecIndex::Main => Some(EXEC_MAIN),
            ExecIndex::Continue => Some(EXEC_CONT),
            ExecIndex::Public(n) => i32::try_from(n).ok(),
            ExecIndex::Synthetic(id) => i32::try_from(id).ok().and_then(|id| SYNTHETIC_BASE.checked_sub(id)),
        }
    }
}

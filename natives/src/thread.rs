use std::sync::Arc;

use vmhook_core::Subsystem;
use vmhook_core::amx::{Amx, Cell, Native};
use vmhook_core::context::ReclaimMarker;

use crate::error::NativeResult;
use crate::{NativeModule, native};

#[derive(Debug)]
pub struct ThreadNatives {
    subsystem: Arc<Subsystem>,
}

impl ThreadNatives {
    pub fn new(subsystem: Arc<Subsystem>) -> Self {
        Self { subsystem }
    }
}

impl NativeModule for ThreadNatives {
    fn name(&self) -> &str {
        "thread"
    }

    fn exports(&self) -> Vec<(&'static str, Native)> {
        vec![native(&self.subsystem, "thread_detach", thread_detach)]
    }
}

// thread_detach(marker = 0): the thread system reclaims memory up to `marker`
fn thread_detach(subsystem: &Subsystem, amx: &mut Amx, params: &[Cell]) -> NativeResult<Cell> {
    let marker = ReclaimMarker(params.first().copied().unwrap_or_default());
    Err(subsystem.request_detach(amx, marker, 0).into())
}

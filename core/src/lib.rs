pub mod amx;
pub mod callbacks;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod hooks;
pub mod logging;
pub mod strings;

// Owner of the hook state; everything else is reachable through it
mod subsystem;

pub use subsystem::Subsystem;

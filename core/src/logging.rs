//! Stderr tracing output for hosts that do not install their own subscriber.
//!
//! Driven by [`HookConfig::trace`](crate::config::HookConfig::trace): a filter expression
//! such as `vmhook::dispatch=debug,vmhook::strings=trace` turns output on when the first
//! [`Subsystem`](crate::Subsystem) is created.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static TRACE_INIT: Once = Once::new();

/// Filter used when tracing is switched on without naming one.
pub const DEFAULT_TRACE_FILTER: &str =
    "vmhook::hooks=info,vmhook::dispatch=info,vmhook::strings=info,vmhook::natives=warn,vmhook::tasks=info";

/// `filter`, or the default filter when it does not parse.
fn env_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_TRACE_FILTER))
}

/// Install a stderr subscriber filtered by `filter`. Only the first call in the process
/// does anything, and nothing happens if the host already installed a subscriber.
pub fn init_tracing(filter: &str) {
    TRACE_INIT.call_once(|| {
        let installed = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter(filter))
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!(target: "vmhook::hooks", filter, "tracing enabled");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_TRACE_FILTER, env_filter};

    #[test]
    fn test_invalid_filter_falls_back_to_default() {
        let fallback = env_filter("vmhook::hooks=loudest");
        assert_eq!(fallback.to_string(), super::EnvFilter::new(DEFAULT_TRACE_FILTER).to_string());
        assert!(env_filter("vmhook::strings=trace").to_string().contains("vmhook::strings=trace"));
    }
}

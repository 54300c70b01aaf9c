use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::logging::DEFAULT_TRACE_FILTER;

pub const STR_LEN_ENV: &str = "VMHOOK_STR_LEN";
pub const REF_ARGS_ENV: &str = "VMHOOK_REF_ARGS";
/// A switch (`1`, `off`, ...) or a filter expression for [`HookConfig::trace`].
pub const TRACE_ENV: &str = "VMHOOK_TRACE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid hook configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Hook behavior chosen at load time.
///
/// ```toml
/// hook_str_len = true
/// hook_ref_args = false
/// trace = "vmhook::dispatch=debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    /// Intercept string length queries so pooled strings report their length directly.
    pub hook_str_len: bool,
    /// Also treat the cell behind a valid address as a possible pooled address.
    pub hook_ref_args: bool,
    /// Tracing filter for the built-in stderr subscriber; `None` leaves logging to the host.
    pub trace: Option<String>,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            hook_str_len: true,
            hook_ref_args: false,
            trace: None,
        }
    }
}

impl HookConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Apply `VMHOOK_STR_LEN`, `VMHOOK_REF_ARGS` and `VMHOOK_TRACE` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        for (key, flag) in [(STR_LEN_ENV, &mut self.hook_str_len), (REF_ARGS_ENV, &mut self.hook_ref_args)] {
            let Some(raw) = lookup(key) else { continue };
            match parse_switch(&raw) {
                Some(on) => *flag = on,
                None => warn!(target: "vmhook::hooks", key, value = %raw, "ignoring unrecognized switch"),
            }
        }
        if let Some(raw) = lookup(TRACE_ENV) {
            self.trace = match parse_switch(&raw) {
                Some(true) => self.trace.take().or_else(|| Some(DEFAULT_TRACE_FILTER.to_string())),
                Some(false) => None,
                None => Some(raw.trim().to_string()),
            };
        }
        self
    }
}

/// `Some(true)` for `1`/`true`/`on`/`yes`, `Some(false)` for empty, `0`, `false`, `off` and
/// `no`, in any case. Anything else is not a switch.
pub fn parse_switch(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    let is = |word: &str| raw.eq_ignore_ascii_case(word);
    if raw.is_empty() || is("0") || is("false") || is("off") || is("no") {
        Some(false)
    } else if is("1") || is("true") || is("on") || is("yes") {
        Some(true)
    } else {
        None
    }
}

#[cfg(test)]
mod config_test;

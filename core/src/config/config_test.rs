#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;

    use crate::config::{HookConfig, REF_ARGS_ENV, STR_LEN_ENV, TRACE_ENV, parse_switch};
    use crate::logging::DEFAULT_TRACE_FILTER;

    #[test]
    fn test_defaults() {
        let config = HookConfig::default();
        assert!(config.hook_str_len);
        assert!(!config.hook_ref_args);
        assert_eq!(HookConfig::from_toml_str("").ok(), Some(config));
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() -> Result<()> {
        let config = HookConfig::from_toml_str("hook_ref_args = true")?;
        assert!(config.hook_str_len);
        assert!(config.hook_ref_args);
        assert_eq!(config.trace, None);

        let traced = HookConfig::from_toml_str("trace = \"vmhook::dispatch=debug\"")?;
        assert_eq!(traced.trace.as_deref(), Some("vmhook::dispatch=debug"));
        Ok(())
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = HookConfig::from_toml_str("hook_everything = true").unwrap_err();
        assert!(err.to_string().contains("hook_everything"));
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "hook_str_len = false")?;
        let config = HookConfig::from_file(file.path())?;
        assert!(!config.hook_str_len);

        let missing = file.path().with_extension("missing");
        assert!(HookConfig::from_file(&missing).is_err());
        Ok(())
    }

    #[test]
    fn test_overrides() {
        let config = HookConfig::default().with_overrides_from(|key| match key {
            STR_LEN_ENV => Some("off".to_string()),
            REF_ARGS_ENV => Some("1".to_string()),
            _ => None,
        });
        assert!(!config.hook_str_len);
        assert!(config.hook_ref_args);

        let untouched = HookConfig::default().with_overrides_from(|_| None);
        assert_eq!(untouched, HookConfig::default());
    }

    #[test]
    fn test_switch_values() {
        for on in ["1", "true", "ON", " yes "] {
            assert_eq!(parse_switch(on), Some(true), "{on:?}");
        }
        for off in ["", "  ", "0", "False", "off", "NO"] {
            assert_eq!(parse_switch(off), Some(false), "{off:?}");
        }
        assert_eq!(parse_switch("maybe"), None);
    }

    #[test]
    fn test_unrecognized_switch_is_ignored() {
        let config = HookConfig::default().with_overrides_from(|key| (key == STR_LEN_ENV).then(|| "sometimes".to_string()));
        assert!(config.hook_str_len);
    }

    #[test]
    fn test_trace_override() {
        let trace = |value: &'static str, base: HookConfig| {
            base.with_overrides_from(|key| (key == TRACE_ENV).then(|| value.to_string())).trace
        };
        let configured = HookConfig {
            trace: Some("vmhook::strings=trace".to_string()),
            ..HookConfig::default()
        };

        assert_eq!(trace("1", HookConfig::default()).as_deref(), Some(DEFAULT_TRACE_FILTER));
        assert_eq!(trace("on", configured.clone()).as_deref(), Some("vmhook::strings=trace"));
        assert_eq!(trace("off", configured).as_deref(), None);
        assert_eq!(trace(" vmhook::tasks=debug ", HookConfig::default()).as_deref(), Some("vmhook::tasks=debug"));
    }
}

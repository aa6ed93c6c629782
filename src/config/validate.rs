// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, RevbuildError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RevbuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

/// Run all semantic checks on a raw config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_raw_config(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watch(cfg)?;
    validate_build(cfg)?;
    validate_storage(cfg)?;
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.debounce_ms == 0 {
        return Err(RevbuildError::ConfigError(
            "[watch].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.watch.bootstrap_timeout_ms == 0 {
        return Err(RevbuildError::ConfigError(
            "[watch].bootstrap_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_build(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.command.trim().is_empty() {
        return Err(RevbuildError::ConfigError(
            "[build].command must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_storage(cfg: &RawConfigFile) -> Result<()> {
    if cfg.storage.data_dir.as_os_str().is_empty() {
        return Err(RevbuildError::ConfigError(
            "[storage].data_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.watch.debounce_ms, 1000);
        assert!(cfg.publish.enabled);
        assert!(!cfg.build.fail_on_nonzero_exit);
    }

    #[test]
    fn zero_debounce_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.watch.debounce_ms = 0;
        match ConfigFile::try_from(raw) {
            Err(RevbuildError::ConfigError(msg)) => assert!(msg.contains("debounce_ms")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn blank_command_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.build.command = "   ".to_string();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(RevbuildError::ConfigError(_))
        ));
    }
}

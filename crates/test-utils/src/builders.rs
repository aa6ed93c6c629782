use revbuild::config::{ConfigFile, RawConfigFile};
use revbuild::engine::RuntimeEvent;
use revbuild::types::{BuildOutcome, BuildRequest, Version};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.config.watch.debounce_ms = ms;
        self
    }

    pub fn with_bootstrap_timeout_ms(mut self, ms: u64) -> Self {
        self.config.watch.bootstrap_timeout_ms = ms;
        self
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.config.build.command = command.to_string();
        self
    }

    /// The unvalidated config, for exercising validation failures.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `RuntimeEvent::BuildRequested` for `version`.
pub fn requested(version: Version) -> RuntimeEvent {
    RuntimeEvent::BuildRequested(BuildRequest::new(version))
}

/// `RuntimeEvent::BuildFinished` with the given status.
pub fn finished(version: Version, success: bool) -> RuntimeEvent {
    let outcome = if success {
        BuildOutcome::succeeded(version, std::time::Duration::ZERO)
    } else {
        BuildOutcome::failed(version, "scripted failure")
    };
    RuntimeEvent::BuildFinished(outcome)
}

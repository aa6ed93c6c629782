// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Default build command: copy the snapshot verbatim into the output dir.
pub const DEFAULT_BUILD_COMMAND: &str =
    "cp -R \"$REVBUILD_SNAPSHOT_DIR\"/. \"$REVBUILD_OUTPUT_DIR\"";

/// Raw configuration as read from a TOML file, before validation.
///
/// ```toml
/// [watch]
/// debounce_ms = 1000
/// bootstrap_timeout_ms = 5000
///
/// [build]
/// command = "hugo --source \"$REVBUILD_SNAPSHOT_DIR\" --destination \"$REVBUILD_OUTPUT_DIR\""
/// fail_on_nonzero_exit = false
///
/// [storage]
/// data_dir = "data"
///
/// [publish]
/// enabled = true
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub publish: PublishSection,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// the rest of the crate can rely on non-zero timers and a non-empty command.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub build: BuildSection,
    pub storage: StorageSection,
    pub publish: PublishSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            watch: raw.watch,
            build: raw.build,
            storage: raw.storage,
            publish: raw.publish,
        }
    }
}

/// `[watch]` section: debounce and startup catch-up timing.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Quiet period after the last update notification before a build is
    /// requested.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long to wait for a first notification at startup before checking
    /// the source's version against the last built one.
    #[serde(default = "default_bootstrap_timeout_ms")]
    pub bootstrap_timeout_ms: u64,
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_bootstrap_timeout_ms() -> u64 {
    5000
}

impl WatchSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            bootstrap_timeout_ms: default_bootstrap_timeout_ms(),
        }
    }
}

/// `[build]` section: how the transformer is invoked.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Shell command run once per build.
    ///
    /// It sees `REVBUILD_SNAPSHOT_DIR`, `REVBUILD_OUTPUT_DIR` and
    /// `REVBUILD_VERSION` in its environment.
    #[serde(default = "default_command")]
    pub command: String,

    /// Working directory for the command; defaults to the source's data
    /// directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Treat a nonzero transformer exit as a failed build.
    ///
    /// Off by default: the exit code is logged, and whatever the command left
    /// in the output directory is swapped in.
    #[serde(default)]
    pub fail_on_nonzero_exit: bool,
}

fn default_command() -> String {
    DEFAULT_BUILD_COMMAND.to_string()
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            command: default_command(),
            working_dir: None,
            fail_on_nonzero_exit: false,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// Root for per-source state: `<data_dir>/<source id>/...`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// `[publish]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishSection {
    #[serde(default = "default_publish_enabled")]
    pub enabled: bool,

    /// Where the directory publisher mirrors output to; defaults to
    /// `<data_dir>/<source id>/publish`.
    #[serde(default)]
    pub target_dir: Option<PathBuf>,
}

fn default_publish_enabled() -> bool {
    true
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            enabled: default_publish_enabled(),
            target_dir: None,
        }
    }
}

// src/config/mod.rs

//! Configuration loading and validation for revbuild.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate timer and command sanity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_effective, load_from_path};
pub use model::{
    BuildSection, ConfigFile, PublishSection, RawConfigFile, StorageSection, WatchSection,
    DEFAULT_BUILD_COMMAND,
};
pub use validate::validate_config;

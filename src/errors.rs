// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::Version;

#[derive(Error, Debug)]
pub enum RevbuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Cannot resolve content source '{name}': {reason}")]
    ResolutionError { name: String, reason: String },

    #[error("Cannot join distribution network: {0}")]
    ConnectivityError(String),

    #[error("Snapshot download for version {version} failed: {reason}")]
    DownloadError { version: Version, reason: String },

    #[error("Transformer could not be started: {0}")]
    TransformerInvocationError(String),

    #[error("Transformer exited with code {0}")]
    TransformerExitError(i32),

    #[error("Output swap failed: {0}")]
    SwapError(String),

    #[error("Version ledger error: {0}")]
    LedgerError(String),

    #[error("Publish failed: {0}")]
    PublishError(String),

    #[error("Build cancelled at {0} stage")]
    Cancelled(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RevbuildError>;

//! Error types for TapGuard.
//!
//! Expected outcomes of validation (replay, rate exceeded) are verdicts, not
//! errors. Only shared-store faults and configuration problems live here.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")] Unavailable(String),
    #[error("compare-and-set contention on {key}")] Contention { key: String },
    #[error("corrupt value at {key}: {reason}")] Corrupt { key: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config load: {0}")] Load(String),
    #[error("invalid {field}: {reason}")] Invalid { field: &'static str, reason: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum TapGuardError {
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Config(#[from] ConfigError),
}

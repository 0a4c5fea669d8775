//! Core error types for daykeys-core.
//!
//! Resolution misses and handler failures are not errors: they come back as
//! failed [`CommandResult`](crate::types::CommandResult)s. The types here cover
//! programming errors at registration time and configuration I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for daykeys-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Command registration errors
    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised synchronously by `register`/`register_batch` and the
/// command builder. These signal a bug in the bootstrap data, not a
/// runtime condition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("command is missing an id")]
    MissingId,

    #[error("command '{id}' is missing a key")]
    MissingKey { id: String },

    #[error("command '{id}' has an empty key token at position {position}")]
    EmptyKeyToken { id: String, position: usize },

    #[error("command '{id}' is missing a handler")]
    MissingHandler { id: String },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Config directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

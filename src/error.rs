//! # Testkit Error Types
//!
//! Structured error handling for stack orchestration using thiserror
//! instead of `Box<dyn Error>` patterns.
//!
//! Everything here is fatal to the calling test phase. Transient probe
//! failures (connection refused, protocol errors during boot) never become a
//! `TestkitError`; the readiness prober absorbs them and only surfaces
//! [`TestkitError::NotReady`] once its deadline is exhausted.

use thiserror::Error;

/// Fatal errors raised by resource materialization, process execution, and
/// readiness waits
#[derive(Error, Debug)]
pub enum TestkitError {
    #[error("Stack resource not found: {path}")]
    ResourceNotFound { path: String },

    #[error("Stack directory is invalid: {path}")]
    InvalidStackDir { path: String },

    #[error("Failed to materialize stack resources: {path}: {message}")]
    Materialization { path: String, message: String },

    #[error("Failed to run command: {command}: {message}")]
    CommandLaunch { command: String, message: String },

    #[error("Command failed ({exit_code}): {command}\nOutput:\n{output}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },

    #[error("Command timed out after {timeout_seconds}s: {command}\nPartial output:\n{output}")]
    CommandTimeout {
        command: String,
        timeout_seconds: u64,
        output: String,
    },

    #[error("{dependency} was not ready within {timeout_seconds}s")]
    NotReady {
        dependency: String,
        timeout_seconds: u64,
    },

    #[error("Database error: {operation}: {message}")]
    Database { operation: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, TestkitError>;

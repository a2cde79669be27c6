// ABOUTME: Error types for sandbox staging and execution
// ABOUTME: Distinguishes validation, staging, timeout and container failures for callers

use crate::providers::EngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// Timeout string did not parse to a positive duration
    #[error("{0} is not a valid timeout duration")]
    InvalidTimeout(String),

    /// Requested atom image is not present in the engine
    #[error("{0} does not exist")]
    ImageNotFound(String),

    /// Binary name is absolute or escapes the session directory
    #[error("invalid binary name '{0}': must be a relative path inside the sandbox")]
    InvalidBinaryName(String),

    #[error("failed to create sandbox directory '{}': {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse binary '{name}': {reason}")]
    PayloadDecode { name: String, reason: String },

    #[error("failed to write binary '{}': {source}", path.display())]
    PayloadWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Deadline exceeded, the container is being removed in the background
    #[error("script execution timeout")]
    ScriptTimeout,

    /// Container exited non-zero before the deadline; output is kept for diagnosis
    #[error("{}", describe_exit(*exit_code))]
    CommandExecution {
        output: String,
        exit_code: Option<i32>,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SandboxError {
    /// Output captured before the failure, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            SandboxError::CommandExecution { output, .. } => Some(output),
            _ => None,
        }
    }

    /// True for failures caused by the caller's request rather than the host
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SandboxError::InvalidTimeout(_)
                | SandboxError::ImageNotFound(_)
                | SandboxError::InvalidBinaryName(_)
                | SandboxError::PayloadDecode { .. }
        )
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {}", code),
        None => "process terminated by signal".to_string(),
    }
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;

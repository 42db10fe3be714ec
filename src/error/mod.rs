//! Error handling for the network health logger

use thiserror::Error;

/// Convenient result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppError>;

/// Custom error types for the network health logger
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors (file operations, lock files, store appends)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required external tool is not on PATH
    #[error("missing command `{command}` on PATH")]
    CommandMissing { command: String },

    /// An external command exited non-zero
    #[error("command failed: `{command}` (status: {status}){stderr_suffix}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr_suffix: String,
    },

    /// An external command exceeded its time budget and was killed
    #[error("command timed out after {timeout_ms}ms: `{command}`{stderr_suffix}")]
    CommandTimedOut {
        command: String,
        timeout_ms: u64,
        stderr_suffix: String,
    },

    /// Output from an external tool did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Record store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Every candidate server and attempt was spent without a success
    #[error("all bandwidth trials exhausted after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode(message.into())
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store(message.into())
    }

    /// Build a command-failure error, folding trimmed stderr into the message
    pub fn from_command_failure(command: String, status: i32, stderr: &str) -> Self {
        Self::CommandFailed {
            command,
            status,
            stderr_suffix: stderr_suffix(stderr),
        }
    }

    /// Build a command-timeout error, folding trimmed stderr into the message
    pub fn from_command_timeout(command: String, timeout_ms: u64, stderr: &str) -> Self {
        Self::CommandTimedOut {
            command,
            timeout_ms,
            stderr_suffix: stderr_suffix(stderr),
        }
    }

    /// Get error category for journal reason codes and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Io(_) => "IO",
            Self::Json(_) => "JSON",
            Self::CommandMissing { .. } => "CMD_MISSING",
            Self::CommandFailed { .. } => "CMD_FAILED",
            Self::CommandTimedOut { .. } => "CMD_TIMEOUT",
            Self::Decode(_) => "DECODE",
            Self::Store(_) => "STORE",
            Self::Exhausted { .. } => "EXHAUSTED",
        }
    }

    /// Process exit code reported to the external scheduler
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::CommandMissing { .. } => 3,
            Self::Exhausted { .. } => 4,
            _ => 1,
        }
    }

    /// The exit status of the failing command, when one exists
    pub fn command_status(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { status, .. } => Some(*status),
            Self::CommandTimedOut { .. } => Some(-1),
            _ => None,
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("; stderr: {trimmed}")
    }
}

/// Truncate free-form error text to at most `max` characters on a char
/// boundary. Used before journal and record writes.
pub fn truncate_error_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

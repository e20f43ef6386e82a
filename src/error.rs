//! Error types for the telemetry front end.
//!
//! Only three things can fail with an `Err` in this crate:
//!
//! - **Configuration**: a stage was asked to run with settings that cannot work
//!   (zero-length packet zone, `min > max` packet lengths, missing spacecraft).
//!   These are raised at construction time, before any data flows.
//! - **Output I/O**: a data file, construction record or socket write failed.
//! - **Source I/O**: a frame provider could not read its input.
//!
//! Malformed telemetry (bad first-header pointers, sequence gaps, irrational
//! packet lengths, fill) is *never* an error. It is absorbed into status
//! counters and annotation bits so that one bad frame cannot stop the stream.
//!
//! ```rust
//! use downlink::TelemetryError;
//!
//! let error = TelemetryError::config_error("path", "min packet length exceeds max");
//! assert!(!error.is_retryable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for front-end operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for front-end operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Invalid {section} configuration: {reason}")]
    Config { section: String, reason: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output channel '{channel}' failed")]
    Output {
        channel: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Frame length mismatch: layout expects {expected} bytes, got {found}")]
    FrameLength { expected: usize, found: usize },

    #[error("Receiver '{receiver}' rejected delivery: {reason}")]
    Receiver { receiver: String, reason: String },

    #[error("Pipeline is shut down: {reason}")]
    Shutdown { reason: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Config { .. } => false,
            TelemetryError::File { .. } => false,
            TelemetryError::Output { .. } => true,
            TelemetryError::Parse { .. } => false,
            TelemetryError::FrameLength { .. } => false,
            TelemetryError::Receiver { .. } => true,
            TelemetryError::Shutdown { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Config { .. } => vec![
                "Check the frame layout against the mission ICD",
                "Verify packet length limits and application IDs",
                "Validate the YAML configuration before starting a pass",
            ],
            TelemetryError::File { .. } => vec![
                "Check the file exists and is readable",
                "Check directory permissions",
                "Ensure sufficient disk space",
            ],
            TelemetryError::Output { .. } => vec![
                "Check free space on the output volume",
                "Verify the downstream socket or consumer is alive",
            ],
            TelemetryError::Parse { .. } => vec![
                "Verify the input is a frame stream with the configured frame length",
                "Check the sync marker configuration",
            ],
            TelemetryError::FrameLength { .. } => vec![
                "Match the configured frame length to the synchronizer output",
                "Check whether the sync marker is included in each frame",
            ],
            TelemetryError::Receiver { .. } => vec![
                "Inspect the failing receiver's status counters",
                "Retry delivery after the receiver recovers",
            ],
            TelemetryError::Shutdown { .. } => vec![
                "Open a new session",
                "Check the driver log for the shutdown cause",
            ],
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(section: impl Into<String>, reason: impl Into<String>) -> Self {
        TelemetryError::Config { section: section.into(), reason: reason.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for output channel errors.
    pub fn output_error(channel: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Output { channel: channel.into(), source }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for TelemetryError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TelemetryError::Config { section: "yaml".to_string(), reason: err.to_string() }
    }
}

//! Error types for the tidepool control loop.

use thiserror::Error;

use crate::types::{ResourceAction, Source};

/// Result type alias for control-loop operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Errors raised while loading or validating configuration.
///
/// Any of these is fatal at startup: the controller never runs on a
/// partial configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing required setting: {0}")]
    Missing(String),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("{} configuration error(s): {}", .0.len(), join(.0))]
    Multiple(Vec<ConfigError>),
}

fn join(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors surfaced by one poll cycle. These are alerted, never propagated
/// to the trigger host.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("{origin} status query failed: {message}")]
    Collection { origin: Source, message: String },

    #[error("snapshot unusable: failing sources [{}]", list(.0))]
    UnusableSnapshot(Vec<Source>),

    #[error("{action} failed: {message}")]
    Actuator {
        action: ResourceAction,
        message: String,
    },
}

fn list(sources: &[Source]) -> String {
    sources
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

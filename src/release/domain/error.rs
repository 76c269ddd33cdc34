//! Error types for release domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing or transitioning release values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReleaseDomainError {
    /// Version numbers start at one.
    #[error("version number must be positive, got {0}")]
    InvalidVersionNumber(i64),

    /// Transitioning between two version states is invalid.
    #[error("invalid version status transition: {from} -> {to}")]
    InvalidVersionTransition {
        /// Current status.
        from: String,
        /// Requested target status.
        to: String,
    },

    /// Transitioning between two deployment states is invalid.
    #[error("invalid deployment status transition: {from} -> {to}")]
    InvalidDeploymentTransition {
        /// Current status.
        from: String,
        /// Requested target status.
        to: String,
    },

    /// The image tag prefix cannot appear in an image reference.
    #[error("image prefix '{0}' is invalid (use lowercase letters, digits, '-', '_' or '.')")]
    InvalidImagePrefix(String),
}

/// Error returned while parsing a version status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown version status: {0}")]
pub struct ParseVersionStatusError(pub String);

/// Error returned while parsing a deployment status from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown deployment status: {0}")]
pub struct ParseDeploymentStatusError(pub String);

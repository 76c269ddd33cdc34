//! Error types for managed agent validation and parsing.

use thiserror::Error;

/// Errors returned while constructing managed agent domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentDomainError {
    /// The agent identifier is empty after trimming.
    #[error("agent id must not be empty")]
    EmptyAgentId,

    /// The agent identifier contains characters that cannot appear in a
    /// container name.
    #[error(
        "agent id '{0}' is invalid (use letters, digits, '-' or '_', starting with a letter or digit)"
    )]
    InvalidAgentId(String),

    /// The agent identifier exceeds the 64-character limit.
    #[error("agent id exceeds 64 character limit: {0}")]
    AgentIdTooLong(String),

    /// The agent name is empty after trimming.
    #[error("agent name must not be empty")]
    EmptyAgentName,

    /// The agent name exceeds the 255-character storage limit.
    #[error("agent name exceeds 255 character limit: {0}")]
    AgentNameTooLong(String),

    /// The agent name produces an empty image tag segment.
    #[error("agent name '{0}' contains no characters usable in an image tag")]
    UntaggableAgentName(String),

    /// The engine configuration is not a JSON object.
    #[error("engine configuration must be a JSON object, got {0}")]
    InvalidEngineConfig(String),

    /// The retrieval configuration is incomplete or malformed.
    #[error("invalid retrieval configuration: {0}")]
    InvalidRetrievalConfig(String),
}

/// Error returned while parsing a deployment target from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown deployment target: {0}")]
pub struct ParseDeploymentTargetError(pub String);

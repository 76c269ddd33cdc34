//! Identifier type for managed agents.

use super::AgentDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum length for an agent identifier, matching the `VARCHAR(64)` column.
const MAX_ID_LENGTH: usize = 64;

/// Stable identifier of a managed agent.
///
/// Identifiers may be supplied by the caller or generated. They become part
/// of container and router names, so only `[A-Za-z0-9_-]` is accepted and the
/// first character must be alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates a validated agent identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::EmptyAgentId`] when the value is empty
    /// after trimming, [`AgentDomainError::AgentIdTooLong`] when it exceeds 64
    /// characters, or [`AgentDomainError::InvalidAgentId`] when it contains
    /// characters outside `[A-Za-z0-9_-]` or starts with a separator.
    pub fn new(value: impl Into<String>) -> Result<Self, AgentDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(AgentDomainError::EmptyAgentId);
        }

        if trimmed.len() > MAX_ID_LENGTH {
            return Err(AgentDomainError::AgentIdTooLong(raw));
        }

        let starts_alphanumeric = trimmed
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric());
        let is_valid = starts_alphanumeric
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if !is_valid {
            return Err(AgentDomainError::InvalidAgentId(raw));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Generates a random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

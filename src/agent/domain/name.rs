//! Validated agent display name.

use super::AgentDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for an agent name, matching the `VARCHAR(255)` column.
const MAX_NAME_LENGTH: usize = 255;

/// Unique human-readable agent name.
///
/// Names are free text, but image tags are derived from them, so a name must
/// contain at least one ASCII letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentName(String);

impl AgentName {
    /// Creates a validated agent name.
    ///
    /// The input is trimmed; case and inner spacing are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::EmptyAgentName`] when the value is empty
    /// after trimming, [`AgentDomainError::AgentNameTooLong`] when it exceeds
    /// 255 characters, or [`AgentDomainError::UntaggableAgentName`] when no
    /// character survives image-tag slugging.
    pub fn new(value: impl Into<String>) -> Result<Self, AgentDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(AgentDomainError::EmptyAgentName);
        }

        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(AgentDomainError::AgentNameTooLong(raw));
        }

        if !trimmed.chars().any(|c| c.is_ascii_alphanumeric()) {
            return Err(AgentDomainError::UntaggableAgentName(raw));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the lowercase, dash-separated form used in image tags.
    ///
    /// Runs of characters outside `[a-z0-9]` collapse into a single `-`, and
    /// leading or trailing dashes are dropped.
    #[must_use]
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.0.len());
        let mut pending_dash = false;
        for c in self.0.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
        slug
    }
}

impl AsRef<str> for AgentName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//! Names and references derived during a release.

use super::{ReleaseDomainError, VersionNumber};
use crate::agent::domain::{AgentId, AgentName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Image tag prefix used when none is configured.
pub const DEFAULT_IMAGE_PREFIX: &str = "atelier-agent";

/// Container image reference, `<prefix>-<slug(name)>:<id>-v<version>`.
///
/// The repository groups images by display name; the tag carries the exact
/// agent id, so agents whose names slug to the same text never share an
/// image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageTag(String);

impl ImageTag {
    /// Derives the deterministic tag for an agent version.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidImagePrefix`] when the prefix is
    /// empty or contains characters outside `[a-z0-9._-]`.
    pub fn for_version(
        prefix: &str,
        agent_id: &AgentId,
        name: &AgentName,
        version: VersionNumber,
    ) -> Result<Self, ReleaseDomainError> {
        Self::validate_prefix(prefix)?;
        Ok(Self(format!("{prefix}-{}:{agent_id}-v{version}", name.slug())))
    }

    /// Checks that `prefix` can start an image repository name.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseDomainError::InvalidImagePrefix`] when the prefix is
    /// empty or contains characters outside `[a-z0-9._-]`.
    pub fn validate_prefix(prefix: &str) -> Result<(), ReleaseDomainError> {
        let valid = !prefix.is_empty()
            && prefix.chars().all(|c| {
                c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')
            });
        if valid {
            return Ok(());
        }
        Err(ReleaseDomainError::InvalidImagePrefix(prefix.to_owned()))
    }

    /// Wraps a persisted tag.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable container and router name for an agent, `agent-<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(String);

impl ServiceName {
    /// Derives the service name for an agent.
    #[must_use]
    pub fn for_agent(agent_id: &AgentId) -> Self {
        Self(format!("agent-{agent_id}"))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Locator returned by a registry after publishing, e.g. `local://<tag>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactUri(String);

impl ArtifactUri {
    /// Wraps an artifact locator.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the locator as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Target-specific handle of a running instance, used for teardown.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeployRef(String);

impl DeployRef {
    /// Wraps a deployment reference.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeployRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

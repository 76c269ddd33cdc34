//! Configuration blobs carried by a managed agent.

use super::{AgentDomainError, ParseDeploymentTargetError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Reference cloned when a repository source names none.
pub const DEFAULT_REPOSITORY_REF: &str = "main";

/// Opaque engine configuration handed to the agent runtime untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineConfig(Value);

impl EngineConfig {
    /// Wraps a JSON object as engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::InvalidEngineConfig`] when the value is not
    /// a JSON object.
    pub fn new(value: Value) -> Result<Self, AgentDomainError> {
        if value.is_object() {
            return Ok(Self(value));
        }
        Err(AgentDomainError::InvalidEngineConfig(json_kind(&value).to_owned()))
    }

    /// Returns an empty configuration object.
    #[must_use]
    pub fn empty() -> Self {
        Self(Value::Object(serde_json::Map::new()))
    }

    /// Returns the wrapped JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::empty()
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Access token for private source repositories.
///
/// The token is persisted with the agent but never rendered by `Debug` or
/// `Display`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretToken(String);

impl SecretToken {
    /// Wraps a token value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the raw token for building an auth header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(***)")
    }
}

impl fmt::Display for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Where an agent's source code comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetrievalConfig {
    /// A base64-encoded zip or gzip-compressed tar archive.
    #[serde(alias = "local_zip")]
    Archive {
        /// Encoded archive bytes. Absent payloads fail at retrieval time.
        #[serde(default, alias = "zip_b64")]
        archive_b64: Option<String>,
    },
    /// A remote git repository.
    #[serde(alias = "github")]
    Repository {
        /// `owner/name` on GitHub, or a full clone URL.
        repo: String,
        /// Branch or tag to clone.
        #[serde(rename = "ref", default = "default_reference")]
        reference: String,
        /// Subdirectory holding the agent, relative to the repository root.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        /// Token used for HTTPS authentication.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<SecretToken>,
    },
}

fn default_reference() -> String {
    DEFAULT_REPOSITORY_REF.to_owned()
}

impl RetrievalConfig {
    /// Builds an archive source from an encoded payload.
    #[must_use]
    pub fn archive(archive_b64: impl Into<String>) -> Self {
        Self::Archive {
            archive_b64: Some(archive_b64.into()),
        }
    }

    /// Builds a repository source at the default reference.
    #[must_use]
    pub fn repository(repo: impl Into<String>) -> Self {
        Self::Repository {
            repo: repo.into(),
            reference: default_reference(),
            path: None,
            token: None,
        }
    }

    /// Returns the canonical discriminator.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Archive { .. } => "archive",
            Self::Repository { .. } => "repository",
        }
    }

    /// Checks the fields that can be validated without touching the source.
    ///
    /// An absent archive payload is accepted here and rejected when the
    /// pipeline runs, so agents can be registered before their code exists.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDomainError::InvalidRetrievalConfig`] when a repository
    /// source has an empty `repo` or `ref`.
    pub fn validate(&self) -> Result<(), AgentDomainError> {
        match self {
            Self::Archive { .. } => Ok(()),
            Self::Repository {
                repo, reference, ..
            } => {
                if repo.trim().is_empty() {
                    return Err(AgentDomainError::InvalidRetrievalConfig(
                        "repository source requires 'repo'".to_owned(),
                    ));
                }
                if reference.trim().is_empty() {
                    return Err(AgentDomainError::InvalidRetrievalConfig(
                        "repository 'ref' must not be empty".to_owned(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Kind of runtime an agent is deployed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentTarget {
    /// Local container runtime.
    Local,
    /// Google Cloud Run.
    Gcp,
    /// Kubernetes.
    K8s,
}

impl DeploymentTarget {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Gcp => "gcp",
            Self::K8s => "k8s",
        }
    }
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DeploymentTarget {
    type Error = ParseDeploymentTargetError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "local" => Ok(Self::Local),
            "gcp" => Ok(Self::Gcp),
            "k8s" => Ok(Self::K8s),
            _ => Err(ParseDeploymentTargetError(value.to_owned())),
        }
    }
}

/// Where an agent's image runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploymentConfig {
    /// Local container runtime behind the path-prefix router.
    Local {
        /// Container network; the process default applies when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        docker_network: Option<String>,
    },
    /// Google Cloud Run.
    Gcp {
        /// Project hosting the service.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gcp_project_id: Option<String>,
        /// Region hosting the service.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gcp_region: Option<String>,
        /// Explicit service name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service_name: Option<String>,
    },
    /// Kubernetes.
    K8s {
        /// Namespace hosting the workload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
}

impl DeploymentConfig {
    /// Local deployment on the default network.
    #[must_use]
    pub const fn local() -> Self {
        Self::Local {
            docker_network: None,
        }
    }

    /// Returns the deployment target kind.
    #[must_use]
    pub const fn target(&self) -> DeploymentTarget {
        match self {
            Self::Local { .. } => DeploymentTarget::Local,
            Self::Gcp { .. } => DeploymentTarget::Gcp,
            Self::K8s { .. } => DeploymentTarget::K8s,
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self::local()
    }
}

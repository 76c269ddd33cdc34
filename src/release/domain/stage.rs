//! Pipeline stage tags attached to release failures.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Step of the deploy or rollback pipeline where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Waiting for the per-agent lock or a pipeline slot.
    Admission,
    /// Loading the agent and checking capability support.
    Preflight,
    /// Reserving the next version number.
    Allocate,
    /// Creating the scratch working directory.
    Workspace,
    /// Fetching agent source.
    Retrieve,
    /// Writing runtime configuration and the build descriptor.
    Configure,
    /// Building the container image.
    Build,
    /// Publishing the image to a registry.
    Publish,
    /// Starting the service.
    Deploy,
    /// Persisting version and deployment records.
    Record,
}

impl PipelineStage {
    /// Returns the canonical label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admission => "admission",
            Self::Preflight => "preflight",
            Self::Allocate => "allocate",
            Self::Workspace => "workspace",
            Self::Retrieve => "retrieve",
            Self::Configure => "configure",
            Self::Build => "build",
            Self::Publish => "publish",
            Self::Deploy => "deploy",
            Self::Record => "record",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

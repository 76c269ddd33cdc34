//! Domain model for agent versions and deployments.
//!
//! Versions move through `created → built → deployed`, with `failed` and
//! `rolled_back` as side exits; deployments are `running` until superseded.
//! Naming helpers derive the image tag and service name from agent identity
//! so repeated deploys replace the same container.

mod deployment;
mod error;
mod naming;
mod stage;
mod version;

pub use deployment::{
    DeployOutcome, Deployment, DeploymentId, DeploymentStatus, PersistedDeploymentData,
};
pub use error::{ParseDeploymentStatusError, ParseVersionStatusError, ReleaseDomainError};
pub use naming::{ArtifactUri, DeployRef, ImageTag, ServiceName, DEFAULT_IMAGE_PREFIX};
pub use stage::PipelineStage;
pub use version::{AgentVersion, PersistedVersionData, VersionId, VersionNumber, VersionStatus};

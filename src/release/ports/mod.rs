//! Port contracts for the release pipeline.
//!
//! Each pluggable concern gets one capability trait. Variants that have no
//! implementation yet report a typed `Unsupported` error instead of failing
//! at runtime with an opaque message.

mod builder;
mod command;
mod deploy;
mod publish;
mod repository;
mod retrieval;

pub use builder::{ImageBuildError, ImageBuildResult, ImageBuilder};
pub use command::{CommandError, CommandOutput, CommandResult, CommandRunner};
pub use deploy::{DeployCapability, DeployError, DeployResult};
pub use publish::{PublishCapability, PublishError, PublishResult, RegistryKind};
pub use repository::{
    DeploymentCommit, ReleaseRepository, ReleaseRepositoryError, ReleaseRepositoryResult,
};
pub use retrieval::{RetrievalCapability, RetrievalError, RetrievalResult};

//! Domain model for managed agents.
//!
//! Identifiers and names are validated on construction because they end up
//! inside container names, image tags, and routing rules. Configuration
//! blobs are typed unions keyed by a `type` discriminator.

mod agent;
mod config;
mod error;
mod ids;
mod name;

pub use agent::{AgentDefinition, AgentPatch, ManagedAgent, PersistedAgentData};
pub use config::{
    DeploymentConfig, DeploymentTarget, EngineConfig, RetrievalConfig, SecretToken,
    DEFAULT_REPOSITORY_REF,
};
pub use error::{AgentDomainError, ParseDeploymentTargetError};
pub use ids::AgentId;
pub use name::AgentName;

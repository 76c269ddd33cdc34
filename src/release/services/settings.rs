//! Pipeline tuning knobs and the capability bundle.

use crate::release::adapters::ConfigInjector;
use crate::release::domain::DEFAULT_IMAGE_PREFIX;
use crate::release::ports::{DeployCapability, ImageBuilder, PublishCapability, RetrievalCapability};
use camino::Utf8PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Limits and naming used by every pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Prefix of every image tag.
    pub image_prefix: String,
    /// Parent of scratch workspaces; the system temp dir when absent.
    pub workspace_root: Option<Utf8PathBuf>,
    /// Limit for fetching source.
    pub retrieve_timeout: Duration,
    /// Limit for building an image.
    pub build_timeout: Duration,
    /// Limit for publishing an image.
    pub publish_timeout: Duration,
    /// Limit for starting or stopping a service.
    pub deploy_timeout: Duration,
    /// How long a pipeline waits for another run on the same agent.
    pub lock_timeout: Duration,
    /// Pipelines allowed to run at once across all agents.
    pub max_concurrent_pipelines: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            image_prefix: DEFAULT_IMAGE_PREFIX.to_owned(),
            workspace_root: None,
            retrieve_timeout: Duration::from_secs(300),
            build_timeout: Duration::from_secs(1800),
            publish_timeout: Duration::from_secs(600),
            deploy_timeout: Duration::from_secs(300),
            lock_timeout: Duration::from_secs(60),
            max_concurrent_pipelines: 4,
        }
    }
}

/// Capabilities a pipeline drives, one per stage.
#[derive(Clone)]
pub struct ReleaseToolchain {
    /// Fetches source.
    pub retriever: Arc<dyn RetrievalCapability>,
    /// Writes runtime configuration and the build descriptor.
    pub injector: ConfigInjector,
    /// Builds and discards images.
    pub builder: Arc<dyn ImageBuilder>,
    /// Publishes images.
    pub publisher: Arc<dyn PublishCapability>,
    /// Starts and stops services.
    pub deployer: Arc<dyn DeployCapability>,
}

//! Process configuration loaded from `ATELIER_*` environment variables.

use crate::release::adapters::{
    ConfigInjector, ContainerDeployer, DEFAULT_BASE_IMAGE, DEFAULT_DOCKER_PROGRAM,
    DEFAULT_GIT_PROGRAM, DEFAULT_NETWORK, DEFAULT_PUBLIC_BASE_URL, DEFAULT_RUNTIME_PACKAGE,
    DockerImageBuilder, RegistryPublisher, SourceRetriever,
};
use crate::release::domain::DEFAULT_IMAGE_PREFIX;
use crate::release::ports::{CommandRunner, RegistryKind};
use crate::release::services::{PipelineSettings, ReleaseToolchain};
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "ATELIER_";

/// Settings for the release pipeline and its adapters.
///
/// Each field maps to `ATELIER_<FIELD>`, for example `ATELIER_DATABASE_URL`
/// or `ATELIER_BUILD_TIMEOUT_SECS`. Only the database URL lacks a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AtelierConfig {
    /// `PostgreSQL` connection string.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    /// Container network used when an agent names none.
    #[serde(default = "default_network")]
    pub docker_network: String,
    /// Base URL of the path-prefix router fronting local deployments.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Prefix of every image tag.
    #[serde(default = "default_image_prefix")]
    pub image_prefix: String,
    /// Registry images are published to.
    #[serde(default)]
    pub registry: RegistryKind,
    /// Parent directory of scratch workspaces.
    #[serde(default)]
    pub workspace_root: Option<Utf8PathBuf>,
    /// Base image of generated build descriptors.
    #[serde(default = "default_base_image")]
    pub base_image: String,
    /// Runtime package installed by generated build descriptors.
    #[serde(default = "default_runtime_package")]
    pub runtime_package: String,
    /// Container CLI.
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    /// Git CLI.
    #[serde(default = "default_git_bin")]
    pub git_bin: String,
    /// Source retrieval limit in seconds.
    #[serde(default = "default_retrieve_timeout")]
    pub retrieve_timeout_secs: u64,
    /// Image build limit in seconds.
    #[serde(default = "default_build_timeout")]
    pub build_timeout_secs: u64,
    /// Publish limit in seconds.
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
    /// Deploy and teardown limit in seconds.
    #[serde(default = "default_deploy_timeout")]
    pub deploy_timeout_secs: u64,
    /// Wait for another pipeline on the same agent, in seconds.
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
    /// Pipelines allowed to run at once.
    #[serde(default = "default_max_concurrent_pipelines")]
    pub max_concurrent_pipelines: usize,
}

const fn default_pool_size() -> u32 {
    8
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_owned()
}

fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_owned()
}

fn default_image_prefix() -> String {
    DEFAULT_IMAGE_PREFIX.to_owned()
}

fn default_base_image() -> String {
    DEFAULT_BASE_IMAGE.to_owned()
}

fn default_runtime_package() -> String {
    DEFAULT_RUNTIME_PACKAGE.to_owned()
}

fn default_docker_bin() -> String {
    DEFAULT_DOCKER_PROGRAM.to_owned()
}

fn default_git_bin() -> String {
    DEFAULT_GIT_PROGRAM.to_owned()
}

const fn default_retrieve_timeout() -> u64 {
    300
}

const fn default_build_timeout() -> u64 {
    1800
}

const fn default_publish_timeout() -> u64 {
    600
}

const fn default_deploy_timeout() -> u64 {
    300
}

const fn default_lock_timeout() -> u64 {
    60
}

const fn default_max_concurrent_pipelines() -> usize {
    4
}

impl AtelierConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`envy::Error`] when a variable is present but malformed.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed(ENV_PREFIX).from_env()
    }

    /// Reads the configuration from explicit key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns [`envy::Error`] when a value is malformed.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::prefixed(ENV_PREFIX).from_iter(pairs)
    }

    /// Returns pipeline limits and naming derived from this configuration.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            image_prefix: self.image_prefix.clone(),
            workspace_root: self.workspace_root.clone(),
            retrieve_timeout: Duration::from_secs(self.retrieve_timeout_secs),
            build_timeout: Duration::from_secs(self.build_timeout_secs),
            publish_timeout: Duration::from_secs(self.publish_timeout_secs),
            deploy_timeout: Duration::from_secs(self.deploy_timeout_secs),
            lock_timeout: Duration::from_secs(self.lock_timeout_secs),
            max_concurrent_pipelines: self.max_concurrent_pipelines,
        }
    }

    /// Wires the production adapters around one command runner.
    #[must_use]
    pub fn toolchain<R: CommandRunner + 'static>(&self, runner: Arc<R>) -> ReleaseToolchain {
        let retriever =
            SourceRetriever::new(Arc::clone(&runner)).with_git_program(self.git_bin.as_str());
        let builder =
            DockerImageBuilder::new(Arc::clone(&runner)).with_program(self.docker_bin.as_str());
        let deployer = ContainerDeployer::new(runner)
            .with_program(self.docker_bin.as_str())
            .with_default_network(self.docker_network.as_str())
            .with_public_base_url(self.public_base_url.as_str());
        ReleaseToolchain {
            retriever: Arc::new(retriever),
            injector: ConfigInjector::new(self.base_image.as_str(), self.runtime_package.as_str()),
            builder: Arc::new(builder),
            publisher: Arc::new(RegistryPublisher::new(self.registry)),
            deployer: Arc::new(deployer),
        }
    }

    /// Returns the longest stage limit; spawned commands never outlive it.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        let longest = [
            self.retrieve_timeout_secs,
            self.build_timeout_secs,
            self.publish_timeout_secs,
            self.deploy_timeout_secs,
        ]
        .into_iter()
        .max()
        .unwrap_or_else(default_build_timeout);
        Duration::from_secs(longest)
    }
}

impl Default for AtelierConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_size: default_pool_size(),
            docker_network: default_network(),
            public_base_url: default_public_base_url(),
            image_prefix: default_image_prefix(),
            registry: RegistryKind::default(),
            workspace_root: None,
            base_image: default_base_image(),
            runtime_package: default_runtime_package(),
            docker_bin: default_docker_bin(),
            git_bin: default_git_bin(),
            retrieve_timeout_secs: default_retrieve_timeout(),
            build_timeout_secs: default_build_timeout(),
            publish_timeout_secs: default_publish_timeout(),
            deploy_timeout_secs: default_deploy_timeout(),
            lock_timeout_secs: default_lock_timeout(),
            max_concurrent_pipelines: default_max_concurrent_pipelines(),
        }
    }
}

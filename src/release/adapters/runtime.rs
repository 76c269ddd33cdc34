//! In-memory image builder and container host.
//!
//! These adapters model the build and deploy stages without a container
//! engine. They back pipeline tests and local dry runs.

use crate::agent::domain::{DeploymentConfig, DeploymentTarget};
use crate::release::domain::{DeployOutcome, DeployRef, ImageTag, ServiceName};
use crate::release::ports::{
    DeployCapability, DeployError, DeployResult, ImageBuildError, ImageBuildResult, ImageBuilder,
};
use async_trait::async_trait;
use camino::Utf8Path;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// Image builder that records builds instead of running them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryImageBuilder {
    state: Arc<RwLock<BuilderState>>,
}

#[derive(Debug, Default)]
struct BuilderState {
    images: HashSet<ImageTag>,
    built: Vec<ImageTag>,
    discarded: Vec<ImageTag>,
    failure: Option<String>,
}

fn build_lock_error(err: impl ToString) -> ImageBuildError {
    ImageBuildError::Failed(err.to_string())
}

impl InMemoryImageBuilder {
    /// Creates a builder with no images.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent build fail with `message`, or succeed again
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageBuildError::Failed`] when the state lock is poisoned.
    pub fn set_failure(&self, message: Option<&str>) -> ImageBuildResult<()> {
        let mut state = self.state.write().map_err(build_lock_error)?;
        state.failure = message.map(str::to_owned);
        Ok(())
    }

    /// Returns every tag built so far, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ImageBuildError::Failed`] when the state lock is poisoned.
    pub fn built(&self) -> ImageBuildResult<Vec<ImageTag>> {
        let state = self.state.read().map_err(build_lock_error)?;
        Ok(state.built.clone())
    }

    /// Returns every tag discarded so far, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ImageBuildError::Failed`] when the state lock is poisoned.
    pub fn discarded(&self) -> ImageBuildResult<Vec<ImageTag>> {
        let state = self.state.read().map_err(build_lock_error)?;
        Ok(state.discarded.clone())
    }

    /// Returns whether `image` is currently present.
    ///
    /// # Errors
    ///
    /// Returns [`ImageBuildError::Failed`] when the state lock is poisoned.
    pub fn contains(&self, image: &ImageTag) -> ImageBuildResult<bool> {
        let state = self.state.read().map_err(build_lock_error)?;
        Ok(state.images.contains(image))
    }
}

#[async_trait]
impl ImageBuilder for InMemoryImageBuilder {
    async fn build(&self, _context_dir: &Utf8Path, tag: &ImageTag) -> ImageBuildResult<ImageTag> {
        let mut state = self.state.write().map_err(build_lock_error)?;
        if let Some(message) = &state.failure {
            return Err(ImageBuildError::Failed(message.clone()));
        }
        state.images.insert(tag.clone());
        state.built.push(tag.clone());
        Ok(tag.clone())
    }

    async fn discard(&self, image: &ImageTag) -> ImageBuildResult<()> {
        let mut state = self.state.write().map_err(build_lock_error)?;
        state.images.remove(image);
        state.discarded.push(image.clone());
        Ok(())
    }
}

/// Container host that tracks running services in memory.
///
/// Only the local target is modelled. Like the container deployer, a deploy
/// removes the service's current instance before starting the new one, even
/// when the start then fails. Deploying an image that was never built is
/// allowed; the host does not cross-check a builder.
#[derive(Debug, Clone)]
pub struct InMemoryContainerHost {
    base_url: String,
    state: Arc<RwLock<HostState>>,
}

#[derive(Debug, Default)]
struct HostState {
    running: HashMap<ServiceName, (DeployRef, ImageTag)>,
    starts: Vec<(ServiceName, ImageTag)>,
    removed: Vec<DeployRef>,
    next_ref: u64,
    failure: Option<String>,
}

fn host_lock_error(err: impl ToString) -> DeployError {
    DeployError::Failed(err.to_string())
}

impl InMemoryContainerHost {
    /// Creates an empty host whose endpoints live under `http://localhost`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: super::deploy::DEFAULT_PUBLIC_BASE_URL.to_owned(),
            state: Arc::default(),
        }
    }

    /// Makes every subsequent deploy fail with `message`, or succeed again
    /// when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Failed`] when the state lock is poisoned.
    pub fn set_failure(&self, message: Option<&str>) -> DeployResult<()> {
        let mut state = self.state.write().map_err(host_lock_error)?;
        state.failure = message.map(str::to_owned);
        Ok(())
    }

    /// Returns the image currently running as `service`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Failed`] when the state lock is poisoned.
    pub fn running_image(&self, service: &ServiceName) -> DeployResult<Option<ImageTag>> {
        let state = self.state.read().map_err(host_lock_error)?;
        Ok(state.running.get(service).map(|(_, image)| image.clone()))
    }

    /// Returns every `(service, image)` start in order.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Failed`] when the state lock is poisoned.
    pub fn starts(&self) -> DeployResult<Vec<(ServiceName, ImageTag)>> {
        let state = self.state.read().map_err(host_lock_error)?;
        Ok(state.starts.clone())
    }

    /// Returns every removed deployment reference in order.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Failed`] when the state lock is poisoned.
    pub fn removed(&self) -> DeployResult<Vec<DeployRef>> {
        let state = self.state.read().map_err(host_lock_error)?;
        Ok(state.removed.clone())
    }
}

impl Default for InMemoryContainerHost {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_local(config: &DeploymentConfig) -> DeployResult<()> {
    match config.target() {
        DeploymentTarget::Local => Ok(()),
        other => Err(DeployError::Unsupported(other)),
    }
}

#[async_trait]
impl DeployCapability for InMemoryContainerHost {
    fn ensure_supported(&self, config: &DeploymentConfig) -> DeployResult<()> {
        ensure_local(config)
    }

    async fn deploy(
        &self,
        image: &ImageTag,
        service: &ServiceName,
        config: &DeploymentConfig,
    ) -> DeployResult<DeployOutcome> {
        ensure_local(config)?;
        let mut state = self.state.write().map_err(host_lock_error)?;
        if let Some((previous, _)) = state.running.remove(service) {
            state.removed.push(previous);
        }
        if let Some(message) = &state.failure {
            return Err(DeployError::Failed(message.clone()));
        }
        state.next_ref += 1;
        let deploy_ref = DeployRef::new(format!("mem-{}", state.next_ref));
        state
            .running
            .insert(service.clone(), (deploy_ref.clone(), image.clone()));
        state.starts.push((service.clone(), image.clone()));
        Ok(DeployOutcome {
            endpoint_url: format!("{}/api/v1/agents/{service}", self.base_url),
            deploy_ref,
            router_id: Some(service.as_str().to_owned()),
        })
    }

    async fn delete(&self, deploy_ref: &DeployRef, config: &DeploymentConfig) -> DeployResult<()> {
        ensure_local(config)?;
        let mut state = self.state.write().map_err(host_lock_error)?;
        state.running.retain(|_, (running, _)| running != deploy_ref);
        state.removed.push(deploy_ref.clone());
        Ok(())
    }
}

//! Docker image builder.

use crate::release::domain::ImageTag;
use crate::release::ports::{
    CommandError, CommandRunner, ImageBuildError, ImageBuildResult, ImageBuilder,
};
use async_trait::async_trait;
use camino::Utf8Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Container engine executable used when none is configured.
pub const DEFAULT_DOCKER_PROGRAM: &str = "docker";

/// Builds images with `docker build`.
pub struct DockerImageBuilder<R: CommandRunner> {
    runner: Arc<R>,
    program: String,
}

impl<R: CommandRunner> DockerImageBuilder<R> {
    /// Creates a builder that uses `docker` from `PATH`.
    #[must_use]
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            runner,
            program: DEFAULT_DOCKER_PROGRAM.to_owned(),
        }
    }

    /// Overrides the engine executable, e.g. `podman`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

fn command_error(err: CommandError) -> ImageBuildError {
    match err {
        CommandError::NotFound { .. } => ImageBuildError::Unavailable(err.to_string()),
        other => ImageBuildError::Failed(other.to_string()),
    }
}

#[async_trait]
impl<R: CommandRunner> ImageBuilder for DockerImageBuilder<R> {
    async fn build(&self, context_dir: &Utf8Path, tag: &ImageTag) -> ImageBuildResult<ImageTag> {
        info!(%tag, %context_dir, "building image");
        let args = vec![
            "build".to_owned(),
            "--rm".to_owned(),
            "-t".to_owned(),
            tag.as_str().to_owned(),
            context_dir.as_str().to_owned(),
        ];
        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(command_error)?;
        if !output.success() {
            return Err(ImageBuildError::Failed(output.diagnostic()));
        }
        Ok(tag.clone())
    }

    async fn discard(&self, image: &ImageTag) -> ImageBuildResult<()> {
        debug!(%image, "discarding image");
        let args = vec![
            "image".to_owned(),
            "rm".to_owned(),
            "-f".to_owned(),
            image.as_str().to_owned(),
        ];
        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(command_error)?;
        if !output.success() {
            return Err(ImageBuildError::Failed(output.diagnostic()));
        }
        Ok(())
    }
}

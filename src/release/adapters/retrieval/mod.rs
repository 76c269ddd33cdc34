//! Source retrieval adapter.
//!
//! Archive payloads are decoded and unpacked in-process; repository sources
//! are shallow-cloned through the command runner.

mod archive;
mod repository;

use crate::agent::domain::RetrievalConfig;
use crate::release::ports::{
    CommandRunner, RetrievalCapability, RetrievalError, RetrievalResult,
};
use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use tracing::info;

pub use repository::DEFAULT_GIT_PROGRAM;

/// Retrieves agent source for every [`RetrievalConfig`] variant.
pub struct SourceRetriever<R: CommandRunner> {
    runner: Arc<R>,
    git_program: String,
}

impl<R: CommandRunner> SourceRetriever<R> {
    /// Creates a retriever that clones with `git` from `PATH`.
    #[must_use]
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            runner,
            git_program: DEFAULT_GIT_PROGRAM.to_owned(),
        }
    }

    /// Overrides the git executable.
    #[must_use]
    pub fn with_git_program(mut self, program: impl Into<String>) -> Self {
        self.git_program = program.into();
        self
    }
}

#[async_trait]
impl<R: CommandRunner> RetrievalCapability for SourceRetriever<R> {
    async fn retrieve(
        &self,
        source: &RetrievalConfig,
        destination: &Utf8Path,
    ) -> RetrievalResult<Utf8PathBuf> {
        info!(kind = source.kind(), %destination, "retrieving agent source");
        match source {
            RetrievalConfig::Archive { archive_b64 } => {
                let payload = archive_b64
                    .as_deref()
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| {
                        RetrievalError::InvalidInput("archive source has no payload".to_owned())
                    })?
                    .to_owned();
                let target = destination.to_path_buf();
                tokio::task::spawn_blocking(move || archive::unpack(&payload, &target))
                    .await
                    .map_err(|err| RetrievalError::Failed(format!("unpack task failed: {err}")))?
            }
            RetrievalConfig::Repository {
                repo,
                reference,
                path,
                token,
            } => {
                let request = repository::CloneRequest {
                    repo,
                    reference,
                    path: path.as_deref(),
                    token: token.as_ref(),
                };
                repository::clone(self.runner.as_ref(), &self.git_program, &request, destination)
                    .await
            }
        }
    }
}

//! Shallow git clones.

use crate::agent::domain::SecretToken;
use crate::release::ports::{CommandError, CommandRunner, RetrievalError, RetrievalResult};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use tracing::debug;

/// Git executable used when none is configured.
pub const DEFAULT_GIT_PROGRAM: &str = "git";

pub(super) struct CloneRequest<'a> {
    pub(super) repo: &'a str,
    pub(super) reference: &'a str,
    pub(super) path: Option<&'a str>,
    pub(super) token: Option<&'a SecretToken>,
}

/// Clones `request.repo` at `request.reference` into `destination`.
///
/// Branch and tag names use a shallow `clone --branch`. Full commit hashes
/// are fetched into a fresh repository and checked out detached, since
/// `--branch` cannot name a commit. A token travels only as a per-command
/// `http.extraHeader`; the remote recorded in `.git/config` never holds it.
///
/// Returns `destination`, or the requested subdirectory of it.
pub(super) async fn clone<R: CommandRunner + ?Sized>(
    runner: &R,
    program: &str,
    request: &CloneRequest<'_>,
    destination: &Utf8Path,
) -> RetrievalResult<Utf8PathBuf> {
    let subdir = request.path.map(validate_subdir).transpose()?;
    let reference = validate_argument("ref", request.reference)?;
    let url = clone_url(request.repo, request.token)?;
    let git = Git {
        runner,
        program,
        request,
    };

    debug!(repo = request.repo, reference, "cloning repository");
    if is_commit_hash(reference) {
        let dest = destination.as_str();
        git.run(false, &["init", "--quiet", dest]).await?;
        git.run(false, &["-C", dest, "remote", "add", "origin", &url])
            .await?;
        git.run(true, &["-C", dest, "fetch", "--depth", "1", "origin", reference])
            .await?;
        git.run(false, &["-C", dest, "checkout", "--quiet", "--detach", "FETCH_HEAD"])
            .await?;
    } else {
        git.run(
            true,
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                reference,
                &url,
                destination.as_str(),
            ],
        )
        .await?;
    }

    let Some(relative) = subdir else {
        return Ok(destination.to_path_buf());
    };
    let agent_dir = destination.join(relative);
    let is_dir = tokio::fs::metadata(agent_dir.as_std_path())
        .await
        .is_ok_and(|meta| meta.is_dir());
    if !is_dir {
        return Err(RetrievalError::Failed(format!(
            "path '{relative}' does not exist in {}",
            request.repo
        )));
    }
    Ok(agent_dir)
}

struct Git<'a, R: ?Sized> {
    runner: &'a R,
    program: &'a str,
    request: &'a CloneRequest<'a>,
}

impl<R: CommandRunner + ?Sized> Git<'_, R> {
    /// Runs one git command, prefixing the auth header when `remote` is set.
    async fn run(&self, remote: bool, args: &[&str]) -> RetrievalResult<()> {
        let mut argv = Vec::with_capacity(args.len().saturating_add(2));
        if let Some(secret) = self.request.token.filter(|_| remote) {
            argv.push("-c".to_owned());
            argv.push(format!("http.extraHeader={}", auth_header(secret)));
        }
        argv.extend(args.iter().map(|arg| (*arg).to_owned()));

        let token = self.request.token;
        let output = self
            .runner
            .run(self.program, &argv)
            .await
            .map_err(|err| match err {
                CommandError::NotFound { .. } => RetrievalError::Unavailable(err.to_string()),
                other => RetrievalError::Failed(redact(&other.to_string(), token)),
            })?;
        if output.success() {
            return Ok(());
        }
        let step = match args {
            ["-C", _, sub, ..] | [sub, ..] => *sub,
            [] => "command",
        };
        Err(RetrievalError::Failed(format!(
            "git {step} of {} at {} failed: {}",
            self.request.repo,
            self.request.reference.trim(),
            redact(&output.diagnostic(), token)
        )))
    }
}

fn is_commit_hash(reference: &str) -> bool {
    matches!(reference.len(), 40 | 64) && reference.chars().all(|c| c.is_ascii_hexdigit())
}

fn auth_header(secret: &SecretToken) -> String {
    let credential = STANDARD.encode(format!("x-access-token:{}", secret.expose()));
    format!("Authorization: Basic {credential}")
}

fn validate_argument<'a>(field: &str, value: &'a str) -> RetrievalResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(RetrievalError::InvalidInput(format!(
            "repository {field} '{value}' is not usable"
        )));
    }
    Ok(trimmed)
}

fn validate_subdir(path: &str) -> RetrievalResult<&Utf8Path> {
    let candidate = Utf8Path::new(path.trim());
    let safe = candidate
        .components()
        .all(|component| matches!(component, Utf8Component::Normal(_) | Utf8Component::CurDir));
    if !safe {
        return Err(RetrievalError::InvalidInput(format!(
            "path '{path}' must stay inside the repository"
        )));
    }
    Ok(candidate)
}

fn clone_url(repo: &str, token: Option<&SecretToken>) -> RetrievalResult<String> {
    let repo_name = validate_argument("repo", repo)?;
    let base = if repo_name.contains("://") {
        repo_name.to_owned()
    } else {
        let mut parts = repo_name.split('/');
        let well_formed = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !well_formed {
            return Err(RetrievalError::InvalidInput(format!(
                "repo '{repo}' must be 'owner/name' or a clone URL"
            )));
        }
        format!("https://github.com/{repo_name}.git")
    };

    if token.is_some() && !base.starts_with("https://") {
        return Err(RetrievalError::InvalidInput(
            "tokens are only sent over https".to_owned(),
        ));
    }
    Ok(base)
}

fn redact(message: &str, token: Option<&SecretToken>) -> String {
    let Some(secret) = token.filter(|secret| !secret.expose().is_empty()) else {
        return message.to_owned();
    };
    let encoded = STANDARD.encode(format!("x-access-token:{}", secret.expose()));
    message
        .replace(encoded.as_str(), "***")
        .replace(secret.expose(), "***")
}

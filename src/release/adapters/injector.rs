//! Runtime configuration and build descriptor injection.

use crate::agent::domain::EngineConfig;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use minijinja::{Environment, context};
use std::sync::Arc;
use thiserror::Error;

/// File the agent runtime reads its configuration from.
pub const CONFIG_FILE: &str = "config.yaml";
/// Build descriptor looked up in the source directory.
pub const DESCRIPTOR_FILE: &str = "Dockerfile";
/// Base image of the synthesized descriptor.
pub const DEFAULT_BASE_IMAGE: &str = "python:3.13-slim";
/// Runtime package installed by the synthesized descriptor.
pub const DEFAULT_RUNTIME_PACKAGE: &str = "idun-agent-engine";

const DESCRIPTOR_TEMPLATE: &str = r#"FROM {{ base_image }}

WORKDIR /app
COPY . .
RUN pip install --no-cache-dir {{ runtime_package }}

CMD ["python", "-c", "from idun_agent_engine.core.server_runner import run_server_from_config; run_server_from_config('{{ config_file }}')"]
"#;

/// Errors raised while preparing the build context.
#[derive(Debug, Clone, Error)]
pub enum InjectionError {
    /// Reading or writing the source directory failed.
    #[error("failed to write build context: {0}")]
    Io(Arc<std::io::Error>),

    /// The engine configuration could not be rendered as YAML.
    #[error("failed to serialize engine configuration: {0}")]
    Serialize(String),

    /// The default descriptor template failed to render.
    #[error("failed to render build descriptor: {0}")]
    Template(String),
}

impl From<std::io::Error> for InjectionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Which descriptor the build will use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorSource {
    /// The agent source shipped its own descriptor.
    Provided,
    /// The default descriptor was written.
    Generated,
}

/// Writes `config.yaml` and, when missing, a default `Dockerfile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigInjector {
    base_image: String,
    runtime_package: String,
}

impl ConfigInjector {
    /// Creates an injector for the given base image and runtime package.
    #[must_use]
    pub fn new(base_image: impl Into<String>, runtime_package: impl Into<String>) -> Self {
        Self {
            base_image: base_image.into(),
            runtime_package: runtime_package.into(),
        }
    }

    /// Prepares `source_dir` for an image build.
    ///
    /// The configuration is always written before the descriptor check, so a
    /// shipped descriptor can `COPY` it. Writes never leave `source_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`InjectionError`] when the directory cannot be opened or
    /// written, or when rendering fails.
    pub fn inject(
        &self,
        source_dir: &Utf8Path,
        engine_config: &EngineConfig,
    ) -> Result<DescriptorSource, InjectionError> {
        let dir = Dir::open_ambient_dir(source_dir, ambient_authority())?;

        let yaml = serde_yaml::to_string(engine_config.as_value())
            .map_err(|err| InjectionError::Serialize(err.to_string()))?;
        dir.write(CONFIG_FILE, yaml)?;

        if dir.exists(DESCRIPTOR_FILE) {
            return Ok(DescriptorSource::Provided);
        }
        dir.write(DESCRIPTOR_FILE, self.render_descriptor()?)?;
        Ok(DescriptorSource::Generated)
    }

    fn render_descriptor(&self) -> Result<String, InjectionError> {
        Environment::new()
            .render_str(
                DESCRIPTOR_TEMPLATE,
                context! {
                    base_image => self.base_image,
                    runtime_package => self.runtime_package,
                    config_file => CONFIG_FILE,
                },
            )
            .map_err(|err| InjectionError::Template(err.to_string()))
    }
}

impl Default for ConfigInjector {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_IMAGE, DEFAULT_RUNTIME_PACKAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use tempfile::TempDir;

    struct Workspace {
        _guard: TempDir,
        root: Utf8PathBuf,
    }

    #[fixture]
    fn workspace() -> Workspace {
        let guard = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(guard.path().to_path_buf()).expect("utf8 temp dir");
        Workspace {
            _guard: guard,
            root,
        }
    }

    fn engine_config() -> EngineConfig {
        EngineConfig::new(json!({"server": {"api": {"port": 8000}}})).expect("object config")
    }

    #[rstest]
    fn writes_config_and_default_descriptor(workspace: Workspace) {
        let source = ConfigInjector::default()
            .inject(&workspace.root, &engine_config())
            .expect("injection succeeds");

        assert_eq!(source, DescriptorSource::Generated);
        let config = std::fs::read_to_string(workspace.root.join(CONFIG_FILE)).expect("config");
        let parsed: serde_json::Value = serde_yaml::from_str(&config).expect("valid yaml");
        assert_eq!(parsed, json!({"server": {"api": {"port": 8000}}}));
        let descriptor =
            std::fs::read_to_string(workspace.root.join(DESCRIPTOR_FILE)).expect("descriptor");
        assert!(descriptor.starts_with("FROM python:3.13-slim"));
        assert!(descriptor.contains("pip install --no-cache-dir idun-agent-engine"));
        assert!(descriptor.contains("run_server_from_config('config.yaml')"));
    }

    #[rstest]
    fn keeps_shipped_descriptor(workspace: Workspace) {
        std::fs::write(workspace.root.join(DESCRIPTOR_FILE), "FROM scratch\n").expect("seed");

        let source = ConfigInjector::new("ignored:latest", "ignored")
            .inject(&workspace.root, &EngineConfig::empty())
            .expect("injection succeeds");

        assert_eq!(source, DescriptorSource::Provided);
        let descriptor =
            std::fs::read_to_string(workspace.root.join(DESCRIPTOR_FILE)).expect("descriptor");
        assert_eq!(descriptor, "FROM scratch\n");
        assert!(workspace.root.join(CONFIG_FILE).exists());
    }

    #[rstest]
    fn custom_base_image_is_rendered(workspace: Workspace) {
        ConfigInjector::new("python:3.12-alpine", "my-runtime==1.2")
            .inject(&workspace.root, &EngineConfig::empty())
            .expect("injection succeeds");

        let descriptor =
            std::fs::read_to_string(workspace.root.join(DESCRIPTOR_FILE)).expect("descriptor");
        assert!(descriptor.starts_with("FROM python:3.12-alpine"));
        assert!(descriptor.contains("my-runtime==1.2"));
    }
}

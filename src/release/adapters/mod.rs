//! Adapter implementations for the release pipeline ports.

mod build;
mod command;
mod deploy;
mod injector;
mod publish;
mod retrieval;
mod runtime;

pub use build::{DEFAULT_DOCKER_PROGRAM, DockerImageBuilder};
pub use command::{
    DEFAULT_COMMAND_TIMEOUT, RecordedCommand, ScriptedCommandRunner, TokioCommandRunner,
};
pub use deploy::{AGENT_PORT, ContainerDeployer, DEFAULT_NETWORK, DEFAULT_PUBLIC_BASE_URL};
pub use injector::{
    CONFIG_FILE, ConfigInjector, DEFAULT_BASE_IMAGE, DEFAULT_RUNTIME_PACKAGE, DESCRIPTOR_FILE,
    DescriptorSource, InjectionError,
};
pub use publish::RegistryPublisher;
pub use retrieval::{DEFAULT_GIT_PROGRAM, SourceRetriever};
pub use runtime::{InMemoryContainerHost, InMemoryImageBuilder};

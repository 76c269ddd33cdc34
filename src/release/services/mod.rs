//! Release pipeline services.

mod admission;
mod orchestrator;
mod settings;

pub use orchestrator::{
    ReleaseOrchestrator, ReleaseReport, ReleaseServiceError, ReleaseServiceResult,
};
pub use settings::{PipelineSettings, ReleaseToolchain};

//! Atelier: versioned build, deploy, and rollback for managed agents.
//!
//! An agent is registered once with its engine configuration, a source
//! location, and a deployment target. Each deploy retrieves the source,
//! injects the runtime configuration, builds and publishes an image, and
//! starts it, recording a numbered version. Any earlier version can be
//! redeployed without rebuilding.
//!
//! # Architecture
//!
//! Atelier follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, processes)
//!
//! # Modules
//!
//! - [`agent`]: Managed agent registration
//! - [`release`]: Release pipeline, versions, and deployments
//! - [`store`]: Persistence shared by both
//! - [`config`]: Process configuration
//! - [`telemetry`]: Log output for the binary

pub mod agent;
pub mod config;
pub mod release;
pub mod store;
pub mod telemetry;

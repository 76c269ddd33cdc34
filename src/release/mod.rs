//! Agent release pipeline.
//!
//! A release turns an agent's source into a numbered, running version:
//! retrieve the source, inject runtime configuration, build an image,
//! publish it, and deploy it. Every built version is recorded so any earlier
//! one can be redeployed without rebuilding. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Capability adapters in [`adapters`]
//! - The pipeline orchestrator in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

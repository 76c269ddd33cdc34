//! Managed agent registration.
//!
//! A managed agent bundles the identity of a deployable agent with the three
//! configuration blobs the release pipeline consumes: the opaque engine
//! configuration handed to the agent runtime, where the source comes from,
//! and where the built image runs. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Orchestration services in [`services`]
//!
//! Persistence adapters live in [`crate::store`] because a single store backs
//! both agents and their release history.

pub mod domain;
pub mod ports;
pub mod services;

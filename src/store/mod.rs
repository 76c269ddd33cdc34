//! Persistence adapters shared by the agent and release modules.
//!
//! One store implements both [`crate::agent::ports::AgentRepository`] and
//! [`crate::release::ports::ReleaseRepository`]: the version counter lives on
//! the agent row and deleting an agent removes its release history.

mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::{AtelierPgPool, PostgresStore};

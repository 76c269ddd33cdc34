//! Port contracts for managed agent persistence.

mod repository;

pub use repository::{AgentRepository, AgentRepositoryError, AgentRepositoryResult};

//! `PostgreSQL` store for agents, versions, and deployments.
//!
//! The schema lives in `migrations/`; apply it with the diesel CLI before
//! pointing the store at a database.

mod models;
mod repository;
mod schema;

pub use repository::{AtelierPgPool, PostgresStore, connect};

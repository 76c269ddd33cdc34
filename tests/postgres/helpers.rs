//! Shared test helpers for `PostgreSQL` integration tests.

use atelier::agent::domain::{
    AgentDefinition, AgentId, AgentName, DeploymentConfig, EngineConfig, ManagedAgent,
    RetrievalConfig,
};
use atelier::store::{PostgresStore, postgres};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use eyre::{Result, WrapErr};
use mockable::DefaultClock;
use uuid::Uuid;

/// Variable naming the database used by these tests.
pub const DATABASE_URL_ENV: &str = "ATELIER_TEST_DATABASE_URL";

/// SQL creating the release schema.
pub const CREATE_SCHEMA_SQL: &str =
    include_str!("../../migrations/2026-10-01-000000_create_release_tables/up.sql");

/// Drops the scratch schema when the test ends.
pub struct SchemaGuard {
    base_url: String,
    schema: String,
}

impl Drop for SchemaGuard {
    fn drop(&mut self) {
        if let Ok(mut conn) = PgConnection::establish(&self.base_url) {
            let drop_sql = format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema);
            if let Err(err) = conn.batch_execute(&drop_sql) {
                tracing::warn!(schema = %self.schema, error = %err, "scratch schema left behind");
            }
        }
    }
}

/// Store bound to a migrated scratch schema.
pub struct PreparedStore {
    /// Store under test.
    pub store: PostgresStore,
    /// Keeps the schema alive for the test.
    pub guard: SchemaGuard,
}

fn scoped_url(base_url: &str, schema: &str) -> String {
    let separator = if base_url.contains('?') { '&' } else { '?' };
    format!("{base_url}{separator}options=-csearch_path%3D{schema}")
}

/// Creates a migrated scratch schema, or `None` when no database is
/// configured.
///
/// # Errors
///
/// Returns an error when the database is configured but unusable.
pub fn prepare_store() -> Result<Option<PreparedStore>> {
    let Ok(base_url) = std::env::var(DATABASE_URL_ENV) else {
        return Ok(None);
    };
    tokio::task::block_in_place(|| {
        let schema = format!("atelier_test_{}", Uuid::new_v4().simple());
        let mut admin = PgConnection::establish(&base_url).wrap_err("connect to test database")?;
        admin.batch_execute(&format!("CREATE SCHEMA {schema}"))?;
        let guard = SchemaGuard {
            base_url: base_url.clone(),
            schema: schema.clone(),
        };

        let url = scoped_url(&base_url, &schema);
        let mut scoped = PgConnection::establish(&url).wrap_err("connect to scratch schema")?;
        scoped.batch_execute(CREATE_SCHEMA_SQL).wrap_err("apply migration")?;
        let pool = postgres::connect(&url, 4).wrap_err("build pool")?;
        Ok(Some(PreparedStore {
            store: PostgresStore::new(pool),
            guard,
        }))
    })
}

/// Builds an agent with an archive source and a local target.
///
/// # Errors
///
/// Returns an error when `id` or `name` is invalid.
pub fn agent(id: &str, name: &str) -> Result<ManagedAgent> {
    Ok(ManagedAgent::new(
        AgentId::new(id)?,
        AgentDefinition {
            name: AgentName::new(name)?,
            description: Some("integration agent".to_owned()),
            engine_config: EngineConfig::new(serde_json::json!({ "server": { "port": 8000 } }))?,
            retrieval: RetrievalConfig::archive("UEsFBgAAAAAAAAAAAAAAAAAAAAAAAA=="),
            deployment: DeploymentConfig::local(),
        },
        &DefaultClock,
    ))
}

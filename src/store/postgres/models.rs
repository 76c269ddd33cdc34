//! Diesel row models.

use super::schema::{agent_versions, deployments, managed_agents};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for agents.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = managed_agents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AgentRow {
    /// Agent identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Engine configuration.
    pub engine_config: Value,
    /// Source location.
    pub retrieval_config: Value,
    /// Deployment target.
    pub deployment_config: Value,
    /// Version counter.
    pub last_version: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for agents. The version counter starts at its default.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = managed_agents)]
pub struct NewAgentRow {
    /// Agent identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Engine configuration.
    pub engine_config: Value,
    /// Source location.
    pub retrieval_config: Value,
    /// Deployment target.
    pub deployment_config: Value,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query and insert row for versions.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = agent_versions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VersionRow {
    /// Version identifier.
    pub id: uuid::Uuid,
    /// Owning agent.
    pub agent_id: String,
    /// Version number.
    pub version: i32,
    /// Image tag.
    pub image_tag: String,
    /// Artifact locator.
    pub artifact_uri: String,
    /// Target kind.
    pub deploy_target: String,
    /// Deployment reference.
    pub deploy_ref: Option<String>,
    /// Lifecycle status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query and insert row for deployments.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = deployments)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeploymentRow {
    /// Deployment identifier.
    pub id: uuid::Uuid,
    /// Owning agent.
    pub agent_id: String,
    /// Deployed version.
    pub version_id: uuid::Uuid,
    /// Target kind.
    pub target: String,
    /// Public endpoint.
    pub endpoint_url: String,
    /// Router entry.
    pub router_id: Option<String>,
    /// Teardown handle.
    pub deploy_ref: String,
    /// Status.
    pub status: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

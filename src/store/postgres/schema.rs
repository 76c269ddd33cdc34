//! Diesel schema for agent, version, and deployment persistence.

diesel::table! {
    /// Registered agents and their version counters.
    managed_agents (id) {
        /// Agent identifier.
        #[max_length = 64]
        id -> Varchar,
        /// Unique display name.
        #[max_length = 255]
        name -> Varchar,
        /// Free-text description.
        description -> Nullable<Text>,
        /// Engine configuration object.
        engine_config -> Jsonb,
        /// Source location as JSONB.
        retrieval_config -> Jsonb,
        /// Deployment target as JSONB.
        deployment_config -> Jsonb,
        /// Highest version number handed out so far.
        last_version -> Int4,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Published versions of agents.
    agent_versions (id) {
        /// Version identifier.
        id -> Uuid,
        /// Owning agent.
        #[max_length = 64]
        agent_id -> Varchar,
        /// Per-agent version number.
        version -> Int4,
        /// Image tag.
        image_tag -> Text,
        /// Artifact locator.
        artifact_uri -> Text,
        /// Target kind recorded at build time.
        #[max_length = 20]
        deploy_target -> Varchar,
        /// Reference of the last successful deploy.
        deploy_ref -> Nullable<Text>,
        /// Lifecycle status.
        #[max_length = 20]
        status -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Deployment history.
    deployments (id) {
        /// Deployment identifier.
        id -> Uuid,
        /// Owning agent.
        #[max_length = 64]
        agent_id -> Varchar,
        /// Deployed version.
        version_id -> Uuid,
        /// Target kind.
        #[max_length = 20]
        target -> Varchar,
        /// Public endpoint.
        endpoint_url -> Text,
        /// Router entry.
        router_id -> Nullable<Text>,
        /// Teardown handle.
        deploy_ref -> Text,
        /// `running` or `stopped`.
        #[max_length = 20]
        status -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(agent_versions -> managed_agents (agent_id));
diesel::joinable!(deployments -> agent_versions (version_id));

diesel::allow_tables_to_appear_in_same_query!(managed_agents, agent_versions, deployments);

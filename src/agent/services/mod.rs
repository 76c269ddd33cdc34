//! Service layer for managed agent registration.

mod registry;

pub use registry::{
    AgentRegistryService, AgentRegistryServiceError, AgentRegistryServiceResult,
    CreateAgentRequest, UpdateAgentRequest,
};

//! Error types for spine-orchestrator.

use spine_agents::{AgentError, RenderError};
use spine_core::{ConfigError, ProjectId, RegistryError, StoreError, TaskId, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Rejected at submission; nothing was routed or written.
    #[error("invalid task '{task_id}': {reason}")]
    InvalidTask { task_id: TaskId, reason: String },

    #[error(transparent)]
    Agent(#[from] AgentError),

    /// The lineage of `task_id` reached the configured handoff limit.
    #[error("task '{task_id}' in project '{project_id}' exceeded the chain depth limit ({depth} of {limit} handoffs)")]
    MaxChainDepth {
        task_id: TaskId,
        project_id: ProjectId,
        depth: usize,
        limit: usize,
    },

    #[error("invalid handoff: {0}")]
    InvalidHandoff(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("prompt templates: {0}")]
    Render(#[from] RenderError),

    #[error("blocking task failed: {0}")]
    Join(String),
}

pub(crate) fn join_err(err: tokio::task::JoinError) -> OrchestratorError {
    OrchestratorError::Join(err.to_string())
}

//! Error types for spine-agents.

use std::path::PathBuf;

use spine_core::{AgentName, StoreError, TaskId};
use thiserror::Error;

/// Failure reported by the external reasoning capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReasonerError {
    #[error("reasoning capability unavailable: {0}")]
    Unavailable(String),

    #[error("reasoning failed: {0}")]
    Failed(String),
}

/// Prompt template loading and rendering errors.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}

/// Errors from one agent invocation.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The reasoning capability failed or was unavailable.
    #[error("agent '{agent}' failed on task '{task_id}': {reason}")]
    Execution {
        agent: AgentName,
        task_id: TaskId,
        reason: String,
    },

    /// The reasoning capability answered, but not with a usable output.
    #[error("agent '{agent}' returned malformed output for task '{task_id}': {detail}")]
    MalformedOutput {
        agent: AgentName,
        task_id: TaskId,
        detail: String,
    },

    #[error("task '{task_id}' is addressed to '{addressed_to}', not '{agent}'")]
    Misaddressed {
        agent: AgentName,
        task_id: TaskId,
        addressed_to: AgentName,
    },

    #[error("prompt for agent '{agent}' could not be rendered: {source}")]
    Render {
        agent: AgentName,
        #[source]
        source: RenderError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("blocking task failed: {0}")]
    Join(String),
}

impl AgentError {
    /// `true` for the failures of the reasoning step itself.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            AgentError::Execution { .. } | AgentError::MalformedOutput { .. }
        )
    }
}

//! Error types for spine-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::RecordKind;
use crate::types::AgentName;

/// A string did not name any variant of an enumerated tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownTag {
    pub kind: &'static str,
    pub value: String,
}

/// Errors raised by a [`RecordStore`](crate::store::RecordStore) and the
/// [`Spine`](crate::spine::Spine) facade.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be encoded or decoded.
    #[error("record JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: RecordKind, id: String },

    /// `put` on an existing id with different bytes.
    #[error("{kind} '{id}' already stored with different content (stored {stored}, incoming {incoming})")]
    Conflict {
        kind: RecordKind,
        id: String,
        stored: String,
        incoming: String,
    },

    /// The stored record moved since the caller read it.
    #[error("stale write to {kind} '{id}': stored record changed since it was read")]
    StaleWrite { kind: RecordKind, id: String },

    #[error("{kind} records are immutable once stored")]
    Immutable { kind: RecordKind },

    /// Ids double as file names; path separators and empty ids are rejected.
    #[error("invalid record id '{0}'")]
    InvalidId(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_stale(&self) -> bool {
        matches!(self, StoreError::StaleWrite { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

/// Errors from the agent contract registry. All of them are bootstrap errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("agent '{0}' is already registered")]
    DuplicateAgent(AgentName),

    #[error("agent '{0}' is not registered")]
    AgentNotFound(AgentName),

    /// A contract names a neighbour that is not registered, or is otherwise unusable.
    #[error("invalid contract for '{agent}': {reason}")]
    InvalidContract { agent: AgentName, reason: String },

    #[error("I/O error reading contracts at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes the file path.
    #[error("failed to parse contracts at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors loading or saving [`SpineConfig`](crate::config::SpineConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A task or handoff failed structural validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("field '{field}' names unregistered agent '{agent}'")]
    UnregisteredAgent { field: &'static str, agent: AgentName },

    #[error("malformed task JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

//! Knowledge Spine core: domain types, record store, contract registry,
//! configuration, validation.
//!
//! - [`types`]: ids, tags and the record structs
//! - [`store`]: the [`RecordStore`] contract, with [`FsStore`] and [`MemoryStore`]
//! - [`spine`]: [`Spine`], the typed facade with membership linking and retry
//! - [`contracts`]: [`ContractRegistry`] and the six built-in roles
//! - [`config`]: [`SpineConfig`] (YAML)
//! - [`validate`]: structural task / handoff checks

pub mod config;
pub mod contracts;
pub mod error;
pub mod fs_store;
pub mod memory_store;
pub mod record;
pub mod spine;
pub mod store;
pub mod types;
pub mod validate;

pub use config::{RetryPolicy, SpineConfig};
pub use contracts::ContractRegistry;
pub use error::{ConfigError, RegistryError, StoreError, UnknownTag, ValidationError};
pub use fs_store::FsStore;
pub use memory_store::MemoryStore;
pub use record::{Owned, Record, RecordKind};
pub use spine::Spine;
pub use store::{NarrativeIter, PutOutcome, RecordStore};
pub use types::{
    AgentContract, AgentName, Artifact, ArtifactId, ArtifactType, ContextRef, Decision,
    DecisionId, Handoff, HandoffId, Impact, Metadata, NarrativeEntry, OutputType, Priority,
    Project, ProjectId, ProjectStatus, Task, TaskId,
};

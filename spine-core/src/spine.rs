//! Typed facade over a [`RecordStore`].
//!
//! `Spine` serializes records to canonical bytes, keeps project membership
//! lists in step with owned records, and retries stale project writes with
//! bounded exponential backoff. Its methods block; async callers run them on
//! a blocking thread.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::config::RetryPolicy;
use crate::contracts::ContractRegistry;
use crate::error::StoreError;
use crate::record::{Owned, Record, RecordKind};
use crate::store::{digest, encode, NarrativeIter, PutOutcome, RecordStore};
use crate::types::{Artifact, NarrativeEntry, Project, ProjectId, ProjectStatus};

#[derive(Clone)]
pub struct Spine {
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Spine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spine").field("retry", &self.retry).finish_non_exhaustive()
    }
}

impl Spine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    // -----------------------------------------------------------------------
    // Generic record access
    // -----------------------------------------------------------------------

    /// Store an immutable record; returns its id.
    ///
    /// Re-putting byte-identical content is a no-op; different content under
    /// the same id is a [`StoreError::Conflict`].
    pub fn put<R: Record>(&self, record: &R) -> Result<String, StoreError> {
        let id = record.record_id();
        let bytes = encode(record)?;
        let outcome = self.store.put_bytes(R::KIND, id, &bytes)?;
        if outcome == PutOutcome::Unchanged {
            tracing::debug!(kind = %R::KIND, id, "identical record already stored");
        }
        Ok(id.to_owned())
    }

    pub fn get<R: Record>(&self, id: &str) -> Result<R, StoreError> {
        let bytes = self.store.get_bytes(R::KIND, id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Every stored record of a kind, sorted by id.
    pub fn list_all<R: Record>(&self) -> Result<Vec<R>, StoreError> {
        self.store
            .list_ids(R::KIND)?
            .iter()
            .map(|id| self.get::<R>(id))
            .collect()
    }

    /// Records owned by `project_id`, in the project's membership order.
    ///
    /// A record whose membership link never landed is not listed.
    pub fn list_by_project<R: Owned>(&self, project_id: &ProjectId) -> Result<Vec<R>, StoreError> {
        let project = self.get_project(project_id)?;
        R::members(&project)
            .into_iter()
            .map(|id| self.get::<R>(id))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Projects
    // -----------------------------------------------------------------------

    pub fn create_project(&self, project: &Project) -> Result<(), StoreError> {
        self.put(project).map(|_| ())
    }

    pub fn get_project(&self, id: &ProjectId) -> Result<Project, StoreError> {
        self.get(id.as_str())
    }

    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.list_all()
    }

    /// Replace a project read at `read_at`.
    ///
    /// Fails with [`StoreError::StaleWrite`] if the stored `updated_at` moved
    /// since then. The written record gets a fresh, strictly later
    /// `updated_at`, which is returned.
    pub fn update_project(&self, project: &Project, read_at: DateTime<Utc>) -> Result<Project, StoreError> {
        let id = project.id.as_str();
        let stored_bytes = self.store.get_bytes(RecordKind::Project, id)?;
        let stored: Project = serde_json::from_slice(&stored_bytes)?;
        if stored.updated_at != read_at {
            return Err(StoreError::StaleWrite {
                kind: RecordKind::Project,
                id: id.to_owned(),
            });
        }

        let mut next = project.clone();
        next.created_at = stored.created_at;
        next.updated_at = later_than(stored.updated_at);
        let bytes = encode(&next)?;
        // The digest guard catches a writer that slipped in after the read above.
        self.store
            .replace_bytes(RecordKind::Project, id, &digest(&stored_bytes), &bytes)?;
        Ok(next)
    }

    /// Caller-driven status change, retried on stale writes.
    pub fn set_project_status(&self, id: &ProjectId, status: ProjectStatus) -> Result<Project, StoreError> {
        self.retry_stale(id, || {
            let mut project = self.get_project(id)?;
            if project.status == status {
                return Ok(project);
            }
            let read_at = project.updated_at;
            project.status = status;
            self.update_project(&project, read_at)
        })
    }

    // -----------------------------------------------------------------------
    // Owned records
    // -----------------------------------------------------------------------

    /// Store an artifact, decision or handoff and link it into its owning
    /// project, as one logical write.
    ///
    /// The project must exist before anything is written. The membership
    /// update is retried on [`StoreError::StaleWrite`] up to the policy cap;
    /// after that the stale error is surfaced and the record stays unlisted.
    /// Re-running with the same record is safe.
    pub fn record_owned<R: Owned>(&self, record: &R) -> Result<Project, StoreError> {
        let project_id = record.owner().clone();
        self.get_project(&project_id)?;
        self.put(record)?;

        self.retry_stale(&project_id, || {
            let mut project = self.get_project(&project_id)?;
            let read_at = project.updated_at;
            if !record.link(&mut project) {
                return Ok(project);
            }
            self.update_project(&project, read_at)
        })
    }

    /// Persist every contract of `registry` (idempotent).
    pub fn put_contracts(&self, registry: &ContractRegistry) -> Result<usize, StoreError> {
        for contract in registry.all() {
            self.put(contract)?;
        }
        Ok(registry.len())
    }

    /// Case-insensitive substring search over artifact content.
    pub fn search_artifacts(
        &self,
        query: &str,
        project_id: Option<&ProjectId>,
    ) -> Result<Vec<Artifact>, StoreError> {
        let needle = query.to_lowercase();
        let candidates: Vec<Artifact> = match project_id {
            Some(id) => self.list_by_project(id)?,
            None => self.list_all()?,
        };
        Ok(candidates
            .into_iter()
            .filter(|a| a.content.to_lowercase().contains(&needle))
            .collect())
    }

    // -----------------------------------------------------------------------
    // Narrative
    // -----------------------------------------------------------------------

    pub fn append_narrative(
        &self,
        project_id: &ProjectId,
        text: impl Into<String>,
        author: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store.append_narrative(&NarrativeEntry {
            project_id: project_id.clone(),
            timestamp,
            author: author.into(),
            text: text.into(),
        })
    }

    pub fn read_narrative(&self, project_id: &ProjectId) -> Result<NarrativeIter, StoreError> {
        self.store.read_narrative(project_id)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn retry_stale<T>(
        &self,
        project_id: &ProjectId,
        mut op: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut attempt = 1;
        loop {
            match op() {
                Err(err) if err.is_stale() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        project = %project_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "stale project write, retrying",
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) if err.is_stale() => {
                    tracing::error!(project = %project_id, attempts = attempt, "project write retries exhausted");
                    return Err(err);
                }
                other => return other,
            }
        }
    }
}

/// `now`, or one microsecond past `previous` when the clock has not moved on.
fn later_than(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + ChronoDuration::microseconds(1)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

//! In-process [`RecordStore`] for tests and ephemeral runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::StoreError;
use crate::record::RecordKind;
use crate::store::{check_id, compare_existing, digest, NarrativeIter, PutOutcome, RecordStore};
use crate::types::{NarrativeEntry, ProjectId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<(RecordKind, String), Vec<u8>>>,
    narrative: RwLock<HashMap<ProjectId, Vec<NarrativeEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_owned())
}

impl RecordStore for MemoryStore {
    fn put_bytes(&self, kind: RecordKind, id: &str, bytes: &[u8]) -> Result<PutOutcome, StoreError> {
        check_id(id)?;
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let key = (kind, id.to_owned());
        if let Some(stored) = records.get(&key) {
            return compare_existing(kind, id, stored, bytes);
        }
        records.insert(key, bytes.to_vec());
        Ok(PutOutcome::Created)
    }

    fn get_bytes(&self, kind: RecordKind, id: &str) -> Result<Vec<u8>, StoreError> {
        check_id(id)?;
        let records = self.records.read().map_err(|_| poisoned())?;
        records
            .get(&(kind, id.to_owned()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_owned(),
            })
    }

    fn replace_bytes(
        &self,
        kind: RecordKind,
        id: &str,
        expected_digest: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError> {
        if !kind.is_mutable() {
            return Err(StoreError::Immutable { kind });
        }
        check_id(id)?;
        let mut records = self.records.write().map_err(|_| poisoned())?;
        let Some(stored) = records.get_mut(&(kind, id.to_owned())) else {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_owned(),
            });
        };
        if digest(stored) != expected_digest {
            return Err(StoreError::StaleWrite {
                kind,
                id: id.to_owned(),
            });
        }
        *stored = bytes.to_vec();
        Ok(())
    }

    fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>, StoreError> {
        let records = self.records.read().map_err(|_| poisoned())?;
        Ok(records
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect())
    }

    fn append_narrative(&self, entry: &NarrativeEntry) -> Result<(), StoreError> {
        check_id(entry.project_id.as_str())?;
        let mut narrative = self.narrative.write().map_err(|_| poisoned())?;
        narrative
            .entry(entry.project_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn read_narrative(&self, project_id: &ProjectId) -> Result<NarrativeIter, StoreError> {
        check_id(project_id.as_str())?;
        let narrative = self.narrative.read().map_err(|_| poisoned())?;
        let entries = narrative.get(project_id).cloned().unwrap_or_default();
        Ok(Box::new(entries.into_iter().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_requires_matching_digest() {
        let store = MemoryStore::new();
        store.put_bytes(RecordKind::Project, "p1", b"v1").unwrap();
        let err = store
            .replace_bytes(RecordKind::Project, "p1", &digest(b"other"), b"v2")
            .unwrap_err();
        assert!(err.is_stale());
        store
            .replace_bytes(RecordKind::Project, "p1", &digest(b"v1"), b"v2")
            .unwrap();
        assert_eq!(store.get_bytes(RecordKind::Project, "p1").unwrap(), b"v2");
    }

    #[test]
    fn immutable_kinds_cannot_be_replaced() {
        let store = MemoryStore::new();
        store.put_bytes(RecordKind::Handoff, "h1", b"v1").unwrap();
        let err = store
            .replace_bytes(RecordKind::Handoff, "h1", &digest(b"v1"), b"v2")
            .unwrap_err();
        assert!(matches!(err, StoreError::Immutable { .. }));
    }

    #[test]
    fn list_ids_is_scoped_to_kind() {
        let store = MemoryStore::new();
        store.put_bytes(RecordKind::Artifact, "b", b"1").unwrap();
        store.put_bytes(RecordKind::Artifact, "a", b"1").unwrap();
        store.put_bytes(RecordKind::Decision, "c", b"1").unwrap();
        assert_eq!(store.list_ids(RecordKind::Artifact).unwrap(), vec!["a", "b"]);
    }
}

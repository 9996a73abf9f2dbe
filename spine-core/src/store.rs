//! The Record Store contract.
//!
//! A [`RecordStore`] is a durable keyed store of canonical JSON bytes, one
//! record per `(kind, id)`, plus one append-only narrative stream per project.
//! It knows nothing about membership lists or retries; the typed
//! [`Spine`](crate::spine::Spine) facade layers those on top.
//!
//! Two backends ship with the crate: [`FsStore`](crate::fs_store::FsStore)
//! and [`MemoryStore`](crate::memory_store::MemoryStore).

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::record::RecordKind;
use crate::types::{NarrativeEntry, ProjectId};

/// Lazy, finite sequence of narrative entries. Call
/// [`RecordStore::read_narrative`] again to restart from the first entry.
pub type NarrativeIter = Box<dyn Iterator<Item = Result<NarrativeEntry, StoreError>> + Send>;

/// What a successful `put` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    /// Same id, byte-identical content: nothing was written.
    Unchanged,
}

pub trait RecordStore: Send + Sync {
    /// Store `bytes` under `(kind, id)`.
    ///
    /// Idempotent only for byte-identical content; otherwise
    /// [`StoreError::Conflict`].
    fn put_bytes(&self, kind: RecordKind, id: &str, bytes: &[u8]) -> Result<PutOutcome, StoreError>;

    /// [`StoreError::NotFound`] when absent.
    fn get_bytes(&self, kind: RecordKind, id: &str) -> Result<Vec<u8>, StoreError>;

    /// Replace a mutable record if its stored digest still equals
    /// `expected_digest`, else [`StoreError::StaleWrite`].
    fn replace_bytes(
        &self,
        kind: RecordKind,
        id: &str,
        expected_digest: &str,
        bytes: &[u8],
    ) -> Result<(), StoreError>;

    /// All ids of `kind`, sorted.
    fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>, StoreError>;

    /// Never fails because of the entry's text. Fails when storage is
    /// unavailable or when `project_id` is not a valid record id (the same
    /// rule as every other id, checked by both backends).
    fn append_narrative(&self, entry: &NarrativeEntry) -> Result<(), StoreError>;

    fn read_narrative(&self, project_id: &ProjectId) -> Result<NarrativeIter, StoreError>;
}

/// SHA-256 hex digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Canonical byte encoding of a record.
pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec_pretty(record)?)
}

/// Ids become file names in [`FsStore`](crate::fs_store::FsStore); every
/// backend enforces the same rule so records stay portable.
pub(crate) fn check_id(id: &str) -> Result<(), StoreError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0'])
        || id.ends_with(".tmp");
    if bad {
        return Err(StoreError::InvalidId(id.to_owned()));
    }
    Ok(())
}

/// Compare incoming bytes against what is stored.
pub(crate) fn compare_existing(
    kind: RecordKind,
    id: &str,
    stored: &[u8],
    incoming: &[u8],
) -> Result<PutOutcome, StoreError> {
    let stored = digest(stored);
    let incoming = digest(incoming);
    if stored == incoming {
        Ok(PutOutcome::Unchanged)
    } else {
        Err(StoreError::Conflict {
            kind,
            id: id.to_owned(),
            stored,
            incoming,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_hex() {
        let d = digest(b"abc");
        assert_eq!(
            d,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn rejects_path_like_ids() {
        for id in ["", ".", "..", "a/b", "a\\b", "x.tmp"] {
            assert!(matches!(check_id(id), Err(StoreError::InvalidId(_))), "{id}");
        }
        assert!(check_id("0d1c1b0e-8a4f-4a8e-9d2b-1f2e3d4c5b6a").is_ok());
    }

    #[test]
    fn compare_reports_both_digests() {
        let err = compare_existing(RecordKind::Handoff, "h1", b"a", b"b").unwrap_err();
        match err {
            StoreError::Conflict { stored, incoming, .. } => {
                assert_eq!(stored, digest(b"a"));
                assert_eq!(incoming, digest(b"b"));
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(
            compare_existing(RecordKind::Handoff, "h1", b"a", b"a").unwrap(),
            PutOutcome::Unchanged
        );
    }
}

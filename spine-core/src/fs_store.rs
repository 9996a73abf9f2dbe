//! File-backed [`RecordStore`].
//!
//! # Storage layout
//!
//! ```text
//! <root>/
//!   projects/<id>.json        (mode 0600)
//!   artifacts/<id>.json
//!   decisions/<id>.json
//!   handoffs/<id>.json
//!   agents/<agent_name>.json
//!   narrative/<project_id>.jsonl   (append-only, one entry per line)
//! ```
//!
//! Record writes go to a `.tmp` sibling and are renamed into place, so a crash
//! mid-write never leaves a half-written record. Mutations are serialized by an
//! in-process lock; the store assumes a single writing process per root.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{io_err, StoreError};
use crate::record::RecordKind;
use crate::store::{check_id, compare_existing, digest, NarrativeIter, PutOutcome, RecordStore};
use crate::types::{NarrativeEntry, ProjectId};

const NARRATIVE_DIR: &str = "narrative";

#[derive(Debug)]
pub struct FsStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        create_dir(&root)?;
        for kind in RecordKind::ALL {
            create_dir(&root.join(kind.dir_name()))?;
        }
        create_dir(&root.join(NARRATIVE_DIR))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<kind dir>/<id>.json`: pure, no I/O.
    pub fn record_path(&self, kind: RecordKind, id: &str) -> PathBuf {
        self.root.join(kind.dir_name()).join(format!("{id}.json"))
    }

    /// `<root>/narrative/<project_id>.jsonl`: pure, no I/O.
    pub fn narrative_path(&self, project_id: &ProjectId) -> PathBuf {
        self.root
            .join(NARRATIVE_DIR)
            .join(format!("{}.jsonl", project_id.0))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("store write lock poisoned".to_owned()))
    }
}

impl RecordStore for FsStore {
    fn put_bytes(&self, kind: RecordKind, id: &str, bytes: &[u8]) -> Result<PutOutcome, StoreError> {
        check_id(id)?;
        let path = self.record_path(kind, id);
        let _guard = self.lock()?;
        match fs::read(&path) {
            Ok(stored) => return compare_existing(kind, id, &stored, bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&path, err)),
        }
        write_atomic(&path, bytes)?;
        Ok(PutOutcome::Created)
    }

    fn get_bytes(&self, kind: RecordKind, id: &str) -> Result<Vec<u8>, StoreError> {
        check_id(id)?;
        let path = self.record_path(kind, id);
        fs::read(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    kind,
                    id: id.to_owned(),
                }
            } else {
                io_err(&path, err)
            }
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
        let path = self.record_path(kind, id);
        let _guard = self.lock()?;
        let stored = fs::read(&path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound {
                    kind,
                    id: id.to_owned(),
                }
            } else {
                io_err(&path, err)
            }
        })?;
        if digest(&stored) != expected_digest {
            return Err(StoreError::StaleWrite {
                kind,
                id: id.to_owned(),
            });
        }
        write_atomic(&path, bytes)
    }

    fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>, StoreError> {
        let dir = self.root.join(kind.dir_name());
        let entries = fs::read_dir(&dir).map_err(|e| io_err(&dir, e))?;
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                name.strip_suffix(".json").map(str::to_owned)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn append_narrative(&self, entry: &NarrativeEntry) -> Result<(), StoreError> {
        check_id(entry.project_id.as_str())?;
        let path = self.narrative_path(&entry.project_id);
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let _guard = self.lock()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| io_err(&path, e))?;
        set_file_permissions(&path)?;
        file.write_all(&line).map_err(|e| io_err(&path, e))?;
        file.flush().map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    fn read_narrative(&self, project_id: &ProjectId) -> Result<NarrativeIter, StoreError> {
        check_id(project_id.as_str())?;
        let path = self.narrative_path(project_id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Box::new(std::iter::empty())),
            Err(err) => return Err(io_err(&path, err)),
        };

        let lines = BufReader::new(file).lines();
        let iter = lines.filter_map(move |line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(serde_json::from_str::<NarrativeEntry>(&line).map_err(StoreError::from)),
            Err(err) => Some(Err(io_err(&path, err))),
        });
        Ok(Box::new(iter))
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));
    fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

fn create_dir(dir: &Path) -> Result<(), StoreError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn open() -> (TempDir, FsStore) {
        let dir = TempDir::new().expect("tempdir");
        let store = FsStore::open(dir.path().join("store")).expect("open");
        (dir, store)
    }

    #[test]
    fn open_creates_layout() {
        let (_dir, store) = open();
        for kind in RecordKind::ALL {
            assert!(store.root().join(kind.dir_name()).is_dir());
        }
        assert!(store.root().join("narrative").is_dir());
    }

    #[test]
    fn atomic_write_cleans_up_tmp() {
        let (_dir, store) = open();
        store
            .put_bytes(RecordKind::Artifact, "a1", b"{}")
            .expect("put");
        let path = store.record_path(RecordKind::Artifact, "a1");
        assert!(path.exists());
        assert!(!path.with_file_name("a1.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn records_are_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = open();
        store.put_bytes(RecordKind::Decision, "d1", b"{}").expect("put");
        let mode = fs::metadata(store.record_path(RecordKind::Decision, "d1"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    fn list_ids_skips_tmp_orphans() {
        let (_dir, store) = open();
        store.put_bytes(RecordKind::Handoff, "h2", b"{}").expect("put");
        store.put_bytes(RecordKind::Handoff, "h1", b"{}").expect("put");
        // Simulate a crash between write and rename.
        fs::write(
            store.root().join("handoffs").join("h3.json.tmp"),
            b"CRASH - INCOMPLETE WRITE",
        )
        .unwrap();
        assert_eq!(store.list_ids(RecordKind::Handoff).unwrap(), vec!["h1", "h2"]);
    }

    #[test]
    fn narrative_survives_reopen() {
        let (dir, store) = open();
        let project = ProjectId::from("p1");
        store
            .append_narrative(&NarrativeEntry {
                project_id: project.clone(),
                timestamp: Utc::now(),
                author: "orchestrator".into(),
                text: "started".into(),
            })
            .expect("append");
        drop(store);

        let reopened = FsStore::open(dir.path().join("store")).expect("reopen");
        let entries: Vec<_> = reopened
            .read_narrative(&project)
            .expect("read")
            .collect::<Result<_, _>>()
            .expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "started");
    }

    #[test]
    fn corrupt_narrative_line_is_reported() {
        let (_dir, store) = open();
        let project = ProjectId::from("p1");
        fs::write(store.narrative_path(&project), b"{not json}\n").unwrap();
        let mut iter = store.read_narrative(&project).expect("read");
        assert!(matches!(iter.next(), Some(Err(StoreError::Json(_)))));
    }
}

//! Record Store behaviour shared by both backends: immutability, byte-exact
//! readback, referential integrity, the narrative stream, and bounded retry
//! under concurrent membership updates.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::Utc;
use rstest::rstest;
use spine_core::{
    store::digest, AgentName, Artifact, ArtifactType, FsStore, Handoff, HandoffId, MemoryStore,
    NarrativeIter, Project, ProjectId, PutOutcome, RecordKind, RecordStore, RetryPolicy, Spine,
    StoreError,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

enum Backend {
    Fs,
    Memory,
}

struct Fixture {
    _dir: Option<TempDir>,
    store: Arc<dyn RecordStore>,
}

fn fixture(backend: Backend) -> Fixture {
    match backend {
        Backend::Fs => {
            let dir = TempDir::new().expect("tempdir");
            let store = FsStore::open(dir.path().join("spine")).expect("open");
            Fixture {
                _dir: Some(dir),
                store: Arc::new(store),
            }
        }
        Backend::Memory => Fixture {
            _dir: None,
            store: Arc::new(MemoryStore::new()),
        },
    }
}

fn handoff(project: &ProjectId, summary: &str) -> Handoff {
    Handoff {
        id: HandoffId::generate(),
        from_agent: AgentName::from("builder"),
        to_agent: Some(AgentName::from("guardian")),
        project_id: project.clone(),
        summary: summary.to_owned(),
        artifacts: vec![],
        open_questions: vec!["is the retry cap right?".into()],
        assumptions: vec![],
        recommendations: vec!["review".into()],
        narrative_note: "over to you".into(),
        timestamp: Utc::now(),
        parent_task_id: None,
    }
}

fn new_project(spine: &Spine) -> Project {
    let project = Project::new("atlas", "map every service");
    spine.create_project(&project).expect("create project");
    project
}

// ---------------------------------------------------------------------------
// 1. Immutability
// ---------------------------------------------------------------------------

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn same_id_different_content_conflicts(#[case] backend: Backend) {
    let fx = fixture(backend);
    let spine = Spine::new(fx.store.clone());
    let project = new_project(&spine);

    let original = handoff(&project.id, "first");
    spine.put(&original).expect("put");

    let mut changed = original.clone();
    changed.summary = "rewritten".into();
    let err = spine.put(&changed).unwrap_err();
    assert!(matches!(err, StoreError::Conflict { kind: RecordKind::Handoff, .. }), "got: {err}");

    let stored: Handoff = spine.get(original.id.as_str()).expect("get");
    assert_eq!(stored, original);
}

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn readback_is_byte_identical(#[case] backend: Backend) {
    let fx = fixture(backend);
    let spine = Spine::new(fx.store.clone());
    let project = new_project(&spine);
    let h = handoff(&project.id, "first");

    let bytes = spine_core::store::encode(&h).expect("encode");
    assert_eq!(
        fx.store.put_bytes(RecordKind::Handoff, h.id.as_str(), &bytes).unwrap(),
        PutOutcome::Created
    );
    assert_eq!(
        fx.store.put_bytes(RecordKind::Handoff, h.id.as_str(), &bytes).unwrap(),
        PutOutcome::Unchanged
    );
    let read = fx.store.get_bytes(RecordKind::Handoff, h.id.as_str()).unwrap();
    assert_eq!(read, bytes);
    assert_eq!(digest(&read), digest(&bytes));
}

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn missing_record_is_not_found(#[case] backend: Backend) {
    let fx = fixture(backend);
    let spine = Spine::new(fx.store.clone());
    let err = spine.get::<Artifact>("nope").unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: RecordKind::Artifact, .. }));
    assert!(err.to_string().contains("artifact 'nope' not found"));
}

// ---------------------------------------------------------------------------
// 2. Referential integrity
// ---------------------------------------------------------------------------

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn handoff_is_listed_after_persistence(#[case] backend: Backend) {
    let fx = fixture(backend);
    let spine = Spine::new(fx.store.clone());
    let project = new_project(&spine);

    let h1 = handoff(&project.id, "one");
    let h2 = handoff(&project.id, "two");
    spine.record_owned(&h1).expect("h1");
    let after = spine.record_owned(&h2).expect("h2");

    assert_eq!(after.handoffs, vec![h1.id.clone(), h2.id.clone()]);
    assert!(after.updated_at > project.updated_at);

    let listed: Vec<Handoff> = spine.list_by_project(&project.id).expect("list");
    assert_eq!(listed, vec![h1, h2]);
}

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn unlinked_record_is_invisible_to_project_listing(#[case] backend: Backend) {
    let fx = fixture(backend);
    let spine = Spine::new(fx.store.clone());
    let project = new_project(&spine);

    // Stored but never linked, as after exhausted retries.
    let orphan = Artifact::new(project.id.clone(), ArtifactType::Code, "orphan");
    spine.put(&orphan).expect("put");

    let listed: Vec<Artifact> = spine.list_by_project(&project.id).expect("list");
    assert!(listed.is_empty());
}

// ---------------------------------------------------------------------------
// 3. Narrative
// ---------------------------------------------------------------------------

fn texts(iter: NarrativeIter) -> Vec<String> {
    iter.map(|e| e.expect("entry").text).collect()
}

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn narrative_is_ordered_and_restartable(#[case] backend: Backend) {
    let fx = fixture(backend);
    let spine = Spine::new(fx.store.clone());
    let project = ProjectId::from("p-narrative");

    for line in ["initiated", "architect → scribe: design ready", "scribe: done"] {
        spine
            .append_narrative(&project, line, "orchestrator", Utc::now())
            .expect("append");
    }

    let mut first = spine.read_narrative(&project).expect("read");
    assert_eq!(first.next().expect("one").expect("entry").text, "initiated");

    let again = texts(spine.read_narrative(&project).expect("reread"));
    assert_eq!(again, vec!["initiated", "architect → scribe: design ready", "scribe: done"]);

    let other = texts(spine.read_narrative(&ProjectId::from("p-other")).expect("read"));
    assert!(other.is_empty());
}

// ---------------------------------------------------------------------------
// 4. Bounded retry
// ---------------------------------------------------------------------------

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn narrative_rejects_path_like_project_ids(#[case] backend: Backend) {
    let fx = fixture(backend);
    for bad in ["a/b", "..", "x.tmp"] {
        let spine = Spine::new(fx.store.clone());
        let err = spine
            .append_narrative(&ProjectId::from(bad), "text", "operator", Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(ref id) if id == bad), "got: {err}");
        assert!(matches!(
            fx.store.read_narrative(&ProjectId::from(bad)),
            Err(StoreError::InvalidId(_))
        ));
    }
}

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn concurrent_handoffs_land_exactly_once(#[case] backend: Backend) {
    const N: usize = 8;
    let fx = fixture(backend);
    // A writer can lose at most N-1 races, so N attempts always suffice.
    let spine = Arc::new(Spine::new(fx.store.clone()).with_retry(RetryPolicy::immediate(N as u32)));
    let project = new_project(&spine);

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let spine = spine.clone();
            let h = handoff(&project.id, &format!("writer {i}"));
            thread::spawn(move || spine.record_owned(&h).map(|_| h.id))
        })
        .collect();

    let mut ids: Vec<HandoffId> = handles
        .into_iter()
        .map(|h| h.join().expect("join").expect("record"))
        .collect();

    let stored = spine.get_project(&project.id).expect("project");
    assert_eq!(stored.handoffs.len(), N);
    let mut listed = stored.handoffs.clone();
    listed.sort();
    listed.dedup();
    assert_eq!(listed.len(), N, "no duplicates");
    ids.sort();
    assert_eq!(listed, ids, "no lost writes");
}

#[rstest]
#[case::fs(Backend::Fs)]
#[case::memory(Backend::Memory)]
fn concurrent_handoffs_with_tight_cap_never_lose_or_duplicate(#[case] backend: Backend) {
    const N: usize = 12;
    let fx = fixture(backend);
    let spine = Arc::new(Spine::new(fx.store.clone()).with_retry(RetryPolicy::immediate(2)));
    let project = new_project(&spine);

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let spine = spine.clone();
            let h = handoff(&project.id, &format!("writer {i}"));
            thread::spawn(move || (h.id.clone(), spine.record_owned(&h)))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().expect("join")).collect();
    let stored = spine.get_project(&project.id).expect("project");

    let mut succeeded = 0;
    for (id, result) in results {
        match result {
            Ok(_) => {
                succeeded += 1;
                assert!(stored.handoffs.contains(&id), "lost write for {id}");
            }
            Err(err) => {
                assert!(err.is_stale(), "only stale writes may surface, got {err}");
                assert!(!stored.handoffs.contains(&id));
            }
        }
    }
    assert_eq!(stored.handoffs.len(), succeeded);
}

/// Wraps a store so every project replacement reports a stale write.
struct AlwaysStale {
    inner: MemoryStore,
    replaces: AtomicU32,
}

impl RecordStore for AlwaysStale {
    fn put_bytes(&self, kind: RecordKind, id: &str, bytes: &[u8]) -> Result<PutOutcome, StoreError> {
        self.inner.put_bytes(kind, id, bytes)
    }
    fn get_bytes(&self, kind: RecordKind, id: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.get_bytes(kind, id)
    }
    fn replace_bytes(&self, kind: RecordKind, id: &str, _: &str, _: &[u8]) -> Result<(), StoreError> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::StaleWrite {
            kind,
            id: id.to_owned(),
        })
    }
    fn list_ids(&self, kind: RecordKind) -> Result<Vec<String>, StoreError> {
        self.inner.list_ids(kind)
    }
    fn append_narrative(&self, entry: &spine_core::NarrativeEntry) -> Result<(), StoreError> {
        self.inner.append_narrative(entry)
    }
    fn read_narrative(&self, project_id: &ProjectId) -> Result<NarrativeIter, StoreError> {
        self.inner.read_narrative(project_id)
    }
}

#[test]
fn stale_write_surfaces_after_retry_cap() {
    let store = Arc::new(AlwaysStale {
        inner: MemoryStore::new(),
        replaces: AtomicU32::new(0),
    });
    let spine = Spine::new(store.clone()).with_retry(RetryPolicy::immediate(5));
    let project = new_project(&spine);

    let err = spine.record_owned(&handoff(&project.id, "doomed")).unwrap_err();
    assert!(err.is_stale());
    assert_eq!(store.replaces.load(Ordering::SeqCst), 5);
    assert!(spine.get_project(&project.id).unwrap().handoffs.is_empty());
}

//! Project context handed to the reasoning capability.

use serde::Serialize;
use spine_core::{
    Artifact, ContextRef, Decision, Handoff, Project, Spine, StoreError, Task,
};

/// The project plus every record a task's `context_refs` resolve to.
///
/// References to ids that are not in the store are listed in `missing_refs`
/// instead of failing the invocation. Unrecognised reference forms are passed
/// through in `other_refs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectContext {
    pub project: Project,
    pub artifacts: Vec<Artifact>,
    pub handoffs: Vec<Handoff>,
    pub decisions: Vec<Decision>,
    pub other_refs: Vec<String>,
    pub missing_refs: Vec<String>,
}

impl ProjectContext {
    /// Blocking; read-only.
    pub fn gather(spine: &Spine, task: &Task) -> Result<Self, StoreError> {
        let project = spine.get_project(&task.project_id)?;
        let mut context = Self {
            project,
            artifacts: vec![],
            handoffs: vec![],
            decisions: vec![],
            other_refs: vec![],
            missing_refs: vec![],
        };

        for raw in &task.context_refs {
            let resolved = match ContextRef::parse(raw) {
                ContextRef::Artifact(id) => spine
                    .get::<Artifact>(id.as_str())
                    .map(|a| context.artifacts.push(a)),
                ContextRef::Handoff(id) => spine
                    .get::<Handoff>(id.as_str())
                    .map(|h| context.handoffs.push(h)),
                ContextRef::Decision(id) => spine
                    .get::<Decision>(id.as_str())
                    .map(|d| context.decisions.push(d)),
                ContextRef::Opaque(other) => {
                    context.other_refs.push(other);
                    Ok(())
                }
            };
            match resolved {
                Ok(()) => {}
                Err(err) if err.is_not_found() => context.missing_refs.push(raw.clone()),
                Err(err) => return Err(err),
            }
        }
        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spine_core::{ArtifactType, MemoryStore, ProjectId};
    use std::sync::Arc;

    #[test]
    fn refs_resolve_or_are_reported_missing() {
        let spine = Spine::new(Arc::new(MemoryStore::new()));
        let project = Project::new("p", "m");
        spine.create_project(&project).unwrap();
        let artifact = Artifact::new(project.id.clone(), ArtifactType::Spec, "spec");
        spine.record_owned(&artifact).unwrap();

        let task = Task::new(project.id.clone(), "go")
            .with_context_ref(artifact.reference())
            .with_context_ref(format!("artifact://{}", artifact.id))
            .with_context_ref("handoff:gone")
            .with_context_ref("https://example.org/brief");
        let context = ProjectContext::gather(&spine, &task).unwrap();

        assert_eq!(context.project.id, project.id);
        assert_eq!(context.artifacts.len(), 2);
        assert_eq!(context.missing_refs, vec!["handoff:gone".to_owned()]);
        assert_eq!(context.other_refs, vec!["https://example.org/brief".to_owned()]);
    }

    #[test]
    fn unknown_project_is_an_error() {
        let spine = Spine::new(Arc::new(MemoryStore::new()));
        let task = Task::new(ProjectId::from("ghost"), "go");
        assert!(ProjectContext::gather(&spine, &task).unwrap_err().is_not_found());
    }
}

//! Record kinds and the traits tying domain types to the store.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{AgentContract, Artifact, Decision, Handoff, Project, ProjectId};

/// The five addressable entity kinds of the Knowledge Spine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Project,
    Artifact,
    Decision,
    Handoff,
    AgentContract,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Project,
        RecordKind::Artifact,
        RecordKind::Decision,
        RecordKind::Handoff,
        RecordKind::AgentContract,
    ];

    /// Directory name used by file-backed stores.
    pub fn dir_name(self) -> &'static str {
        match self {
            RecordKind::Project => "projects",
            RecordKind::Artifact => "artifacts",
            RecordKind::Decision => "decisions",
            RecordKind::Handoff => "handoffs",
            RecordKind::AgentContract => "agents",
        }
    }

    /// Only projects may be replaced, and only through an optimistic check.
    pub fn is_mutable(self) -> bool {
        matches!(self, RecordKind::Project)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RecordKind::Project => "project",
            RecordKind::Artifact => "artifact",
            RecordKind::Decision => "decision",
            RecordKind::Handoff => "handoff",
            RecordKind::AgentContract => "agent contract",
        };
        f.write_str(label)
    }
}

/// A domain type stored as one addressable record per `(kind, id)`.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: RecordKind;

    fn record_id(&self) -> &str;
}

/// A record whose id is listed in its owning project's membership.
pub trait Owned: Record {
    fn owner(&self) -> &ProjectId;

    /// Append this record's id to the matching project list.
    /// Returns `false` when it was already present.
    fn link(&self, project: &mut Project) -> bool;

    /// The ids of this kind that `project` lists, in order.
    fn members(project: &Project) -> Vec<&str>;
}

fn push_unique<T: PartialEq + Clone>(list: &mut Vec<T>, id: &T) -> bool {
    if list.contains(id) {
        return false;
    }
    list.push(id.clone());
    true
}

impl Record for Project {
    const KIND: RecordKind = RecordKind::Project;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Record for AgentContract {
    const KIND: RecordKind = RecordKind::AgentContract;

    fn record_id(&self) -> &str {
        self.agent_name.as_str()
    }
}

impl Record for Artifact {
    const KIND: RecordKind = RecordKind::Artifact;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Owned for Artifact {
    fn owner(&self) -> &ProjectId {
        &self.project_id
    }

    fn link(&self, project: &mut Project) -> bool {
        push_unique(&mut project.artifacts, &self.id)
    }

    fn members(project: &Project) -> Vec<&str> {
        project.artifacts.iter().map(|id| id.as_str()).collect()
    }
}

impl Record for Decision {
    const KIND: RecordKind = RecordKind::Decision;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Owned for Decision {
    fn owner(&self) -> &ProjectId {
        &self.project_id
    }

    fn link(&self, project: &mut Project) -> bool {
        push_unique(&mut project.decisions, &self.id)
    }

    fn members(project: &Project) -> Vec<&str> {
        project.decisions.iter().map(|id| id.as_str()).collect()
    }
}

impl Record for Handoff {
    const KIND: RecordKind = RecordKind::Handoff;

    fn record_id(&self) -> &str {
        self.id.as_str()
    }
}

impl Owned for Handoff {
    fn owner(&self) -> &ProjectId {
        &self.project_id
    }

    fn link(&self, project: &mut Project) -> bool {
        push_unique(&mut project.handoffs, &self.id)
    }

    fn members(project: &Project) -> Vec<&str> {
        project.handoffs.iter().map(|id| id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArtifactType;

    #[test]
    fn link_is_idempotent() {
        let mut project = Project::new("p", "m");
        let artifact = Artifact::new(project.id.clone(), ArtifactType::Spec, "x");
        assert!(artifact.link(&mut project));
        assert!(!artifact.link(&mut project));
        assert_eq!(Artifact::members(&project), vec![artifact.id.as_str()]);
    }

    #[test]
    fn only_projects_are_mutable() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.is_mutable(), kind == RecordKind::Project);
        }
        assert_eq!(RecordKind::AgentContract.dir_name(), "agents");
    }
}

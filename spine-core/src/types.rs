//! Domain types for the Knowledge Spine.
//!
//! Identifiers are opaque strings (UUID v4 when generated here). Timestamps are
//! `DateTime<Utc>` and serialize as RFC 3339. Free-form metadata is a
//! `BTreeMap` so serialized records are byte-stable across writes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UnknownTag;

/// Free-form metadata attached to projects, tasks and artifacts.
pub type Metadata = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

macro_rules! string_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

macro_rules! generated_id {
    ($($name:ident),+) => {
        $(
            impl $name {
                /// A fresh random identifier.
                pub fn generate() -> Self {
                    Self(Uuid::new_v4().to_string())
                }
            }
        )+
    };
}

string_newtype!(
    /// Identifier of a [`Project`].
    ProjectId
);
string_newtype!(
    /// Identifier of an [`Artifact`].
    ArtifactId
);
string_newtype!(
    /// Identifier of a [`Decision`].
    DecisionId
);
string_newtype!(
    /// Identifier of a [`Handoff`].
    HandoffId
);
string_newtype!(
    /// Identifier of a [`Task`].
    TaskId
);
string_newtype!(
    /// Unique name of a registered agent (`architect`, `scribe`, ...).
    AgentName
);

generated_id!(ProjectId, ArtifactId, DecisionId, HandoffId, TaskId);

// ---------------------------------------------------------------------------
// Enumerated tags
// ---------------------------------------------------------------------------

macro_rules! tag_enum {
    (
        $(#[$doc:meta])*
        $name:ident, $label:literal {
            $($(#[$vdoc:meta])* $variant:ident => $tag:literal),+ $(,)?
        }
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vdoc])* #[serde(rename = $tag)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownTag;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| UnknownTag {
                        kind: $label,
                        value: s.to_owned(),
                    })
            }
        }
    };
}

tag_enum!(
    /// Caller-driven lifecycle of a project. Never inferred.
    ProjectStatus, "project status" {
        Active => "active",
        Paused => "paused",
        Completed => "completed",
    }
);

tag_enum!(
    /// Task priority.
    Priority, "priority" {
        Normal => "normal",
        High => "high",
        Critical => "critical",
    }
);

tag_enum!(
    /// Impact of a recorded decision.
    Impact, "impact" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
);

tag_enum!(
    /// What kind of output a task expects.
    OutputType, "output type" {
        Spec => "spec",
        Code => "code",
        Diagram => "diagram",
        HandoffPacket => "handoff_packet",
        Summary => "summary",
        Chat => "chat",
    }
);

tag_enum!(
    /// Kind of stored artifact.
    ArtifactType, "artifact type" {
        Spec => "spec",
        Code => "code",
        Document => "document",
        Diagram => "diagram",
        Data => "data",
        Review => "review",
        Summary => "summary",
    }
);

impl Default for ProjectStatus {
    fn default() -> Self {
        ProjectStatus::Active
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Default for Impact {
    fn default() -> Self {
        Impact::Medium
    }
}

// ---------------------------------------------------------------------------
// Context references
// ---------------------------------------------------------------------------

/// A parsed entry of [`Task::context_refs`].
///
/// Accepts `artifact:<id>`, `handoff:<id>`, `decision:<id>` and the
/// `artifact://<id>` spelling. Anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextRef {
    Artifact(ArtifactId),
    Handoff(HandoffId),
    Decision(DecisionId),
    Opaque(String),
}

impl ContextRef {
    pub fn parse(raw: &str) -> Self {
        let Some((scheme, rest)) = raw.split_once(':') else {
            return ContextRef::Opaque(raw.to_owned());
        };
        let id = rest.trim_start_matches("//");
        if id.is_empty() {
            return ContextRef::Opaque(raw.to_owned());
        }
        match scheme {
            "artifact" => ContextRef::Artifact(ArtifactId::from(id)),
            "handoff" => ContextRef::Handoff(HandoffId::from(id)),
            "decision" => ContextRef::Decision(DecisionId::from(id)),
            _ => ContextRef::Opaque(raw.to_owned()),
        }
    }
}

impl fmt::Display for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextRef::Artifact(id) => write!(f, "artifact:{id}"),
            ContextRef::Handoff(id) => write!(f, "handoff:{id}"),
            ContextRef::Decision(id) => write!(f, "decision:{id}"),
            ContextRef::Opaque(raw) => f.write_str(raw),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A unit of work with a mission. Owns the membership lists of its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub mission: String,
    #[serde(default)]
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactId>,
    #[serde(default)]
    pub decisions: Vec<DecisionId>,
    #[serde(default)]
    pub handoffs: Vec<HandoffId>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Project {
    pub fn new(name: impl Into<String>, mission: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ProjectId::generate(),
            name: name.into(),
            mission: mission.into(),
            status: ProjectStatus::Active,
            created_at: now,
            updated_at: now,
            artifacts: vec![],
            decisions: vec![],
            handoffs: vec![],
            metadata: Metadata::new(),
        }
    }

    /// First narrative line of every project.
    pub fn initiated_note(&self) -> String {
        format!("Project '{}' initiated. Mission: {}", self.name, self.mission)
    }
}

/// A unit of requested work. Ephemeral; traceable through
/// [`Handoff::parent_task_id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub origin: String,
    pub project_id: ProjectId,
    #[serde(default)]
    pub context_refs: Vec<String>,
    pub instruction: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub expected_output_type: Option<OutputType>,
    #[serde(default)]
    pub downstream_agent: Option<AgentName>,
    #[serde(default)]
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Task {
    pub fn new(project_id: ProjectId, instruction: impl Into<String>) -> Self {
        Self {
            id: TaskId::generate(),
            origin: "orchestrator".to_owned(),
            project_id,
            context_refs: vec![],
            instruction: instruction.into(),
            constraints: vec![],
            expected_output_type: None,
            downstream_agent: None,
            priority: Priority::Normal,
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_output_type(mut self, output: OutputType) -> Self {
        self.expected_output_type = Some(output);
        self
    }

    pub fn with_downstream_agent(mut self, agent: impl Into<AgentName>) -> Self {
        self.downstream_agent = Some(agent.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_context_ref(mut self, reference: impl Into<String>) -> Self {
        self.context_refs.push(reference.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }
}

/// The unit of transfer between two agents. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handoff {
    pub id: HandoffId,
    pub from_agent: AgentName,
    /// `None` marks the end of a chain.
    pub to_agent: Option<AgentName>,
    pub project_id: ProjectId,
    pub summary: String,
    /// Artifact references, `artifact:<id>`.
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub open_questions: Vec<String>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub narrative_note: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub parent_task_id: Option<TaskId>,
}

impl Handoff {
    pub fn is_terminal(&self) -> bool {
        self.to_agent.is_none()
    }
}

/// Audit record of a choice made during execution. Immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub project_id: ProjectId,
    pub context: String,
    #[serde(default)]
    pub options_considered: Vec<String>,
    pub chosen_option: String,
    #[serde(default)]
    pub rationale: String,
    pub author: AgentName,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default = "default_reversible")]
    pub reversible: bool,
}

fn default_reversible() -> bool {
    true
}

impl Decision {
    pub fn new(
        project_id: ProjectId,
        author: AgentName,
        context: impl Into<String>,
        chosen_option: impl Into<String>,
    ) -> Self {
        Self {
            id: DecisionId::generate(),
            project_id,
            context: context.into(),
            options_considered: vec![],
            chosen_option: chosen_option.into(),
            rationale: String::new(),
            author,
            timestamp: Utc::now(),
            impact: Impact::Medium,
            reversible: true,
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options_considered = options;
        self
    }

    pub fn with_impact(mut self, impact: Impact) -> Self {
        self.impact = impact;
        self
    }

    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }
}

/// A stored output. A new version is a new artifact id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub project_id: ProjectId,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    /// Inline text, or a reference to an external blob.
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Artifact {
    pub fn new(project_id: ProjectId, artifact_type: ArtifactType, content: impl Into<String>) -> Self {
        Self {
            id: ArtifactId::generate(),
            project_id,
            artifact_type,
            content: content.into(),
            created_at: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    /// The `artifact:<id>` form carried in handoffs and context refs.
    pub fn reference(&self) -> String {
        ContextRef::Artifact(self.id.clone()).to_string()
    }
}

/// Static capability declaration of an agent role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentContract {
    pub agent_name: AgentName,
    pub role: String,
    pub primary_focus: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub preferred_input_type: Vec<String>,
    #[serde(default)]
    pub output_type: Vec<String>,
    #[serde(default)]
    pub upstream_agents: Vec<AgentName>,
    #[serde(default)]
    pub downstream_agents: Vec<AgentName>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl AgentContract {
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }

    pub fn allows_downstream(&self, agent: &AgentName) -> bool {
        self.downstream_agents.contains(agent)
    }
}

/// One line of a project's append-only narrative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeEntry {
    pub project_id: ProjectId,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

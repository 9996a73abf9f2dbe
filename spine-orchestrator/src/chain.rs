//! Task states, chain reports, and the rules that connect one handoff to the
//! next task.

use std::fmt;

use serde::Serialize;
use spine_core::{AgentName, Handoff, HandoffId, ProjectId, Task, TaskId};
use spine_router::RouteRule;

/// Author of narrative entries and decisions written by the control loop itself.
pub const ORCHESTRATOR: &str = "orchestrator";

/// Prefix of the recommendation with which a veto-capable agent stops a chain.
pub const BLOCK_DIRECTIVE: &str = "BLOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Submitted,
    Routed,
    Executing,
    HandedOff,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskState::Submitted => "SUBMITTED",
            TaskState::Routed => "ROUTED",
            TaskState::Executing => "EXECUTING",
            TaskState::HandedOff => "HANDED_OFF",
            TaskState::Failed => "FAILED",
        })
    }
}

/// One task of a chain that reached `HANDED_OFF`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainStep {
    pub task_id: TaskId,
    pub agent: AgentName,
    pub route: RouteRule,
    pub state: TaskState,
    pub handoff_id: HandoffId,
    pub to_agent: Option<AgentName>,
}

/// Why a chain stopped without error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "end", rename_all = "snake_case")]
pub enum ChainEnd {
    /// The last handoff had no downstream agent.
    Terminal,
    /// A veto-capable agent issued the block directive.
    Blocked { by: AgentName, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainReport {
    pub root_task: TaskId,
    pub project_id: ProjectId,
    pub steps: Vec<ChainStep>,
    pub end: ChainEnd,
}

impl ChainReport {
    pub fn agents(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.agent.as_str()).collect()
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.end, ChainEnd::Blocked { .. })
    }
}

/// The block reason, if any recommendation is the block directive
/// (`BLOCK` alone, or `BLOCK: reason`).
pub fn block_reason(handoff: &Handoff) -> Option<String> {
    handoff.recommendations.iter().find_map(|rec| {
        let rec = rec.trim();
        let rest = rec.strip_prefix(BLOCK_DIRECTIVE)?;
        if rest.is_empty() {
            return Some(handoff.summary.clone());
        }
        let reason = rest.strip_prefix(':')?.trim();
        Some(if reason.is_empty() {
            handoff.summary.clone()
        } else {
            reason.to_owned()
        })
    })
}

/// Narrative line for a persisted handoff: `from → to: summary`.
pub fn handoff_line(handoff: &Handoff) -> String {
    let to = handoff.to_agent.as_ref().map_or("(end)", AgentName::as_str);
    format!("{} → {}: {}", handoff.from_agent, to, handoff.summary)
}

/// The task that continues `parent`'s lineage after `handoff`, or `None` for
/// a terminal handoff. `depth` is the number of handoffs in the lineage so far.
pub fn derive_task(parent: &Task, handoff: &Handoff, depth: usize) -> Option<Task> {
    let to_agent = handoff.to_agent.clone()?;

    let mut instruction = if handoff.narrative_note.trim().is_empty() {
        handoff.summary.clone()
    } else {
        handoff.narrative_note.clone()
    };
    if !handoff.recommendations.is_empty() {
        instruction.push_str("\n\nRecommendations:");
        for rec in &handoff.recommendations {
            instruction.push_str("\n- ");
            instruction.push_str(rec);
        }
    }
    if !handoff.open_questions.is_empty() {
        instruction.push_str("\n\nOpen questions:");
        for q in &handoff.open_questions {
            instruction.push_str("\n- ");
            instruction.push_str(q);
        }
    }

    let mut context_refs = parent.context_refs.clone();
    let handoff_ref = format!("handoff:{}", handoff.id);
    for reference in handoff.artifacts.iter().chain(std::iter::once(&handoff_ref)) {
        if !context_refs.contains(reference) {
            context_refs.push(reference.clone());
        }
    }

    let mut metadata = parent.metadata.clone();
    metadata.remove("requested_agent");
    metadata
        .entry("root_task".to_owned())
        .or_insert_with(|| parent.id.as_str().into());
    metadata.insert("parent_task".into(), parent.id.as_str().into());
    metadata.insert("parent_handoff".into(), handoff.id.as_str().into());
    metadata.insert("chain_depth".into(), depth.into());

    Some(Task {
        id: TaskId::generate(),
        origin: handoff.from_agent.as_str().to_owned(),
        project_id: parent.project_id.clone(),
        context_refs,
        instruction,
        constraints: parent.constraints.clone(),
        expected_output_type: None,
        downstream_agent: Some(to_agent),
        priority: parent.priority,
        timestamp: handoff.timestamp,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use spine_core::Priority;

    fn handoff(to: Option<&str>, recommendations: &[&str]) -> Handoff {
        Handoff {
            id: HandoffId::generate(),
            from_agent: AgentName::from("builder"),
            to_agent: to.map(AgentName::from),
            project_id: ProjectId::from("p"),
            summary: "built the token service".into(),
            artifacts: vec!["artifact:a1".into()],
            open_questions: vec!["rotate keys?".into()],
            assumptions: vec![],
            recommendations: recommendations.iter().map(|r| (*r).to_owned()).collect(),
            narrative_note: String::new(),
            timestamp: Utc::now(),
            parent_task_id: None,
        }
    }

    #[test]
    fn block_directive_forms() {
        assert_eq!(block_reason(&handoff(None, &["BLOCK: leaks secrets"])).as_deref(), Some("leaks secrets"));
        assert_eq!(
            block_reason(&handoff(None, &["  BLOCK  "])).as_deref(),
            Some("built the token service")
        );
        assert!(block_reason(&handoff(None, &["BLOCKING issue in review"])).is_none());
        assert!(block_reason(&handoff(None, &["do not BLOCK"])).is_none());
        assert!(block_reason(&handoff(None, &["block: lower case"])).is_none());
    }

    #[test]
    fn terminal_handoff_derives_nothing() {
        let parent = Task::new(ProjectId::from("p"), "x");
        assert!(derive_task(&parent, &handoff(None, &[]), 1).is_none());
    }

    #[test]
    fn derived_task_carries_lineage() {
        let parent = Task::new(ProjectId::from("p"), "x")
            .with_priority(Priority::High)
            .with_constraint("no network")
            .with_context_ref("artifact:a1");
        let h = handoff(Some("guardian"), &["review the retry cap"]);
        let next = derive_task(&parent, &h, 2).unwrap();

        assert_eq!(next.origin, "builder");
        assert_eq!(next.downstream_agent.as_ref().map(AgentName::as_str), Some("guardian"));
        assert_eq!(next.priority, Priority::High);
        assert_eq!(next.constraints, vec!["no network".to_owned()]);
        assert_eq!(next.context_refs, vec!["artifact:a1".to_owned(), format!("handoff:{}", h.id)]);
        assert!(next.instruction.starts_with("built the token service"));
        assert!(next.instruction.contains("- review the retry cap"));
        assert!(next.instruction.contains("- rotate keys?"));
        assert_eq!(next.metadata["parent_task"], parent.id.as_str());
        assert_eq!(next.metadata["root_task"], parent.id.as_str());
        assert_eq!(next.metadata["chain_depth"], 2);
    }

    #[test]
    fn handoff_line_names_both_ends() {
        assert_eq!(
            handoff_line(&handoff(Some("guardian"), &[])),
            "builder → guardian: built the token service"
        );
        assert_eq!(handoff_line(&handoff(None, &[])), "builder → (end): built the token service");
    }
}

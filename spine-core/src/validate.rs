//! Structural validation of tasks and handoffs.
//!
//! Checks that need the store (does the project exist?) belong to the
//! orchestrator; everything here is pure.

use crate::contracts::ContractRegistry;
use crate::error::ValidationError;
use crate::store::check_id;
use crate::types::{Handoff, Task};

/// Parse a task from JSON. Unknown enum tags (`expected_output_type`,
/// `priority`) are rejected here.
pub fn parse_task(json: &str) -> Result<Task, ValidationError> {
    let task: Task = serde_json::from_str(json)?;
    validate_task(&task)?;
    Ok(task)
}

pub fn validate_task(task: &Task) -> Result<(), ValidationError> {
    if task.id.as_str().trim().is_empty() {
        return Err(ValidationError::MissingField("id"));
    }
    if task.project_id.as_str().trim().is_empty() {
        return Err(ValidationError::MissingField("project_id"));
    }
    if check_id(task.project_id.as_str()).is_err() {
        return Err(ValidationError::Invalid {
            field: "project_id",
            reason: format!("'{}' is not a usable record id", task.project_id),
        });
    }
    if task.origin.trim().is_empty() {
        return Err(ValidationError::MissingField("origin"));
    }
    if task.instruction.trim().is_empty() {
        return Err(ValidationError::MissingField("instruction"));
    }
    if let Some(agent) = &task.downstream_agent {
        if agent.as_str().trim().is_empty() {
            return Err(ValidationError::Invalid {
                field: "downstream_agent",
                reason: "must not be blank when present".into(),
            });
        }
    }
    if task.context_refs.iter().any(|r| r.trim().is_empty()) {
        return Err(ValidationError::Invalid {
            field: "context_refs",
            reason: "references must not be blank".into(),
        });
    }
    Ok(())
}

/// `from_agent` must be registered; `to_agent`, if present, too.
pub fn validate_handoff(handoff: &Handoff, registry: &ContractRegistry) -> Result<(), ValidationError> {
    if !registry.contains(&handoff.from_agent) {
        return Err(ValidationError::UnregisteredAgent {
            field: "from_agent",
            agent: handoff.from_agent.clone(),
        });
    }
    if let Some(to) = &handoff.to_agent {
        if !registry.contains(to) {
            return Err(ValidationError::UnregisteredAgent {
                field: "to_agent",
                agent: to.clone(),
            });
        }
    }
    if handoff.summary.trim().is_empty() {
        return Err(ValidationError::MissingField("summary"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentName, HandoffId, ProjectId};
    use chrono::Utc;
    use rstest::rstest;

    fn handoff(from: &str, to: Option<&str>) -> Handoff {
        Handoff {
            id: HandoffId::generate(),
            from_agent: AgentName::from(from),
            to_agent: to.map(AgentName::from),
            project_id: ProjectId::from("p"),
            summary: "done".into(),
            artifacts: vec![],
            open_questions: vec![],
            assumptions: vec![],
            recommendations: vec![],
            narrative_note: String::new(),
            timestamp: Utc::now(),
            parent_task_id: None,
        }
    }

    #[test]
    fn unknown_output_type_is_malformed() {
        let json = r#"{"id":"t","origin":"human","project_id":"p","instruction":"x",
            "expected_output_type":"poem","timestamp":"2026-01-01T00:00:00Z"}"#;
        assert!(matches!(parse_task(json), Err(ValidationError::Malformed(_))));
    }

    #[test]
    fn blank_instruction_is_missing() {
        let json = r#"{"id":"t","origin":"human","project_id":"p","instruction":"  ",
            "timestamp":"2026-01-01T00:00:00Z"}"#;
        assert!(matches!(
            parse_task(json),
            Err(ValidationError::MissingField("instruction"))
        ));
    }

    #[test]
    fn valid_task_parses() {
        let json = r#"{"id":"t","origin":"human","project_id":"p","instruction":"build it",
            "expected_output_type":"code","priority":"high","timestamp":"2026-01-01T00:00:00Z"}"#;
        let task = parse_task(json).unwrap();
        assert_eq!(task.instruction, "build it");
    }

    #[rstest]
    #[case("a/b")]
    #[case("..")]
    #[case("x.tmp")]
    fn path_like_project_id_is_invalid(#[case] project_id: &str) {
        let task = Task::new(ProjectId::from(project_id), "design it");
        assert!(matches!(
            validate_task(&task),
            Err(ValidationError::Invalid { field: "project_id", .. })
        ));
    }

    #[rstest]
    #[case("builder", Some("guardian"), true)]
    #[case("builder", None, true)]
    #[case("ghost", Some("scribe"), false)]
    #[case("builder", Some("ghost"), false)]
    fn handoff_agents_must_be_registered(
        #[case] from: &str,
        #[case] to: Option<&str>,
        #[case] ok: bool,
    ) {
        let registry = ContractRegistry::builtin();
        assert_eq!(validate_handoff(&handoff(from, to), &registry).is_ok(), ok);
    }
}

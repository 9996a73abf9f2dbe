//! Agent Invocation Shim.
//!
//! One `AgentShim` per registered agent, all the same type: role behaviour
//! lives in the [`RoleConfig`] and the contract, never in branches on the
//! agent name.
//!
//! `invoke` order:
//! 1. gather project context (blocking, on the blocking pool)
//! 2. render the role template
//! 3. await the reasoning capability; nothing is written before it returns
//! 4. parse and check the structured output, resolve the downstream agent
//! 5. persist artifacts and decisions, linked into the project
//! 6. return the Handoff, unpersisted; the orchestrator stores it

use std::sync::Arc;

use chrono::Utc;
use spine_core::{
    AgentContract, AgentName, Artifact, ContractRegistry, Decision, Handoff, HandoffId,
    RegistryError, Spine, Task,
};

use crate::context::ProjectContext;
use crate::error::AgentError;
use crate::output::ReasoningOutput;
use crate::prompt::PromptRenderer;
use crate::reasoner::Reasoner;
use crate::role::RoleConfig;

#[derive(Clone)]
pub struct AgentShim {
    contract: AgentContract,
    role: RoleConfig,
    registry: Arc<ContractRegistry>,
    spine: Arc<Spine>,
    prompts: Arc<PromptRenderer>,
    reasoner: Arc<dyn Reasoner>,
}

impl std::fmt::Debug for AgentShim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentShim")
            .field("agent", &self.contract.agent_name)
            .field("template", &self.role.template)
            .finish_non_exhaustive()
    }
}

impl AgentShim {
    /// Shim for `role.agent`, which must be registered.
    pub fn new(
        role: RoleConfig,
        registry: Arc<ContractRegistry>,
        spine: Arc<Spine>,
        prompts: Arc<PromptRenderer>,
        reasoner: Arc<dyn Reasoner>,
    ) -> Result<Self, RegistryError> {
        let contract = registry.get(&role.agent)?.clone();
        Ok(Self {
            contract,
            role,
            registry,
            spine,
            prompts,
            reasoner,
        })
    }

    pub fn agent(&self) -> &AgentName {
        &self.contract.agent_name
    }

    pub fn contract(&self) -> &AgentContract {
        &self.contract
    }

    pub fn role(&self) -> &RoleConfig {
        &self.role
    }

    pub async fn invoke(&self, task: &Task) -> Result<Handoff, AgentError> {
        let agent = self.agent().clone();
        if let Some(addressed_to) = &task.downstream_agent {
            if addressed_to != &agent {
                return Err(AgentError::Misaddressed {
                    agent,
                    task_id: task.id.clone(),
                    addressed_to: addressed_to.clone(),
                });
            }
        }

        let context = {
            let spine = self.spine.clone();
            let task = task.clone();
            tokio::task::spawn_blocking(move || ProjectContext::gather(&spine, &task))
                .await
                .map_err(|e| AgentError::Join(e.to_string()))??
        };

        let prompt = self
            .prompts
            .render(&self.role, &self.contract, task, &context)
            .map_err(|source| AgentError::Render {
                agent: agent.clone(),
                source,
            })?;

        tracing::debug!(agent = %agent, task = %task.id, "awaiting reasoning capability");
        let raw = self
            .reasoner
            .generate(&self.role, &prompt, &context)
            .await
            .map_err(|e| AgentError::Execution {
                agent: agent.clone(),
                task_id: task.id.clone(),
                reason: e.to_string(),
            })?;

        let malformed = |detail: String| AgentError::MalformedOutput {
            agent: agent.clone(),
            task_id: task.id.clone(),
            detail,
        };
        let output = ReasoningOutput::from_value(raw).map_err(&malformed)?;
        let to_agent = self.resolve_downstream(&output).map_err(&malformed)?;

        let (artifacts, decisions) = self.drafts_to_records(task, &output);
        let refs: Vec<String> = artifacts.iter().map(Artifact::reference).collect();
        {
            let spine = self.spine.clone();
            tokio::task::spawn_blocking(move || {
                for artifact in &artifacts {
                    spine.record_owned(artifact)?;
                }
                for decision in &decisions {
                    spine.record_owned(decision)?;
                }
                Ok::<_, spine_core::StoreError>(())
            })
            .await
            .map_err(|e| AgentError::Join(e.to_string()))??;
        }

        tracing::info!(
            agent = %agent,
            task = %task.id,
            artifacts = refs.len(),
            to = to_agent.as_ref().map_or("none", AgentName::as_str),
            "agent produced handoff",
        );

        Ok(Handoff {
            id: HandoffId::generate(),
            from_agent: agent,
            to_agent,
            project_id: task.project_id.clone(),
            summary: output.summary,
            artifacts: refs,
            open_questions: output.open_questions,
            assumptions: output.assumptions,
            recommendations: output.recommendations,
            narrative_note: output.narrative_note,
            timestamp: Utc::now(),
            parent_task_id: Some(task.id.clone()),
        })
    }

    /// `terminal` wins; an explicit `next_agent` must be a registered
    /// downstream neighbour; otherwise the first neighbour, if any.
    fn resolve_downstream(&self, output: &ReasoningOutput) -> Result<Option<AgentName>, String> {
        if output.terminal {
            return Ok(None);
        }
        match &output.next_agent {
            Some(next) if !self.contract.allows_downstream(next) => Err(format!(
                "next_agent '{next}' is not a downstream neighbour of '{}'",
                self.agent()
            )),
            Some(next) if !self.registry.contains(next) => {
                Err(format!("next_agent '{next}' is not registered"))
            }
            Some(next) => Ok(Some(next.clone())),
            None => Ok(self
                .contract
                .downstream_agents
                .iter()
                .find(|a| self.registry.contains(a))
                .cloned()),
        }
    }

    fn drafts_to_records(&self, task: &Task, output: &ReasoningOutput) -> (Vec<Artifact>, Vec<Decision>) {
        let artifacts = output
            .artifacts
            .iter()
            .map(|draft| {
                let mut artifact = Artifact::new(
                    task.project_id.clone(),
                    draft.artifact_type.unwrap_or(self.role.artifact_type),
                    draft.content.clone(),
                );
                artifact.metadata = draft.metadata.clone();
                artifact
                    .metadata
                    .insert("agent".into(), self.agent().as_str().into());
                artifact
                    .metadata
                    .insert("task_id".into(), task.id.as_str().into());
                artifact
            })
            .collect();

        let decisions = output
            .decisions
            .iter()
            .map(|draft| {
                let decision = Decision::new(
                    task.project_id.clone(),
                    self.agent().clone(),
                    draft.context.clone(),
                    draft.chosen_option.clone(),
                )
                .with_options(draft.options_considered.clone())
                .with_rationale(draft.rationale.clone())
                .with_impact(draft.impact);
                if draft.reversible {
                    decision
                } else {
                    decision.irreversible()
                }
            })
            .collect();

        (artifacts, decisions)
    }
}

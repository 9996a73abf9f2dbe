//! The control loop.
//!
//! ```text
//! SUBMITTED ──route──▶ ROUTED ──invoke──▶ EXECUTING ──┬──▶ HANDED_OFF ──(to_agent)──▶ SUBMITTED (derived)
//!                                                    └──▶ FAILED
//! ```
//!
//! The orchestrator holds no mutable state: the registry and router are
//! read-only and every cross-call fact lives in the [`Spine`]. Chains for the
//! same or different projects may run concurrently from one shared instance.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use spine_agents::{AgentShim, PromptRenderer, Reasoner, RoleConfig};
use spine_core::contracts::{ARCHITECT, VETO_CAPABILITY};
use spine_core::validate::{validate_handoff, validate_task};
use spine_core::{
    AgentContract, AgentName, Artifact, ContractRegistry, Decision, Handoff, Impact, Metadata,
    NarrativeEntry, OutputType, Priority, Project, ProjectId, ProjectStatus, RegistryError, Spine,
    SpineConfig, StoreError, Task, TaskId,
};
use spine_router::{RouteDecision, Router, RoutingTable};

use crate::chain::{
    block_reason, derive_task, handoff_line, ChainEnd, ChainReport, ChainStep, TaskState,
    ORCHESTRATOR,
};
use crate::error::{join_err, OrchestratorError};

pub struct Orchestrator {
    spine: Arc<Spine>,
    registry: Arc<ContractRegistry>,
    router: Router,
    shims: HashMap<AgentName, AgentShim>,
    max_chain_depth: usize,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.registry.len())
            .field("max_chain_depth", &self.max_chain_depth)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Wire one shim per registered contract and persist the contracts.
    ///
    /// Blocking: call before entering the async loop, or from a blocking
    /// context.
    pub fn new(
        spine: Arc<Spine>,
        registry: Arc<ContractRegistry>,
        reasoner: Arc<dyn Reasoner>,
        config: &SpineConfig,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let router = Router::new(
            registry.clone(),
            RoutingTable::builtin(config.default_agent.clone()),
        )?;
        let prompts = Arc::new(PromptRenderer::new(config.templates_dir.as_deref())?);

        let mut shims = HashMap::with_capacity(registry.len());
        for contract in registry.all() {
            let shim = AgentShim::new(
                RoleConfig::for_contract(contract),
                registry.clone(),
                spine.clone(),
                prompts.clone(),
                reasoner.clone(),
            )?;
            shims.insert(contract.agent_name.clone(), shim);
        }

        let persisted = spine.put_contracts(&registry)?;
        tracing::info!(agents = persisted, max_chain_depth = config.max_chain_depth, "orchestrator ready");

        Ok(Self {
            spine,
            registry,
            router,
            shims,
            max_chain_depth: config.max_chain_depth,
        })
    }

    pub fn spine(&self) -> &Arc<Spine> {
        &self.spine
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn list_agents(&self) -> &[AgentContract] {
        self.registry.all()
    }

    // -----------------------------------------------------------------------
    // Inbound: commands
    // -----------------------------------------------------------------------

    /// Run `task` and every task derived from it; returns the root task id.
    pub async fn submit_task(&self, task: Task) -> Result<TaskId, OrchestratorError> {
        self.run_chain(task).await.map(|report| report.root_task)
    }

    /// Like [`Orchestrator::submit_task`], returning every step of the chain.
    pub async fn run_chain(&self, task: Task) -> Result<ChainReport, OrchestratorError> {
        self.admit(&task).await?;
        let root_task = task.id.clone();
        let project_id = task.project_id.clone();
        tracing::info!(task = %task.id, project = %project_id, state = %TaskState::Submitted, "task admitted");

        let mut steps: Vec<ChainStep> = Vec::new();
        let mut task = task;
        loop {
            let route = self.router.route_explained(&task);
            let task_for_shim = normalize_addressee(&task, &route);
            tracing::info!(
                task = %task.id,
                agent = %route.agent,
                rule = %route.rule,
                state = %TaskState::Routed,
                "task routed",
            );

            let shim = self
                .shims
                .get(&route.agent)
                .ok_or_else(|| RegistryError::AgentNotFound(route.agent.clone()))?;

            tracing::info!(task = %task.id, agent = %route.agent, state = %TaskState::Executing, "invoking agent");
            let mut handoff = match shim.invoke(&task_for_shim).await {
                Ok(handoff) => handoff,
                Err(err) => {
                    tracing::error!(task = %task.id, agent = %route.agent, state = %TaskState::Failed, error = %err, "agent failed");
                    self.note(
                        &project_id,
                        format!("{} failed on task {}: {err}", route.agent, task.id),
                        ORCHESTRATOR,
                    )
                    .await;
                    return Err(err.into());
                }
            };

            let blocked = if shim.contract().has_capability(VETO_CAPABILITY) {
                block_reason(&handoff)
            } else {
                None
            };
            if blocked.is_some() {
                handoff.to_agent = None;
            }

            if let Err(err) = self.persist_handoff(&handoff).await {
                let context = format!("persisting handoff {} from {} failed", handoff.id, handoff.from_agent);
                return Err(self.narrate_failure(&project_id, context, err).await);
            }
            tracing::info!(
                task = %task.id,
                handoff = %handoff.id,
                to = handoff.to_agent.as_ref().map_or("none", AgentName::as_str),
                state = %TaskState::HandedOff,
                "handoff persisted",
            );
            steps.push(ChainStep {
                task_id: task.id.clone(),
                agent: route.agent.clone(),
                route: route.rule.clone(),
                state: TaskState::HandedOff,
                handoff_id: handoff.id.clone(),
                to_agent: handoff.to_agent.clone(),
            });

            if let Some(reason) = blocked {
                if let Err(err) = self.record_block(&task, &handoff, &reason).await {
                    let context = format!("recording block by {} failed", handoff.from_agent);
                    return Err(self.narrate_failure(&project_id, context, err).await);
                }
                return Ok(ChainReport {
                    root_task,
                    project_id,
                    steps,
                    end: ChainEnd::Blocked {
                        by: handoff.from_agent,
                        reason,
                    },
                });
            }

            let depth = steps.len();
            let Some(next) = derive_task(&task_for_shim, &handoff, depth) else {
                tracing::info!(task = %root_task, steps = depth, "chain terminal");
                return Ok(ChainReport {
                    root_task,
                    project_id,
                    steps,
                    end: ChainEnd::Terminal,
                });
            };

            if depth >= self.max_chain_depth {
                let err = match self.record_depth_exceeded(&task, &handoff, depth).await {
                    Ok(limit_err) => limit_err,
                    Err(err) => {
                        let context = format!("recording chain stop after handoff {} failed", handoff.id);
                        self.narrate_failure(&project_id, context, err).await
                    }
                };
                return Err(err);
            }
            tracing::debug!(parent = %task.id, task = %next.id, depth, "derived task submitted");
            task = next;
        }
    }

    /// Write a new project and its "initiated" narrative entry.
    pub async fn create_project(
        &self,
        name: impl Into<String>,
        mission: impl Into<String>,
        metadata: Metadata,
    ) -> Result<Project, OrchestratorError> {
        let mut project = Project::new(name, mission);
        project.metadata = metadata;
        let spine = self.spine.clone();
        let stored = project.clone();
        tokio::task::spawn_blocking(move || {
            spine.create_project(&stored)?;
            spine.append_narrative(
                &stored.id,
                stored.initiated_note(),
                ORCHESTRATOR,
                stored.created_at,
            )
        })
        .await
        .map_err(join_err)??;
        tracing::info!(project = %project.id, name = %project.name, "project created");
        Ok(project)
    }

    /// The architect-bound task that starts a new project.
    pub fn kickoff_task(project: &Project) -> Task {
        Task::new(
            project.id.clone(),
            format!(
                "Initialize project '{}'. Mission: {}. Produce the initial architecture and a plan \
                 the other agents can follow.",
                project.name, project.mission
            ),
        )
        .with_origin(ORCHESTRATOR)
        .with_output_type(OutputType::Spec)
        .with_downstream_agent(ARCHITECT)
        .with_priority(Priority::High)
    }

    pub async fn set_project_status(
        &self,
        project_id: &ProjectId,
        status: ProjectStatus,
    ) -> Result<Project, OrchestratorError> {
        let spine = self.spine.clone();
        let id = project_id.clone();
        let project = tokio::task::spawn_blocking(move || {
            let project = spine.set_project_status(&id, status)?;
            spine.append_narrative(&id, format!("Status set to {status}"), ORCHESTRATOR, project.updated_at)?;
            Ok::<_, StoreError>(project)
        })
        .await
        .map_err(join_err)??;
        Ok(project)
    }

    // -----------------------------------------------------------------------
    // Inbound: queries
    // -----------------------------------------------------------------------

    pub async fn get_project_status(&self, project_id: &ProjectId) -> Result<Project, OrchestratorError> {
        let id = project_id.clone();
        self.blocking(move |spine| spine.get_project(&id)).await
    }

    pub async fn get_handoffs(&self, project_id: &ProjectId) -> Result<Vec<Handoff>, OrchestratorError> {
        let id = project_id.clone();
        self.blocking(move |spine| spine.list_by_project(&id)).await
    }

    pub async fn get_decisions(&self, project_id: &ProjectId) -> Result<Vec<Decision>, OrchestratorError> {
        let id = project_id.clone();
        self.blocking(move |spine| spine.list_by_project(&id)).await
    }

    pub async fn get_artifacts(&self, project_id: &ProjectId) -> Result<Vec<Artifact>, OrchestratorError> {
        let id = project_id.clone();
        self.blocking(move |spine| spine.list_by_project(&id)).await
    }

    pub async fn read_continuity_log(
        &self,
        project_id: &ProjectId,
    ) -> Result<Vec<NarrativeEntry>, OrchestratorError> {
        let id = project_id.clone();
        self.blocking(move |spine| spine.read_narrative(&id)?.collect()).await
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    async fn blocking<T, F>(&self, op: F) -> Result<T, OrchestratorError>
    where
        T: Send + 'static,
        F: FnOnce(&Spine) -> Result<T, StoreError> + Send + 'static,
    {
        let spine = self.spine.clone();
        Ok(tokio::task::spawn_blocking(move || op(&spine))
            .await
            .map_err(join_err)??)
    }

    /// Structural checks, then the project must exist. No state change on
    /// failure.
    async fn admit(&self, task: &Task) -> Result<(), OrchestratorError> {
        let invalid = |reason: String| OrchestratorError::InvalidTask {
            task_id: task.id.clone(),
            reason,
        };
        validate_task(task).map_err(|e| invalid(e.to_string()))?;

        let id = task.project_id.clone();
        match self.blocking(move |spine| spine.get_project(&id)).await {
            Ok(_) => Ok(()),
            Err(OrchestratorError::Store(err)) if err.is_not_found() => {
                Err(invalid(format!("project '{}' does not exist", task.project_id)))
            }
            Err(OrchestratorError::Store(StoreError::InvalidId(id))) => {
                Err(invalid(format!("'{id}' is not a usable project id")))
            }
            Err(err) => Err(err),
        }
    }

    /// Store the handoff, link it into its project, then narrate it.
    async fn persist_handoff(&self, handoff: &Handoff) -> Result<(), OrchestratorError> {
        validate_handoff(handoff, &self.registry)?;
        let spine = self.spine.clone();
        let handoff = handoff.clone();
        tokio::task::spawn_blocking(move || {
            spine.record_owned(&handoff)?;
            spine.append_narrative(
                &handoff.project_id,
                handoff_line(&handoff),
                handoff.from_agent.as_str(),
                handoff.timestamp,
            )
        })
        .await
        .map_err(join_err)??;
        Ok(())
    }

    async fn record_block(&self, task: &Task, handoff: &Handoff, reason: &str) -> Result<(), OrchestratorError> {
        tracing::warn!(task = %task.id, agent = %handoff.from_agent, reason, "chain blocked");
        let decision = Decision::new(
            task.project_id.clone(),
            handoff.from_agent.clone(),
            format!("{} reviewed task {} (handoff {})", handoff.from_agent, task.id, handoff.id),
            "block",
        )
        .with_options(vec!["proceed".into(), "block".into()])
        .with_rationale(reason)
        .with_impact(Impact::Critical);
        let line = format!("BLOCKED by {}: {reason}", handoff.from_agent);
        self.record_decision(decision, line).await
    }

    /// Log the depth violation and build the error to surface.
    async fn record_depth_exceeded(
        &self,
        task: &Task,
        handoff: &Handoff,
        depth: usize,
    ) -> Result<OrchestratorError, OrchestratorError> {
        let next = handoff.to_agent.as_ref().map_or("none", AgentName::as_str).to_owned();
        tracing::error!(task = %task.id, depth, limit = self.max_chain_depth, next = %next, "chain depth exceeded");
        let decision = Decision::new(
            task.project_id.clone(),
            AgentName::from(ORCHESTRATOR),
            format!(
                "chain reached {depth} handoffs (limit {}) after handoff {}",
                self.max_chain_depth, handoff.id
            ),
            "stop chain",
        )
        .with_options(vec![format!("continue to {next}"), "stop chain".into()])
        .with_rationale("maximum chain depth exceeded; a routing loop is likely")
        .with_impact(Impact::High);
        let line = format!(
            "Chain stopped after {depth} handoffs: depth limit {} reached before {next}",
            self.max_chain_depth
        );
        self.record_decision(decision, line).await?;
        Ok(OrchestratorError::MaxChainDepth {
            task_id: task.id.clone(),
            project_id: task.project_id.clone(),
            depth,
            limit: self.max_chain_depth,
        })
    }

    async fn record_decision(&self, decision: Decision, line: String) -> Result<(), OrchestratorError> {
        let spine = self.spine.clone();
        tokio::task::spawn_blocking(move || {
            spine.record_owned(&decision)?;
            spine.append_narrative(&decision.project_id, line, ORCHESTRATOR, decision.timestamp)
        })
        .await
        .map_err(join_err)??;
        Ok(())
    }

    /// Log and narrate a failure that happened after the agent returned, then
    /// hand the error back for the caller.
    async fn narrate_failure(
        &self,
        project_id: &ProjectId,
        context: String,
        err: OrchestratorError,
    ) -> OrchestratorError {
        tracing::error!(project = %project_id, error = %err, "{context}");
        self.note(project_id, format!("{context}: {err}"), ORCHESTRATOR).await;
        err
    }

    /// Best-effort narrative entry; a storage failure here must not mask the
    /// error being reported.
    async fn note(&self, project_id: &ProjectId, text: String, author: &str) {
        let spine = self.spine.clone();
        let id = project_id.clone();
        let author = author.to_owned();
        let written = tokio::task::spawn_blocking(move || spine.append_narrative(&id, text, author, Utc::now())).await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(project = %project_id, error = %err, "narrative append failed"),
            Err(err) => tracing::warn!(project = %project_id, error = %err, "narrative append join failed"),
        }
    }
}

/// A task whose explicit addressee is not registered was routed elsewhere;
/// readdress it to the routed agent and keep the original request.
fn normalize_addressee(task: &Task, route: &RouteDecision) -> Task {
    let mut task = task.clone();
    if let Some(requested) = &task.downstream_agent {
        if requested != &route.agent {
            task.metadata
                .insert("requested_agent".into(), requested.as_str().into());
            task.downstream_agent = Some(route.agent.clone());
        }
    }
    task
}

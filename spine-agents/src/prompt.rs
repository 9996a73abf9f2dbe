//! Tera prompt rendering.
//!
//! Role templates are embedded at compile time. A user template directory may
//! override any of them (or add new ones for YAML-registered roles); names are
//! the file names relative to that directory, lower-cased.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use spine_core::contracts::VETO_CAPABILITY;
use spine_core::{AgentContract, AgentName, ArtifactType, OutputType, Task};
use tera::Tera;

use crate::context::ProjectContext;
use crate::error::RenderError;
use crate::role::RoleConfig;

const TEMPLATES: &[(&str, &str)] = &[
    ("_header.tera", include_str!("templates/_header.tera")),
    ("_context.tera", include_str!("templates/_context.tera")),
    ("_task.tera", include_str!("templates/_task.tera")),
    ("_output.tera", include_str!("templates/_output.tera")),
    ("architect.tera", include_str!("templates/architect.tera")),
    ("scribe.tera", include_str!("templates/scribe.tera")),
    ("builder.tera", include_str!("templates/builder.tera")),
    ("curator.tera", include_str!("templates/curator.tera")),
    ("guardian.tera", include_str!("templates/guardian.tera")),
    ("continuity.tera", include_str!("templates/continuity.tera")),
    ("generic.tera", include_str!("templates/generic.tera")),
];

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut templates = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((normalize_template_name(rel), contents));
    }
    Ok(templates)
}

/// What a role template sees as `role`.
#[derive(Serialize)]
struct RoleView<'a> {
    agent: &'a AgentName,
    title: &'a str,
    primary_focus: &'a str,
    persona: &'a str,
    expected_output: OutputType,
    artifact_type: ArtifactType,
    downstream_agents: &'a [AgentName],
    constraints: &'a [String],
    can_veto: bool,
}

#[derive(Serialize)]
struct PromptContext<'a> {
    role: RoleView<'a>,
    task: &'a Task,
    #[serde(flatten)]
    context: &'a ProjectContext,
}

/// Renders the instruction sent to the reasoning capability.
pub struct PromptRenderer {
    tera: Tera,
}

impl std::fmt::Debug for PromptRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRenderer").finish_non_exhaustive()
    }
}

impl PromptRenderer {
    /// Embedded templates plus any `.tera` overrides in `user_template_dir`.
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let mut templates: HashMap<String, String> = TEMPLATES
            .iter()
            .map(|(name, body)| ((*name).to_owned(), (*body).to_owned()))
            .collect();
        if let Some(dir) = user_template_dir {
            for (name, body) in load_user_templates(dir)? {
                tracing::debug!(template = %name, "user template override");
                templates.insert(name, body);
            }
        }
        let mut tera = Tera::default();
        tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
        Ok(Self { tera })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    pub fn render(
        &self,
        role: &RoleConfig,
        contract: &AgentContract,
        task: &Task,
        context: &ProjectContext,
    ) -> Result<String, RenderError> {
        let payload = PromptContext {
            role: RoleView {
                agent: &role.agent,
                title: &contract.role,
                primary_focus: &contract.primary_focus,
                persona: &role.persona,
                expected_output: role.expected_output,
                artifact_type: role.artifact_type,
                downstream_agents: &contract.downstream_agents,
                constraints: &contract.constraints,
                can_veto: contract.has_capability(VETO_CAPABILITY),
            },
            task,
            context,
        };
        let ctx = tera::Context::from_serialize(&payload)?;
        Ok(self.tera.render(&role.template, &ctx)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spine_core::{Artifact, ContractRegistry, Project};
    use tempfile::TempDir;

    fn context(project: &Project) -> ProjectContext {
        ProjectContext {
            project: project.clone(),
            artifacts: vec![Artifact::new(project.id.clone(), ArtifactType::Spec, "the spec body")],
            handoffs: vec![],
            decisions: vec![],
            other_refs: vec![],
            missing_refs: vec!["handoff:gone".into()],
        }
    }

    #[test]
    fn every_builtin_role_renders() {
        let renderer = PromptRenderer::new(None).unwrap();
        let project = Project::new("atlas", "map every service");
        let task = Task::new(project.id.clone(), "do the thing").with_constraint("no network");
        for contract in ContractRegistry::builtin().all() {
            let role = RoleConfig::for_contract(contract);
            let prompt = renderer
                .render(&role, contract, &task, &context(&project))
                .unwrap_or_else(|e| panic!("render failed for {}: {e}", contract.agent_name));
            assert!(prompt.contains("atlas"), "{prompt}");
            assert!(prompt.contains("do the thing"));
            assert!(prompt.contains("no network"));
            assert!(prompt.contains("the spec body"));
            assert!(prompt.contains("handoff:gone"));
        }
    }

    #[test]
    fn only_veto_roles_learn_the_block_directive() {
        let renderer = PromptRenderer::new(None).unwrap();
        let registry = ContractRegistry::builtin();
        let project = Project::new("atlas", "m");
        let task = Task::new(project.id.clone(), "review");
        let render = |name: &str| {
            let contract = registry.get(&AgentName::from(name)).unwrap();
            renderer
                .render(&RoleConfig::for_contract(contract), contract, &task, &context(&project))
                .unwrap()
        };
        assert!(render("guardian").contains("BLOCK:"));
        assert!(!render("builder").contains("BLOCK:"));
        assert!(render("builder").contains("guardian, scribe"));
    }

    #[test]
    fn user_dir_overrides_embedded_template() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Scribe.tera"), "custom {{ task.instruction }}").unwrap();
        let renderer = PromptRenderer::new(Some(dir.path())).unwrap();
        assert!(renderer.has_template("scribe.tera"));

        let registry = ContractRegistry::builtin();
        let contract = registry.get(&AgentName::from("scribe")).unwrap();
        let project = Project::new("p", "m");
        let task = Task::new(project.id.clone(), "hello");
        let prompt = renderer
            .render(&RoleConfig::for_contract(contract), contract, &task, &context(&project))
            .unwrap();
        assert_eq!(prompt, "custom hello");
    }

    #[test]
    fn missing_user_dir_is_ignored() {
        let dir = TempDir::new().unwrap();
        assert!(PromptRenderer::new(Some(&dir.path().join("absent"))).is_ok());
    }
}

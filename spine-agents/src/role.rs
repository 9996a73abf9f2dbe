//! Role configuration: what makes one shim an architect and another a guardian.

use serde::Serialize;
use spine_core::contracts::{ARCHITECT, BUILDER, CONTINUITY, CURATOR, GUARDIAN, SCRIBE};
use spine_core::{AgentContract, AgentName, ArtifactType, OutputType};

/// Template used for contracts without a built-in role.
pub const GENERIC_TEMPLATE: &str = "generic.tera";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleConfig {
    pub agent: AgentName,
    /// Opening paragraph of every prompt for this role.
    pub persona: String,
    /// Name of the tera template that renders the instruction.
    pub template: String,
    pub expected_output: OutputType,
    /// Type given to artifacts whose draft names none.
    pub artifact_type: ArtifactType,
}

impl RoleConfig {
    /// The built-in configuration for the contract's agent, or one derived
    /// from the contract itself.
    pub fn for_contract(contract: &AgentContract) -> Self {
        builtin(&contract.agent_name).unwrap_or_else(|| Self::from_contract(contract))
    }

    pub fn from_contract(contract: &AgentContract) -> Self {
        Self {
            agent: contract.agent_name.clone(),
            persona: format!(
                "You are the {} agent ({}). Your focus: {}.",
                contract.agent_name, contract.role, contract.primary_focus
            ),
            template: GENERIC_TEMPLATE.to_owned(),
            expected_output: OutputType::HandoffPacket,
            artifact_type: ArtifactType::Document,
        }
    }
}

fn role(
    agent: &str,
    persona: &str,
    template: &str,
    expected_output: OutputType,
    artifact_type: ArtifactType,
) -> RoleConfig {
    RoleConfig {
        agent: AgentName::from(agent),
        persona: persona.to_owned(),
        template: template.to_owned(),
        expected_output,
        artifact_type,
    }
}

/// Built-in configuration of one of the six roles.
pub fn builtin(agent: &AgentName) -> Option<RoleConfig> {
    let config = match agent.as_str() {
        ARCHITECT => role(
            ARCHITECT,
            "You are the Architect. You turn goals and constraints into clear system designs, \
             protocols and specifications that others can build from.",
            "architect.tera",
            OutputType::Spec,
            ArtifactType::Spec,
        ),
        SCRIBE => role(
            SCRIBE,
            "You are the Scribe. You document what happened and why, and keep the project's \
             narrative readable for whoever comes next.",
            "scribe.tera",
            OutputType::Summary,
            ArtifactType::Document,
        ),
        BUILDER => role(
            BUILDER,
            "You are the Builder. You implement specifications as working code, scripts and \
             infrastructure.",
            "builder.tera",
            OutputType::Code,
            ArtifactType::Code,
        ),
        CURATOR => role(
            CURATOR,
            "You are the Curator. You ingest, clean and organise raw material into knowledge \
             the other agents can use.",
            "curator.tera",
            OutputType::Summary,
            ArtifactType::Data,
        ),
        GUARDIAN => role(
            GUARDIAN,
            "You are the Guardian. You check planned actions and artifacts against safety, \
             policy and the project's constraints, and you can stop work that must not proceed.",
            "guardian.tera",
            OutputType::HandoffPacket,
            ArtifactType::Review,
        ),
        CONTINUITY => role(
            CONTINUITY,
            "You are Continuity. You preserve memory across sessions and write letters to \
             future collaborators. You never discard history.",
            "continuity.tera",
            OutputType::Summary,
            ArtifactType::Summary,
        ),
        _ => return None,
    };
    Some(config)
}

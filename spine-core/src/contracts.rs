//! Agent Contract Registry.
//!
//! Built once at bootstrap (six built-in roles plus optional YAML extras) and
//! shared read-only afterwards, typically behind an `Arc`. There is no runtime
//! mutation once bootstrap completes.

use std::path::Path;

use crate::config::SpineConfig;
use crate::error::RegistryError;
use crate::types::{AgentContract, AgentName};

pub const ARCHITECT: &str = "architect";
pub const SCRIBE: &str = "scribe";
pub const BUILDER: &str = "builder";
pub const CURATOR: &str = "curator";
pub const GUARDIAN: &str = "guardian";
pub const CONTINUITY: &str = "continuity";

/// Capability tag of agents allowed to stop a chain with the BLOCK directive.
pub const VETO_CAPABILITY: &str = "veto";

#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    contracts: Vec<AgentContract>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the six built-in roles.
    pub fn builtin() -> Self {
        Self {
            contracts: builtin_contracts(),
        }
    }

    /// Built-ins, then any contracts from `config.contracts_file`, then a
    /// neighbour check across the whole set.
    pub fn bootstrap(config: &SpineConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::builtin();
        if let Some(path) = &config.contracts_file {
            for contract in load_contracts_at(path)? {
                registry.register(contract)?;
            }
        }
        registry.validate_links()?;
        if !registry.contains(&config.default_agent) {
            return Err(RegistryError::AgentNotFound(config.default_agent.clone()));
        }
        Ok(registry)
    }

    /// Fails with [`RegistryError::DuplicateAgent`] if the name is taken.
    pub fn register(&mut self, contract: AgentContract) -> Result<(), RegistryError> {
        if contract.agent_name.as_str().trim().is_empty() {
            return Err(RegistryError::InvalidContract {
                agent: contract.agent_name,
                reason: "agent_name must not be empty".into(),
            });
        }
        if self.contains(&contract.agent_name) {
            return Err(RegistryError::DuplicateAgent(contract.agent_name));
        }
        self.contracts.push(contract);
        Ok(())
    }

    pub fn get(&self, name: &AgentName) -> Result<&AgentContract, RegistryError> {
        self.contracts
            .iter()
            .find(|c| &c.agent_name == name)
            .ok_or_else(|| RegistryError::AgentNotFound(name.clone()))
    }

    pub fn contains(&self, name: &AgentName) -> bool {
        self.contracts.iter().any(|c| &c.agent_name == name)
    }

    /// Every contract, in registration order.
    pub fn all(&self) -> &[AgentContract] {
        &self.contracts
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Every upstream/downstream neighbour must itself be registered.
    pub fn validate_links(&self) -> Result<(), RegistryError> {
        for contract in &self.contracts {
            let neighbours = contract
                .upstream_agents
                .iter()
                .chain(contract.downstream_agents.iter());
            for neighbour in neighbours {
                if !self.contains(neighbour) {
                    return Err(RegistryError::InvalidContract {
                        agent: contract.agent_name.clone(),
                        reason: format!("neighbour '{neighbour}' is not registered"),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Parse a YAML list of contracts.
pub fn load_contracts_at(path: &Path) -> Result<Vec<AgentContract>, RegistryError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| RegistryError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn tags(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

fn names(items: &[&str]) -> Vec<AgentName> {
    items.iter().map(|s| AgentName::from(*s)).collect()
}

/// The six roles of the system.
pub fn builtin_contracts() -> Vec<AgentContract> {
    vec![
        AgentContract {
            agent_name: AgentName::from(ARCHITECT),
            role: "System Designer".into(),
            primary_focus: "System design, protocols, meta-prompts, architecture".into(),
            capabilities: tags(&["design", "specification", "protocol_definition", "architecture"]),
            preferred_input_type: tags(&["goals", "constraints", "existing_docs"]),
            output_type: tags(&["spec", "diagram", "handoff_packet"]),
            upstream_agents: vec![],
            downstream_agents: names(&[SCRIBE, BUILDER]),
            constraints: vec![],
        },
        AgentContract {
            agent_name: AgentName::from(SCRIBE),
            role: "Documentarian".into(),
            primary_focus: "Documentation, narrative continuity, handoff letters".into(),
            capabilities: tags(&["documentation", "summary", "narrative"]),
            preferred_input_type: tags(&["raw_outputs", "logs", "handoff_packets"]),
            output_type: tags(&["docs", "readme", "handoff_packet"]),
            upstream_agents: vec![],
            downstream_agents: names(&[CONTINUITY]),
            constraints: vec![],
        },
        AgentContract {
            agent_name: AgentName::from(BUILDER),
            role: "Implementation Engineer".into(),
            primary_focus: "Code, scripts, infrastructure-as-code".into(),
            capabilities: tags(&["coding", "scripting", "automation", "infrastructure"]),
            preferred_input_type: tags(&["specs", "diagrams", "handoff_packets"]),
            output_type: tags(&["code", "scripts", "handoff_packet"]),
            upstream_agents: names(&[ARCHITECT]),
            downstream_agents: names(&[GUARDIAN, SCRIBE]),
            constraints: vec![],
        },
        AgentContract {
            agent_name: AgentName::from(CURATOR),
            role: "Knowledge Manager".into(),
            primary_focus: "Data ingestion, cleanup, knowledge graphs".into(),
            capabilities: tags(&["data_ingestion", "knowledge_graph", "search"]),
            preferred_input_type: tags(&["raw_files", "links", "transcripts"]),
            output_type: tags(&["cleaned_data", "knowledge_map"]),
            upstream_agents: vec![],
            downstream_agents: names(&[SCRIBE]),
            constraints: vec![],
        },
        AgentContract {
            agent_name: AgentName::from(GUARDIAN),
            role: "Safety and Policy Enforcer".into(),
            primary_focus: "Guardrails, constraints, ethical checks, safety validation".into(),
            capabilities: tags(&["validation", "safety_check", "policy_enforcement", VETO_CAPABILITY]),
            preferred_input_type: tags(&["planned_actions", "artifacts"]),
            output_type: tags(&["approval", "warning", "revised_plan"]),
            upstream_agents: names(&[BUILDER]),
            downstream_agents: names(&[SCRIBE]),
            constraints: tags(&["Must approve all critical actions", "Can veto unsafe operations"]),
        },
        AgentContract {
            agent_name: AgentName::from(CONTINUITY),
            role: "Legacy and Memory Keeper".into(),
            primary_focus: "Memory, baton-passing, letters to future collaborators".into(),
            capabilities: tags(&["memory_management", "legacy_documentation", "context_preservation"]),
            preferred_input_type: tags(&["events", "changes", "milestones", "handoff_packets"]),
            output_type: tags(&["summaries", "memory_updates", "prompts"]),
            upstream_agents: names(&[SCRIBE]),
            downstream_agents: vec![],
            constraints: tags(&["Never delete history", "Always preserve context"]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builtin_has_six_linked_roles() {
        let registry = ContractRegistry::builtin();
        assert_eq!(registry.len(), 6);
        registry.validate_links().expect("links");
        let guardian = registry.get(&AgentName::from(GUARDIAN)).unwrap();
        assert!(guardian.has_capability(VETO_CAPABILITY));
        assert!(!registry
            .get(&AgentName::from(BUILDER))
            .unwrap()
            .has_capability(VETO_CAPABILITY));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ContractRegistry::builtin();
        let dup = registry.all()[0].clone();
        let err = registry.register(dup).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateAgent(name) if name.as_str() == ARCHITECT));
    }

    #[test]
    fn unknown_agent_is_not_found() {
        let registry = ContractRegistry::builtin();
        assert!(matches!(
            registry.get(&AgentName::from("oracle")),
            Err(RegistryError::AgentNotFound(_))
        ));
    }

    #[test]
    fn bootstrap_loads_extra_contracts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contracts.yaml");
        std::fs::write(
            &path,
            "- agent_name: translator\n  role: Translator\n  primary_focus: Localisation\n  downstream_agents: [scribe]\n",
        )
        .unwrap();
        let config = SpineConfig {
            contracts_file: Some(path),
            ..SpineConfig::default()
        };
        let registry = ContractRegistry::bootstrap(&config).unwrap();
        assert_eq!(registry.len(), 7);
        assert!(registry.contains(&AgentName::from("translator")));
    }

    #[test]
    fn bootstrap_rejects_dangling_neighbour() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("contracts.yaml");
        std::fs::write(
            &path,
            "- agent_name: translator\n  role: Translator\n  primary_focus: x\n  downstream_agents: [ghost]\n",
        )
        .unwrap();
        let config = SpineConfig {
            contracts_file: Some(path),
            ..SpineConfig::default()
        };
        assert!(matches!(
            ContractRegistry::bootstrap(&config),
            Err(RegistryError::InvalidContract { .. })
        ));
    }

    #[test]
    fn bootstrap_requires_registered_default() {
        let config = SpineConfig {
            default_agent: AgentName::from("nobody"),
            ..SpineConfig::default()
        };
        assert!(matches!(
            ContractRegistry::bootstrap(&config),
            Err(RegistryError::AgentNotFound(_))
        ));
    }
}

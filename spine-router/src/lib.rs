//! Task routing for `spine-router`.
//!
//! `Router::route(task)` assigns a task to exactly one registered agent. The
//! checks run in a fixed priority order and the first match wins:
//!
//! 1. explicit `downstream_agent`, when it names a registered agent
//! 2. `expected_output_type` through the static output table
//! 3. instruction keywords, role by role in declaration order
//! 4. the configured default agent
//!
//! Routing is pure: no clock, no randomness, no store access. Ties between
//! keyword sets are broken by declaration order, never by match counts.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use spine_core::contracts::{ARCHITECT, BUILDER, CONTINUITY, CURATOR, GUARDIAN, SCRIBE};
use spine_core::{AgentName, ContractRegistry, OutputType, RegistryError, Task};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Which rule produced a routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "detail", rename_all = "snake_case")]
pub enum RouteRule {
    /// `task.downstream_agent` named a registered agent.
    Explicit,
    /// `task.expected_output_type` matched the output table.
    OutputType(OutputType),
    /// The instruction contained this keyword.
    Keyword(String),
    /// Nothing matched.
    Default,
}

impl fmt::Display for RouteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteRule::Explicit => f.write_str("explicit downstream agent"),
            RouteRule::OutputType(t) => write!(f, "output type '{t}'"),
            RouteRule::Keyword(k) => write!(f, "keyword '{k}'"),
            RouteRule::Default => f.write_str("default agent"),
        }
    }
}

/// An auditable routing decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    pub agent: AgentName,
    #[serde(flatten)]
    pub rule: RouteRule,
}

/// One role's keyword set in step 3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    pub agent: AgentName,
    pub keywords: Vec<String>,
}

/// The static decision table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    /// Step 2, checked in order.
    pub outputs: Vec<(OutputType, AgentName)>,
    /// Step 3, checked in order.
    pub keywords: Vec<KeywordSet>,
    /// Step 4.
    pub default_agent: AgentName,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::builtin(AgentName::from(SCRIBE))
    }
}

impl RoutingTable {
    /// The table of the six built-in roles, falling back to `default_agent`.
    pub fn builtin(default_agent: AgentName) -> Self {
        let set = |agent: &str, words: &[&str]| KeywordSet {
            agent: AgentName::from(agent),
            keywords: words.iter().map(|w| (*w).to_owned()).collect(),
        };
        Self {
            outputs: vec![
                (OutputType::Spec, AgentName::from(ARCHITECT)),
                (OutputType::Code, AgentName::from(BUILDER)),
                (OutputType::Summary, AgentName::from(SCRIBE)),
            ],
            keywords: vec![
                set(ARCHITECT, &["design", "architecture", "system", "protocol"]),
                set(SCRIBE, &["document", "write", "summarize", "explain"]),
                set(BUILDER, &["code", "implement", "build", "script"]),
                set(CURATOR, &["ingest", "import", "process", "clean"]),
                set(GUARDIAN, &["validate", "check", "safe", "approve"]),
                set(CONTINUITY, &["remember", "memory", "legacy", "continuity"]),
            ],
            default_agent,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ContractRegistry>,
    table: RoutingTable,
}

impl Router {
    /// Fails if the table's default agent is not registered, so `route` can
    /// never return an unknown name.
    pub fn new(registry: Arc<ContractRegistry>, table: RoutingTable) -> Result<Self, RegistryError> {
        registry.get(&table.default_agent)?;
        Ok(Self { registry, table })
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// The agent for `task`. Total: falls back to the default agent.
    pub fn route(&self, task: &Task) -> AgentName {
        self.route_explained(task).agent
    }

    /// Like [`Router::route`], also naming the rule that fired.
    pub fn route_explained(&self, task: &Task) -> RouteDecision {
        let decision = self
            .by_explicit_agent(task)
            .or_else(|| self.by_output_type(task))
            .or_else(|| self.by_keyword(task))
            .unwrap_or_else(|| RouteDecision {
                agent: self.table.default_agent.clone(),
                rule: RouteRule::Default,
            });
        tracing::debug!(task = %task.id, agent = %decision.agent, rule = %decision.rule, "routed");
        decision
    }

    fn by_explicit_agent(&self, task: &Task) -> Option<RouteDecision> {
        let agent = task.downstream_agent.as_ref()?;
        if !self.registry.contains(agent) {
            return None;
        }
        Some(RouteDecision {
            agent: agent.clone(),
            rule: RouteRule::Explicit,
        })
    }

    fn by_output_type(&self, task: &Task) -> Option<RouteDecision> {
        let wanted = task.expected_output_type?;
        self.table
            .outputs
            .iter()
            .find(|(output, agent)| *output == wanted && self.registry.contains(agent))
            .map(|(output, agent)| RouteDecision {
                agent: agent.clone(),
                rule: RouteRule::OutputType(*output),
            })
    }

    fn by_keyword(&self, task: &Task) -> Option<RouteDecision> {
        let words = words(&task.instruction);
        for set in &self.table.keywords {
            if !self.registry.contains(&set.agent) {
                continue;
            }
            if let Some(hit) = set.keywords.iter().find(|k| words.contains(k.as_str())) {
                return Some(RouteDecision {
                    agent: set.agent.clone(),
                    rule: RouteRule::Keyword(hit.clone()),
                });
            }
        }
        None
    }
}

/// The lower-cased word set of an instruction, split on anything that is not
/// alphanumeric.
pub fn words(instruction: &str) -> BTreeSet<String> {
    instruction
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

//! `spine route --instruction <text> [--output-type <type>] [--agent <name>]`

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use spine_core::{OutputType, ProjectId, Task};
use spine_router::{RouteDecision, Router, RoutingTable};

use super::{print_json, Workspace};

/// Explain a routing decision without running anything.
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Task instruction text.
    #[arg(long, short = 'i')]
    pub instruction: String,

    /// Expected output: spec | code | diagram | handoff_packet | summary | chat
    #[arg(long, value_name = "TYPE")]
    pub output_type: Option<OutputType>,

    /// Explicitly addressed agent.
    #[arg(long, value_name = "AGENT")]
    pub agent: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct RouteJson<'a> {
    #[serde(flatten)]
    decision: &'a RouteDecision,
    explanation: String,
}

impl RouteArgs {
    pub fn run(self) -> Result<()> {
        let ws = Workspace::open()?;
        let registry = Arc::new(ws.registry()?);
        let table = RoutingTable::builtin(ws.config.default_agent.clone());
        let router = Router::new(registry, table).context("failed to build router")?;

        // Routing never looks at the project; any id will do.
        let mut task = Task::new(ProjectId::from("route-preview"), self.instruction);
        if let Some(output) = self.output_type {
            task = task.with_output_type(output);
        }
        if let Some(agent) = self.agent {
            task = task.with_downstream_agent(agent);
        }

        let decision = router.route_explained(&task);
        if self.json {
            return print_json(&RouteJson {
                explanation: decision.rule.to_string(),
                decision: &decision,
            });
        }
        println!("→ {} (by {})", decision.agent.as_str().green().bold(), decision.rule);
        Ok(())
    }
}

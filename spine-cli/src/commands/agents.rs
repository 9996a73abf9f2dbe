//! `spine agents`: registered contracts and how they connect.

use anyhow::Result;
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use spine_core::AgentName;

use super::{print_json, Workspace};

#[derive(Args, Debug)]
pub struct AgentsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct AgentRow {
    #[tabled(rename = "agent")]
    agent: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "capabilities")]
    capabilities: String,
    #[tabled(rename = "upstream")]
    upstream: String,
    #[tabled(rename = "downstream")]
    downstream: String,
}

impl AgentsArgs {
    pub fn run(self) -> Result<()> {
        let ws = Workspace::open()?;
        let registry = ws.registry()?;

        if self.json {
            return print_json(registry.all());
        }

        let rows: Vec<AgentRow> = registry
            .all()
            .iter()
            .map(|c| AgentRow {
                agent: c.agent_name.to_string(),
                role: c.role.clone(),
                capabilities: c.capabilities.join(", "),
                upstream: join_names(&c.upstream_agents),
                downstream: join_names(&c.downstream_agents),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("default agent: {}", ws.config.default_agent);
        Ok(())
    }
}

fn join_names(names: &[AgentName]) -> String {
    if names.is_empty() {
        return "-".to_owned();
    }
    names.iter().map(AgentName::as_str).collect::<Vec<_>>().join(", ")
}

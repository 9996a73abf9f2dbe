//! `spine handoffs|decisions|log <project>`: a project's recorded history.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use spine_core::{Decision, Handoff, Impact, NarrativeEntry};

use super::{excerpt, print_json, project::format_time, Workspace};

#[derive(Args, Debug)]
pub struct HandoffsArgs {
    /// Project id or name.
    pub project: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DecisionsArgs {
    /// Project id or name.
    pub project: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Project id or name.
    pub project: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct HandoffRow {
    #[tabled(rename = "#")]
    seq: usize,
    #[tabled(rename = "from")]
    from: String,
    #[tabled(rename = "to")]
    to: String,
    #[tabled(rename = "summary")]
    summary: String,
    #[tabled(rename = "artifacts")]
    artifacts: usize,
    #[tabled(rename = "at")]
    at: String,
}

impl HandoffsArgs {
    pub fn run(self) -> Result<()> {
        let ws = Workspace::open()?;
        let project = ws.resolve_project(&self.project)?;
        let handoffs: Vec<Handoff> = ws
            .spine
            .list_by_project(&project.id)
            .with_context(|| format!("failed to read handoffs of '{}'", project.name))?;

        if self.json {
            return print_json(&handoffs);
        }
        if handoffs.is_empty() {
            println!("No handoffs recorded for '{}'.", project.name);
            return Ok(());
        }

        let rows: Vec<HandoffRow> = handoffs
            .iter()
            .enumerate()
            .map(|(i, h)| HandoffRow {
                seq: i + 1,
                from: h.from_agent.to_string(),
                to: h
                    .to_agent
                    .as_ref()
                    .map_or_else(|| "(end)".to_owned(), ToString::to_string),
                summary: excerpt(&h.summary, 60),
                artifacts: h.artifacts.len(),
                at: format_time(h.timestamp),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

#[derive(Tabled)]
struct DecisionRow {
    #[tabled(rename = "impact")]
    impact: String,
    #[tabled(rename = "author")]
    author: String,
    #[tabled(rename = "context")]
    context: String,
    #[tabled(rename = "chosen")]
    chosen: String,
    #[tabled(rename = "reversible")]
    reversible: &'static str,
}

impl DecisionsArgs {
    pub fn run(self) -> Result<()> {
        let ws = Workspace::open()?;
        let project = ws.resolve_project(&self.project)?;
        let decisions: Vec<Decision> = ws
            .spine
            .list_by_project(&project.id)
            .with_context(|| format!("failed to read decisions of '{}'", project.name))?;

        if self.json {
            return print_json(&decisions);
        }
        if decisions.is_empty() {
            println!("No decisions recorded for '{}'.", project.name);
            return Ok(());
        }

        let rows: Vec<DecisionRow> = decisions
            .iter()
            .map(|d| DecisionRow {
                impact: impact_label(d.impact),
                author: d.author.to_string(),
                context: excerpt(&d.context, 50),
                chosen: excerpt(&d.chosen_option, 40),
                reversible: if d.reversible { "yes" } else { "no" },
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn impact_label(impact: Impact) -> String {
    match impact {
        Impact::Low => impact.as_str().bright_black().to_string(),
        Impact::Medium => impact.as_str().normal().to_string(),
        Impact::High => impact.as_str().yellow().bold().to_string(),
        Impact::Critical => impact.as_str().red().bold().to_string(),
    }
}

impl LogArgs {
    pub fn run(self) -> Result<()> {
        let ws = Workspace::open()?;
        let project = ws.resolve_project(&self.project)?;
        let entries = ws
            .spine
            .read_narrative(&project.id)
            .context("failed to open continuity log")?;

        if self.json {
            let entries: Vec<NarrativeEntry> = entries
                .collect::<Result<_, _>>()
                .context("failed to read continuity log")?;
            return print_json(&entries);
        }

        println!("{}", format!("Continuity log: {}", project.name).bold());
        for entry in entries {
            let entry = entry.context("failed to read continuity log")?;
            println!(
                "{} {} {}",
                format_time(entry.timestamp).bright_black(),
                format!("[{}]", entry.author).cyan(),
                entry.text
            );
        }
        Ok(())
    }
}

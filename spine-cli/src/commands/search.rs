//! `spine search <query> [--project <project>]`

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use super::{excerpt, print_json, Workspace};

/// Case-insensitive search over artifact content.
#[derive(Args, Debug)]
pub struct SearchArgs {
    pub query: String,

    /// Limit the search to one project (id or name).
    #[arg(long, short = 'p')]
    pub project: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn run(self) -> Result<()> {
        if self.query.trim().is_empty() {
            bail!("search query must not be empty");
        }
        let ws = Workspace::open()?;
        let project = self
            .project
            .as_deref()
            .map(|key| ws.resolve_project(key))
            .transpose()?;
        let hits = ws
            .spine
            .search_artifacts(&self.query, project.as_ref().map(|p| &p.id))
            .context("artifact search failed")?;

        if self.json {
            return print_json(&hits);
        }
        if hits.is_empty() {
            println!("No artifacts match '{}'.", self.query);
            return Ok(());
        }
        for artifact in &hits {
            println!(
                "{} {} {}",
                artifact.reference().bold(),
                format!("[{}]", artifact.artifact_type).cyan(),
                excerpt(&artifact.content, 70)
            );
        }
        println!("{} match(es)", hits.len());
        Ok(())
    }
}

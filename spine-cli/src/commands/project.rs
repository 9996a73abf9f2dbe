//! `spine project create|list|status|set-status`

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use spine_core::{Metadata, NarrativeEntry, Project, ProjectStatus};

use super::{excerpt, print_json, status_label, Workspace, OPERATOR};

/// Create, list and inspect projects.
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project and open its continuity log.
    Create(CreateArgs),

    /// List every project in the store.
    List(ListArgs),

    /// Show one project's record counts and latest log entries.
    Status(StatusArgs),

    /// Change a project's lifecycle status.
    SetStatus(SetStatusArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Human-readable project name.
    pub name: String,

    /// What the project is for.
    #[arg(long, short = 'm')]
    pub mission: String,

    /// Extra metadata as KEY=VALUE; repeatable.
    #[arg(long = "meta", value_name = "KEY=VALUE")]
    pub meta: Vec<String>,

    /// Emit the created project as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Project id or name.
    pub project: String,

    /// Number of recent log entries to show.
    #[arg(long, default_value_t = 5)]
    pub tail: usize,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct SetStatusArgs {
    /// Project id or name.
    pub project: String,

    /// active | paused | completed
    pub status: ProjectStatus,
}

pub fn run(cmd: ProjectCommand) -> Result<()> {
    match cmd {
        ProjectCommand::Create(args) => create(args),
        ProjectCommand::List(args) => list(args),
        ProjectCommand::Status(args) => status(args),
        ProjectCommand::SetStatus(args) => set_status(args),
    }
}

fn create(args: CreateArgs) -> Result<()> {
    if args.name.trim().is_empty() {
        bail!("project name must not be empty");
    }
    let metadata = parse_meta(&args.meta)?;
    let ws = Workspace::open()?;

    let mut project = Project::new(args.name, args.mission);
    project.metadata = metadata;
    ws.spine
        .create_project(&project)
        .with_context(|| format!("failed to create project '{}'", project.name))?;
    ws.spine
        .append_narrative(&project.id, project.initiated_note(), OPERATOR, project.created_at)
        .context("failed to write continuity log")?;
    tracing::info!(project = %project.id, name = %project.name, "project created");

    if args.json {
        return print_json(&project);
    }
    println!("✓ Created project '{}'", project.name);
    println!("  id: {}", project.id);
    Ok(())
}

fn parse_meta(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("invalid --meta '{pair}'; expected KEY=VALUE");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid --meta '{pair}'; key is empty");
        }
        metadata.insert(key.to_owned(), value.trim().into());
    }
    Ok(metadata)
}

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "artifacts")]
    artifacts: usize,
    #[tabled(rename = "decisions")]
    decisions: usize,
    #[tabled(rename = "handoffs")]
    handoffs: usize,
    #[tabled(rename = "updated")]
    updated: String,
}

fn list(args: ListArgs) -> Result<()> {
    let ws = Workspace::open()?;
    let mut projects = ws.spine.list_projects().context("failed to list projects")?;
    projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));

    if args.json {
        return print_json(&projects);
    }
    if projects.is_empty() {
        println!("No projects yet.");
        println!("Run: spine project create <name> --mission <text>");
        return Ok(());
    }

    let rows: Vec<ProjectRow> = projects
        .iter()
        .map(|p| ProjectRow {
            id: p.id.to_string(),
            name: p.name.clone(),
            status: status_label(p.status).to_string(),
            artifacts: p.artifacts.len(),
            decisions: p.decisions.len(),
            handoffs: p.handoffs.len(),
            updated: format_time(p.updated_at),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

#[derive(Serialize)]
struct ProjectStatusJson<'a> {
    project: &'a Project,
    recent_log: &'a [NarrativeEntry],
}

fn status(args: StatusArgs) -> Result<()> {
    let ws = Workspace::open()?;
    let project = ws.resolve_project(&args.project)?;
    let log: Vec<NarrativeEntry> = ws
        .spine
        .read_narrative(&project.id)
        .context("failed to open continuity log")?
        .collect::<Result<_, _>>()
        .context("failed to read continuity log")?;
    let recent = &log[log.len().saturating_sub(args.tail)..];

    if args.json {
        return print_json(&ProjectStatusJson {
            project: &project,
            recent_log: recent,
        });
    }

    println!("{} [{}]", project.name.bold(), status_label(project.status));
    println!("  id:       {}", project.id);
    println!("  mission:  {}", project.mission);
    println!("  created:  {}", format_time(project.created_at));
    println!("  updated:  {}", format_time(project.updated_at));
    println!(
        "  records:  {} artifacts, {} decisions, {} handoffs",
        project.artifacts.len(),
        project.decisions.len(),
        project.handoffs.len()
    );
    if !recent.is_empty() {
        println!("  recent log:");
        for entry in recent {
            println!(
                "    {} {} {}",
                format_time(entry.timestamp).bright_black(),
                entry.author.cyan(),
                excerpt(&entry.text, 80)
            );
        }
    }
    Ok(())
}

fn set_status(args: SetStatusArgs) -> Result<()> {
    let ws = Workspace::open()?;
    let project = ws.resolve_project(&args.project)?;
    if project.status == args.status {
        println!("'{}' is already {}", project.name, status_label(args.status));
        return Ok(());
    }
    let updated = ws
        .spine
        .set_project_status(&project.id, args.status)
        .with_context(|| format!("failed to update project '{}'", project.name))?;
    ws.spine
        .append_narrative(
            &updated.id,
            format!("Status set to {}", args.status),
            OPERATOR,
            updated.updated_at,
        )
        .context("failed to write continuity log")?;
    println!("✓ '{}' is now {}", updated.name, status_label(updated.status));
    Ok(())
}

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

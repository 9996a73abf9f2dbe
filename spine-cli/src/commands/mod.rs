pub mod agents;
pub mod history;
pub mod init;
pub mod project;
pub mod route;
pub mod search;

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use colored::{ColoredString, Colorize};
use spine_core::{
    config, ContractRegistry, FsStore, Project, ProjectId, ProjectStatus, Spine, SpineConfig,
    StoreError,
};

/// Narrative author for changes made from the command line.
pub const OPERATOR: &str = "operator";

/// Config and record store resolved from the user's home directory.
pub struct Workspace {
    pub config: SpineConfig,
    pub spine: Spine,
}

impl Workspace {
    pub fn open() -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load ~/.spine/config.yaml")?;
        let root = config.store_root_at(&home);
        let store = FsStore::open(&root)
            .with_context(|| format!("failed to open record store at '{}'", root.display()))?;
        let spine = Spine::new(Arc::new(store)).with_retry(config.retry.clone());
        Ok(Self { config, spine })
    }

    pub fn registry(&self) -> Result<ContractRegistry> {
        ContractRegistry::bootstrap(&self.config).context("failed to load agent contracts")
    }

    /// Look `key` up as a project id, then as a project name.
    pub fn resolve_project(&self, key: &str) -> Result<Project> {
        match self.spine.get_project(&ProjectId::from(key)) {
            Ok(project) => return Ok(project),
            Err(err) if err.is_not_found() || matches!(err, StoreError::InvalidId(_)) => {}
            Err(err) => return Err(err).with_context(|| format!("failed to read project '{key}'")),
        }

        let mut matches: Vec<Project> = self
            .spine
            .list_projects()
            .context("failed to list projects")?
            .into_iter()
            .filter(|p| p.name == key)
            .collect();
        match matches.len() {
            0 => Err(anyhow!(
                "no project with id or name '{key}'. Run `spine project list` to see projects."
            )),
            1 => Ok(matches.remove(0)),
            n => bail!("{n} projects are named '{key}'; pass the project id instead"),
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}

pub fn status_label(status: ProjectStatus) -> ColoredString {
    match status {
        ProjectStatus::Active => status.as_str().green().bold(),
        ProjectStatus::Paused => status.as_str().yellow().bold(),
        ProjectStatus::Completed => status.as_str().bright_black().bold(),
    }
}

/// First line of `text`, cut to `max` characters.
pub fn excerpt(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= max {
        return line.to_owned();
    }
    let cut: String = line.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::excerpt;

    #[test]
    fn excerpt_keeps_first_line_and_truncates() {
        assert_eq!(excerpt("short\nsecond line", 20), "short");
        assert_eq!(excerpt("abcdefghij", 5), "abcd…");
        assert_eq!(excerpt("", 5), "");
    }
}

//! `spine init [--store <dir>] [--max-chain-depth <n>] [--default-agent <name>] ...`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use spine_core::{config, AgentName, ContractRegistry, FsStore, Spine, SpineConfig};

/// Write the Spine configuration and create the record store.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Record store directory. Defaults to ~/.spine/store.
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,

    /// Handoffs allowed in one chain before the orchestrator stops it.
    #[arg(long, value_name = "N")]
    pub max_chain_depth: Option<usize>,

    /// Agent that receives tasks no routing rule matches.
    #[arg(long, value_name = "AGENT")]
    pub default_agent: Option<String>,

    /// YAML list of extra agent contracts registered after the built-ins.
    #[arg(long, value_name = "FILE")]
    pub contracts: Option<PathBuf>,

    /// Directory of `.tera` files overriding the built-in role prompts.
    #[arg(long, value_name = "DIR")]
    pub templates: Option<PathBuf>,

    /// Overwrite an existing config.yaml.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let path = config::config_path(&home);

        let existing = path.exists() && !self.force;
        let config = if existing {
            config::load_at(&home).context("failed to load existing config")?
        } else {
            let mut config = SpineConfig::default();
            if let Some(store) = self.store {
                config.store_root = Some(absolute(store)?);
            }
            if let Some(depth) = self.max_chain_depth {
                config.max_chain_depth = depth;
            }
            if let Some(agent) = self.default_agent {
                config.default_agent = AgentName::from(agent);
            }
            if let Some(contracts) = self.contracts {
                config.contracts_file = Some(absolute(contracts)?);
            }
            if let Some(templates) = self.templates {
                config.templates_dir = Some(absolute(templates)?);
            }
            config
        };

        // Fail before writing anything if the contracts don't hold together.
        let registry = ContractRegistry::bootstrap(&config).context("invalid agent contracts")?;

        if existing {
            println!("Config already present at {} (use --force to overwrite)", path.display());
        } else {
            config::save_at(&home, &config).context("failed to write config")?;
            println!("✓ Wrote {}", path.display());
        }

        let root = config.store_root_at(&home);
        let store = FsStore::open(&root)
            .with_context(|| format!("failed to create record store at '{}'", root.display()))?;
        let spine = Spine::new(Arc::new(store)).with_retry(config.retry.clone());
        let stored = spine
            .put_contracts(&registry)
            .context("failed to store agent contracts")?;

        println!("✓ Record store ready at {}", root.display());
        println!("  {stored} agent contracts registered");
        Ok(())
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("cannot resolve current directory")?;
    Ok(cwd.join(path))
}

//! `standup init --store-url <url> --team <team> --name <name>`

use anyhow::{bail, Context, Result};
use clap::Args;

use standup_core::{local, StandupConfig, TeamName, WriterName};

use super::{home_dir, Overrides};

/// Write the client configuration.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Base URL of the repository contents API, e.g.
    /// https://api.github.com/repos/acme/standups/contents
    #[arg(long)]
    pub store_url: String,

    /// Your name as it appears on status records.
    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Directory inside the repository holding the records.
    #[arg(long, default_value = "standups")]
    pub data_dir: String,

    /// Access token. $STANDUP_TOKEN takes precedence when set.
    #[arg(long)]
    pub token: Option<String>,

    /// Seconds between refreshes in `standup watch`.
    #[arg(long, default_value_t = 30)]
    pub poll_secs: u64,

    /// Overwrite an existing config.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// The team comes from the global `--team` flag.
    pub fn run(self, overrides: &Overrides) -> Result<()> {
        let Some(team) = overrides.team.as_deref() else {
            bail!("--team is required for init");
        };
        let home = home_dir()?;
        let path = local::config_path_at(&home);
        if path.exists() && !self.force {
            bail!(
                "config already exists at {}; pass --force to overwrite",
                path.display()
            );
        }
        if self.name.trim().is_empty() || team.trim().is_empty() {
            bail!("--name and --team must not be empty");
        }

        let mut config = StandupConfig::new(
            self.store_url,
            TeamName::from(team.trim()),
            WriterName::from(self.name.trim()),
        );
        config.branch = self.branch;
        config.data_dir = self.data_dir;
        config.token = self.token;
        config.poll_interval_secs = self.poll_secs.max(1);

        local::save_config_at(&home, &config)
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!(
            "✓ Configured '{}' on team '{}'",
            config.writer, config.team
        );
        println!("  Saved to: {}", path.display());
        if config.resolved_token().is_none() {
            println!("  No token set; reads may work but writes need --token or $STANDUP_TOKEN");
        }
        Ok(())
    }
}

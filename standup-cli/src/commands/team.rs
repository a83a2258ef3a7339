//! `standup team create|list|unlock|forget`

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use colored::Colorize;

use standup_core::{local, TeamName};
use standup_sync::{CycleOutcome, SyncError};

use super::{Context, Overrides};

#[derive(Subcommand, Debug)]
pub enum TeamCommand {
    /// Register a team. Without a passphrase the team is open.
    Create {
        name: String,
        #[arg(long)]
        passphrase: Option<String>,
    },

    /// List every team known to the store.
    List,

    /// Check a passphrase against the registry and remember it locally.
    Unlock { name: String, passphrase: String },

    /// Drop the remembered passphrase for a team.
    Forget { name: String },
}

pub fn run(command: TeamCommand, overrides: &Overrides) -> Result<()> {
    let ctx = Context::load(overrides)?;
    match command {
        TeamCommand::Create { name, passphrase } => create(&ctx, &name, passphrase.as_deref()),
        TeamCommand::List => list(&ctx),
        TeamCommand::Unlock { name, passphrase } => unlock(&ctx, &name, &passphrase),
        TeamCommand::Forget { name } => {
            let team = TeamName::from(name.trim());
            let removed = local::forget_passphrase_at(&ctx.home, &team)
                .context("failed to update the passphrase cache")?;
            if removed {
                println!("✓ Forgot passphrase for '{team}'");
            } else {
                println!("No passphrase remembered for '{team}'");
            }
            Ok(())
        }
    }
}

fn create(ctx: &Context, name: &str, passphrase: Option<&str>) -> Result<()> {
    let team = TeamName::from(name.trim());
    let entry = ctx
        .coordinator()?
        .create_team(&team, passphrase, &ctx.config.writer)
        .with_context(|| format!("failed to create team '{team}'"))?;

    if entry.is_open() {
        println!("✓ Created open team '{team}'");
    } else {
        if let Some(passphrase) = passphrase {
            local::remember_passphrase_at(&ctx.home, &team, passphrase)
                .context("failed to remember passphrase")?;
        }
        println!("✓ Created protected team '{team}'");
    }
    Ok(())
}

fn list(ctx: &Context) -> Result<()> {
    let engine = ctx.engine(ctx.store()?)?;
    let outcome = engine
        .run_cycle()
        .context("failed to list teams from the store")?;
    let active = match &outcome {
        CycleOutcome::Locked { team, .. } => Some(team),
        _ => None,
    };

    let teams = engine.teams();
    if teams.is_empty() {
        println!("No teams yet. Create one with `standup team create <name>`.");
        return Ok(());
    }
    for team in teams {
        let marker = if team == *ctx.team() { "*" } else { " " };
        if Some(&team) == active {
            println!("{marker} {team} {}", "(locked)".yellow());
        } else {
            println!("{marker} {team}");
        }
    }
    Ok(())
}

fn unlock(ctx: &Context, name: &str, passphrase: &str) -> Result<()> {
    let team = TeamName::from(name.trim());
    match ctx.coordinator()?.verify_passphrase(&team, Some(passphrase)) {
        Ok(()) => {}
        Err(SyncError::PassphraseMismatch { .. }) => bail!("wrong passphrase for team '{team}'"),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to check passphrase for '{team}'"))
        }
    }
    local::remember_passphrase_at(&ctx.home, &team, passphrase)
        .context("failed to remember passphrase")?;
    println!("✓ Unlocked '{team}'");
    Ok(())
}

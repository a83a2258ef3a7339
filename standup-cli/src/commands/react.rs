//! `standup react <writer> <emoji>`

use anyhow::{Context as _, Result};
use clap::Args;

use standup_core::{RecordKey, WriterName};

use super::{Context, Overrides};

/// Toggle a reaction on a teammate's status for the session.
#[derive(Args, Debug)]
pub struct ReactArgs {
    /// Writer whose status you are reacting to.
    pub writer: String,

    /// Any emoji or short label.
    pub emoji: String,
}

impl ReactArgs {
    pub fn run(self, overrides: &Overrides) -> Result<()> {
        let ctx = Context::load(overrides)?;
        let owner = ctx.own_key();
        let target = RecordKey {
            team: owner.team.clone(),
            writer: WriterName::from(self.writer.trim()),
            session: owner.session.clone(),
        };
        let on = ctx
            .coordinator()?
            .toggle_reaction(&owner, &target, &self.emoji)
            .with_context(|| format!("failed to react to {target}"))?;

        if on {
            println!("✓ Reacted {} to '{}'", self.emoji, target.writer);
        } else {
            println!("✓ Removed {} from '{}'", self.emoji, target.writer);
        }
        Ok(())
    }
}

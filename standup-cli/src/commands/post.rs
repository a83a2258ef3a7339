//! `standup post [--feeling N] [--productivity N] <update...>`

use anyhow::{Context as _, Result};
use clap::Args;

use super::{Context, Overrides};

/// Save your status for the session. Existing reactions are kept.
#[derive(Args, Debug)]
pub struct PostArgs {
    /// How you feel, 0 to 10.
    #[arg(long, short = 'f', value_parser = clap::value_parser!(u8).range(0..=10))]
    pub feeling: Option<u8>,

    /// How productive you have been, 0 to 10.
    #[arg(long, short = 'p', value_parser = clap::value_parser!(u8).range(0..=10))]
    pub productivity: Option<u8>,

    /// Free-form update text.
    #[arg(trailing_var_arg = true)]
    pub update: Vec<String>,
}

impl PostArgs {
    pub fn run(self, overrides: &Overrides) -> Result<()> {
        let ctx = Context::load(overrides)?;
        let key = ctx.own_key();
        let update = self.update.join(" ");
        let outcome = ctx
            .coordinator()?
            .save_status(&key, self.feeling, self.productivity, update.trim())
            .with_context(|| format!("failed to save status for {key}"))?;

        let verb = if outcome.created { "Posted" } else { "Updated" };
        println!("✓ {verb} status for '{}' in {} ({})", key.writer, key.team, key.session);
        if outcome.attempts > 1 {
            println!("  Merged with a concurrent change");
        }
        Ok(())
    }
}

//! `standup delete [--writer <name>] [--passphrase <p>]`

use anyhow::{Context as _, Result};
use clap::Args;

use standup_core::WriterName;

use super::{Context, Overrides};

/// Remove a status record from the session.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Whose record to delete; defaults to your own.
    #[arg(long)]
    pub writer: Option<String>,

    /// Team passphrase; the remembered one is used when omitted.
    #[arg(long)]
    pub passphrase: Option<String>,
}

impl DeleteArgs {
    pub fn run(self, overrides: &Overrides) -> Result<()> {
        let ctx = Context::load(overrides)?;
        let mut key = ctx.own_key();
        if let Some(writer) = self.writer.as_deref() {
            key.writer = WriterName::from(writer.trim());
        }
        let passphrase = match self.passphrase {
            Some(p) => Some(p),
            None => ctx.cached_passphrase()?,
        };

        ctx.coordinator()?
            .delete_record(&key, passphrase.as_deref())
            .with_context(|| format!("failed to delete {key}"))?;
        println!("✓ Deleted status for '{}' in {} ({})", key.writer, key.team, key.session);
        Ok(())
    }
}

//! `standup speaker show|next|done|reset`
//!
//! The queue lives in `~/.standup/speaker/` and is never pushed to the store.

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use colored::Colorize;

use standup_core::{local, SpeakerQueue, WriterName};
use standup_sync::CycleOutcome;

use super::{locked_hint, Context, Overrides};

#[derive(Subcommand, Debug)]
pub enum SpeakerCommand {
    /// Print who is speaking, who is next and who has spoken.
    Show,

    /// Finish the current speaker and pick the next one at random.
    Next {
        /// Comma-separated roster to use instead of the session's writers.
        #[arg(long, value_delimiter = ',')]
        roster: Option<Vec<String>>,
    },

    /// Finish the current speaker without picking a new one.
    Done,

    /// Forget everything and start over.
    Reset,
}

pub fn run(command: SpeakerCommand, overrides: &Overrides) -> Result<()> {
    let ctx = Context::load(overrides)?;
    let team = ctx.team().clone();
    let session = ctx.session();
    let mut queue = local::load_speaker_at(&ctx.home, &team, &session)
        .context("failed to load speaker queue")?;

    match command {
        SpeakerCommand::Show => {
            print_queue(&queue);
            return Ok(());
        }
        SpeakerCommand::Next { roster } => {
            let roster = match roster {
                Some(names) => names
                    .iter()
                    .map(|n| n.trim())
                    .filter(|n| !n.is_empty())
                    .map(WriterName::from)
                    .collect(),
                None => session_roster(&ctx)?,
            };
            queue.next_speaker(&roster, &mut rand::thread_rng());
            if queue.is_exhausted(&roster) {
                println!("{}", "Everyone has spoken.".green());
            }
        }
        SpeakerCommand::Done => queue.finish_current(),
        SpeakerCommand::Reset => queue.reset(),
    }

    local::save_speaker_at(&ctx.home, &team, &session, &queue)
        .context("failed to save speaker queue")?;
    print_queue(&queue);
    Ok(())
}

/// Writers with a record in the active session.
fn session_roster(ctx: &Context) -> Result<Vec<WriterName>> {
    match ctx.sync_once()? {
        CycleOutcome::Published(snapshot) => Ok(snapshot.writers),
        CycleOutcome::Locked { team, .. } => bail!(locked_hint(&team)),
        CycleOutcome::Skipped => bail!("a sync is already running; try again shortly"),
    }
}

fn print_queue(queue: &SpeakerQueue) {
    if !queue.is_started() {
        println!("Speaker queue not started. Run `standup speaker next`.");
        return;
    }
    match &queue.speaking_now {
        Some(writer) => println!("{} {}", "Speaking:".bold(), writer.to_string().cyan()),
        None => println!("{} nobody", "Speaking:".bold()),
    }
    let up_next: Vec<&str> = queue
        .ready_order
        .iter()
        .filter(|w| Some(*w) != queue.speaking_now.as_ref())
        .map(|w| w.as_str())
        .collect();
    println!("{} {}", "Up next:".bold(), list_or_dash(&up_next));
    let spoken: Vec<&str> = queue.spoken.iter().map(|w| w.as_str()).collect();
    println!("{} {}", "Spoken:".bold(), list_or_dash(&spoken).bright_black());
}

fn list_or_dash(names: &[&str]) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

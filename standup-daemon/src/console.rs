//! Line commands read while a watch session is running.
//!
//! ```text
//! react <writer> <emoji>   toggle a reaction on <writer>'s status
//! sync                     refresh now
//! quit                     stop watching
//! ```

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use standup_core::{RecordKey, WriterName};
use standup_sync::ObjectStore;

use crate::debounce::ReactionDebouncer;
use crate::error::{io_err, DaemonError};
use crate::runtime::DaemonHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    React { writer: WriterName, emoji: String },
    Sync,
    Quit,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why [`serve`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Quit,
    InputClosed,
    Shutdown,
}

pub const HELP: &str = "commands: react <writer> <emoji> | sync | quit";

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "react" | "r" => {
            let (Some(writer), Some(emoji), None) = (words.next(), words.next(), words.next())
            else {
                return Err(ParseError("usage: react <writer> <emoji>".to_string()));
            };
            ConsoleCommand::React {
                writer: WriterName::from(writer),
                emoji: emoji.to_string(),
            }
        }
        "sync" | "s" => ConsoleCommand::Sync,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        "help" | "?" => ConsoleCommand::Help,
        other => return Err(ParseError(format!("unknown command '{other}'; {HELP}"))),
    };
    Ok(Some(command))
}

/// Serve commands from `input` until it ends, `quit` is read or the loop
/// shuts down. Pending reactions are flushed before returning.
pub async fn serve<S, R>(
    input: R,
    debouncer: &ReactionDebouncer<S>,
    handle: &DaemonHandle,
) -> Result<ConsoleExit, DaemonError>
where
    S: ObjectStore + 'static,
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut shutdown_rx = handle.shutdown_signal();
    let reports = handle.subscribe();

    let exit = loop {
        let line = tokio::select! {
            _ = shutdown_rx.recv() => break ConsoleExit::Shutdown,
            line = lines.next_line() => line.map_err(|e| io_err("console input", e))?,
        };
        let Some(line) = line else {
            break ConsoleExit::InputClosed;
        };

        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::React { writer, emoji })) => {
                let owner = debouncer.owner();
                let target = RecordKey {
                    team: owner.team.clone(),
                    writer,
                    session: owner.session.clone(),
                };
                // The cache holds our last write even while cycles fail.
                let currently_set = debouncer
                    .known_flag(&target, &emoji)
                    .or_else(|| {
                        reports
                            .borrow()
                            .as_ref()
                            .and_then(|report| report.snapshot())
                            .and_then(|snapshot| snapshot.record_for(&owner.writer))
                            .map(|record| record.reactions.is_set(&target.to_string(), &emoji))
                    })
                    .unwrap_or(false);
                let on = debouncer.toggle(&target, &emoji, currently_set);
                tracing::info!(record = %target, emoji = %emoji, on, "reaction queued");
            }
            Ok(Some(ConsoleCommand::Sync)) => handle.request_resync("console"),
            Ok(Some(ConsoleCommand::Quit)) => break ConsoleExit::Quit,
            Ok(Some(ConsoleCommand::Help)) => tracing::info!("{HELP}"),
            Err(err) => tracing::warn!("{err}"),
        }
    };

    debouncer.flush().await;
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("   ").expect("blank"), None);
        assert_eq!(
            parse_command("react Bob 🎉").expect("react"),
            Some(ConsoleCommand::React {
                writer: WriterName::from("Bob"),
                emoji: "🎉".to_string(),
            })
        );
        assert_eq!(parse_command("SYNC").expect("sync"), Some(ConsoleCommand::Sync));
        assert_eq!(parse_command("q").expect("quit"), Some(ConsoleCommand::Quit));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_command("react Bob").is_err());
        assert!(parse_command("react Bob 🎉 extra").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn quit_flushes_pending_reactions() {
        use std::sync::Arc;

        use standup_sync::{CachedStore, MemoryStore, WriteCoordinator};

        use crate::runtime::channels;

        let coord =
            WriteCoordinator::new(Arc::new(CachedStore::new(MemoryStore::new())), "standups");
        let (handle, mut inbox) = channels();
        let owner = RecordKey::new("core", "Ada", "2024-05-01");
        let debouncer = ReactionDebouncer::new(coord.clone(), owner.clone(), handle.clone());

        let script = "react Bob 🎉\nbogus\n\nsync\nquit\nreact Cy x\n";
        let input = tokio::io::BufReader::new(script.as_bytes());
        let exit = serve(input, &debouncer, &handle).await.expect("serve");
        assert_eq!(exit, ConsoleExit::Quit);

        let record = coord.load_record(&owner).expect("load").expect("written");
        let bob = RecordKey::new("core", "Bob", "2024-05-01");
        assert!(record.reactions.is_set(&bob.to_string(), "🎉"));
        assert_eq!(record.reactions.flags.len(), 1);

        let mut sources = Vec::new();
        while let Ok(source) = inbox.resync_rx.try_recv() {
            sources.push(source);
        }
        assert_eq!(sources, vec!["console", "reactions"]);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn react_twice_clears_the_flag_without_a_published_report() {
        use std::sync::Arc;

        use standup_sync::{CachedStore, MemoryStore, WriteCoordinator};

        use crate::runtime::channels;

        let coord =
            WriteCoordinator::new(Arc::new(CachedStore::new(MemoryStore::new())), "standups");
        let (handle, _inbox) = channels();
        let owner = RecordKey::new("core", "Ada", "2024-05-01");
        let bob = RecordKey::new("core", "Bob", "2024-05-01").to_string();
        let debouncer = ReactionDebouncer::new(coord.clone(), owner.clone(), handle.clone());

        let input = || tokio::io::BufReader::new(&b"react Bob x\n"[..]);
        serve(input(), &debouncer, &handle).await.expect("first");
        let record = coord.load_record(&owner).expect("load").expect("written");
        assert!(record.reactions.is_set(&bob, "x"));

        serve(input(), &debouncer, &handle).await.expect("second");
        let record = coord.load_record(&owner).expect("load").expect("written");
        assert!(!record.reactions.is_set(&bob, "x"));
        assert!(handle.subscribe().borrow().is_none());
    }

    #[tokio::test]
    async fn end_of_input_is_not_a_quit() {
        use std::sync::Arc;

        use standup_sync::{CachedStore, MemoryStore, WriteCoordinator};

        use crate::runtime::channels;

        let coord =
            WriteCoordinator::new(Arc::new(CachedStore::new(MemoryStore::new())), "standups");
        let (handle, _inbox) = channels();
        let debouncer = ReactionDebouncer::new(
            coord,
            RecordKey::new("core", "Ada", "2024-05-01"),
            handle.clone(),
        );
        let exit = serve(tokio::io::BufReader::new(&b""[..]), &debouncer, &handle)
            .await
            .expect("serve");
        assert_eq!(exit, ConsoleExit::InputClosed);
    }
}

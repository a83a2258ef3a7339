//! `standup watch`: poll and print until ctrl-c or `quit`.
//!
//! Without a fixed session, polling follows the UTC date across midnight.
//! Reactions typed into the console stay on the session the watch started in.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;

use standup_daemon::{start_blocking, CycleReport, CycleStatus, Session};
use standup_sync::WriteCoordinator;

use super::status::print_snapshot;
use super::{locked_hint, Context, Overrides};

/// Arguments for `standup watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Print each refresh as one JSON line instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Emit logs on stderr as JSON.
    #[arg(long)]
    pub json_logs: bool,
}

impl WatchArgs {
    pub fn run(self, overrides: &Overrides) -> Result<()> {
        let ctx = Context::load(overrides)?;
        let store = ctx.store()?;
        let engine = Arc::new(ctx.engine(Arc::clone(&store))?);
        let session = Session {
            engine,
            coordinator: WriteCoordinator::new(store, ctx.config.data_dir.clone()),
            owner: ctx.own_key(),
        };

        if !self.json {
            println!(
                "Watching {} ({}). Type `react <writer> <emoji>`, `sync` or `quit`.",
                ctx.team(),
                ctx.session()
            );
        }
        let json = self.json;
        start_blocking(session, self.json_logs, move |report| {
            print_report(report, json)
        })
        .context("watch session failed")
    }
}

fn print_report(report: &CycleReport, json: bool) {
    if json {
        match report.to_json_line() {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("failed to serialize report: {err}"),
        }
        return;
    }
    match &report.status {
        CycleStatus::Published { snapshot } => {
            println!();
            print_snapshot(snapshot);
        }
        CycleStatus::Locked { team, .. } => println!("{}", locked_hint(team).yellow()),
        CycleStatus::Skipped => {}
        CycleStatus::RateLimited { message } => println!(
            "{} {message}; retrying in {}s",
            "Rate limited:".yellow(),
            report.next_delay_ms / 1000
        ),
        CycleStatus::Failed { message } => println!("{} {message}", "Sync failed:".red()),
    }
}

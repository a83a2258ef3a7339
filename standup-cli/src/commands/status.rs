//! `standup status`: one sync cycle, printed as a table or JSON.

use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use standup_core::{StatusRecord, TeamName};
use standup_sync::{CycleOutcome, LockReason, Snapshot};

use super::{locked_hint, Context, Overrides};

/// Arguments for `standup status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, overrides: &Overrides) -> Result<()> {
        let ctx = Context::load(overrides)?;
        match ctx.sync_once()? {
            CycleOutcome::Published(snapshot) => {
                if self.json {
                    let json = serde_json::to_string_pretty(&snapshot)
                        .context("failed to serialize snapshot")?;
                    println!("{json}");
                } else {
                    print_snapshot(&snapshot);
                }
            }
            CycleOutcome::Locked { team, reason } => {
                if self.json {
                    let json = serde_json::to_string_pretty(&LockedJson {
                        locked: &team,
                        reason,
                    })
                    .context("failed to serialize lock state")?;
                    println!("{json}");
                } else {
                    println!("{}", "🔒 Locked".bold());
                    println!("{}", locked_hint(&team).yellow());
                }
            }
            CycleOutcome::Skipped => println!("A sync is already running; try again shortly."),
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct LockedJson<'a> {
    locked: &'a TeamName,
    reason: LockReason,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Writer")]
    writer: String,
    #[tabled(rename = "Feeling")]
    feeling: String,
    #[tabled(rename = "Productivity")]
    productivity: String,
    #[tabled(rename = "Update")]
    update: String,
    #[tabled(rename = "Reactions")]
    reactions: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

/// Header, roster and one row per record.
pub fn print_snapshot(snapshot: &Snapshot) {
    println!(
        "{}",
        format!(
            "Standup {} ({})  {} writer(s)",
            snapshot.team,
            snapshot.session,
            snapshot.writers.len()
        )
        .bold()
    );
    println!("{}", "■".repeat(40).bright_black());

    if snapshot.teams.len() > 1 {
        let names: Vec<&str> = snapshot.teams.iter().map(|t| t.as_str()).collect();
        println!("Teams: {}", names.join(", ").bright_black());
    }

    if snapshot.records.is_empty() {
        println!("No status posted for this session yet.");
        return;
    }

    let rows: Vec<RecordRow> = snapshot
        .records
        .iter()
        .map(|record| record_row(snapshot, record))
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

fn record_row(snapshot: &Snapshot, record: &StatusRecord) -> RecordRow {
    let target = record.key().to_string();
    let reactions = snapshot
        .totals
        .for_target(&target)
        .into_iter()
        .map(|(emoji, count)| format!("{emoji}{count}"))
        .collect::<Vec<_>>()
        .join(" ");
    RecordRow {
        writer: record.writer.to_string(),
        feeling: rating(record.feeling),
        productivity: rating(record.productivity),
        update: record.update.clone(),
        reactions,
        updated: record
            .updated_at
            .map(|at| at.format("%H:%M UTC").to_string())
            .unwrap_or_else(|| "-".to_string()),
    }
}

fn rating(value: Option<u8>) -> String {
    value
        .map(|v| format!("{v}/10"))
        .unwrap_or_else(|| "-".to_string())
}

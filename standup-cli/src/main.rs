//! Standup: asynchronous team status over a shared git-hosted store.
//!
//! # Usage
//!
//! ```text
//! standup init --store-url <url> --team <team> --name <name> [--token <token>]
//! standup status [--json]
//! standup post [--feeling N] [--productivity N] <update...>
//! standup react <writer> <emoji>
//! standup delete [--writer <name>] [--passphrase <p>]
//! standup team create <team> [--passphrase <p>]
//! standup team list
//! standup team unlock <team> <passphrase>
//! standup speaker show|next|done|reset
//! standup watch [--json]
//! ```
//!
//! `--team` and `--session` override the configured team and today's session
//! for any command.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    delete::DeleteArgs, init::InitArgs, post::PostArgs, react::ReactArgs,
    speaker::SpeakerCommand, status::StatusArgs, team::TeamCommand, watch::WatchArgs, Overrides,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "standup",
    version,
    about = "Post and follow team standup status through a shared repository",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write ~/.standup/config.yaml.
    Init(InitArgs),

    /// Fetch the team's records for the session and print them.
    Status(StatusArgs),

    /// Save your own status for the session.
    Post(PostArgs),

    /// Toggle a reaction on a teammate's status.
    React(ReactArgs),

    /// Delete a status record (requires the team passphrase if set).
    Delete(DeleteArgs),

    /// Register teams and manage their passphrases.
    Team {
        #[command(subcommand)]
        command: TeamCommand,
    },

    /// Drive the speaker queue for the session.
    Speaker {
        #[command(subcommand)]
        command: SpeakerCommand,
    },

    /// Poll the store and print every refresh until interrupted.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = cli.overrides;
    match cli.command {
        Commands::Init(args) => args.run(&overrides),
        Commands::Status(args) => args.run(&overrides),
        Commands::Post(args) => args.run(&overrides),
        Commands::React(args) => args.run(&overrides),
        Commands::Delete(args) => args.run(&overrides),
        Commands::Team { command } => commands::team::run(command, &overrides),
        Commands::Speaker { command } => commands::speaker::run(command, &overrides),
        Commands::Watch(args) => args.run(&overrides),
    }
}

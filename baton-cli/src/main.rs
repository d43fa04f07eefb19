//! Baton: recruitment queue bot CLI.
//!
//! # Usage
//!
//! ```text
//! baton init [--token <token>]
//! baton run
//! baton stop
//! baton status
//! baton say --id <id> --name <name> [--admin] <message…>
//! baton show [--status ready|active] [--json]
//! ```

mod commands;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use baton_core::RecruitmentStatus;
use commands::{init::InitArgs, say::SayArgs, show::ShowArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "baton",
    version,
    about = "Track who is ready and who is actively recruiting",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create ~/.baton with a default config and an empty queue.
    Init(InitArgs),

    /// Run the bot in the foreground (registry + gateway socket).
    Run,

    /// Ask a running bot to shut down.
    Stop,

    /// Query a running bot.
    Status,

    /// Send a chat message to the running bot as a member.
    Say(SayArgs),

    /// Render the persisted queue without a running bot.
    Show(ShowArgs),
}

// ---------------------------------------------------------------------------
// Shared status argument, parsed from CLI strings, converts to core type
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `RecruitmentStatus` from CLI args.
#[derive(Debug, Clone, Copy)]
pub struct StatusArg(pub RecruitmentStatus);

impl FromStr for StatusArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<RecruitmentStatus>()
            .map(Self)
            .map_err(|err| err.to_string())
    }
}

impl fmt::Display for StatusArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<StatusArg> for RecruitmentStatus {
    fn from(s: StatusArg) -> Self {
        s.0
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Run => commands::bot::run(),
        Commands::Stop => commands::bot::stop(),
        Commands::Status => commands::bot::status(),
        Commands::Say(args) => args.run(),
        Commands::Show(args) => args.run(),
    }
}

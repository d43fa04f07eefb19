//! `baton show`: read the persisted queue without a running bot.
//!
//! Members are shown by id: names are only known to a running bot. Nothing
//! is created on disk; a missing queue file reads as an empty queue.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use baton_bot::BotConfig;
use baton_core::{registry, EmptyDirectory, RecruitQueue, RecruitmentStatus};

use super::super::StatusArg;

/// Arguments for `baton show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Only list members holding this status (ready | active).
    #[arg(long)]
    pub status: Option<StatusArg>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct QueueJson {
    active: Option<u64>,
    entries: Vec<EntryJson>,
}

#[derive(Serialize)]
struct EntryJson {
    id: u64,
    status: &'static str,
}

#[derive(Tabled)]
struct QueueTableRow {
    #[tabled(rename = "member")]
    member: String,
    #[tabled(rename = "status")]
    status: String,
}

impl ShowArgs {
    pub fn run(self) -> Result<()> {
        let home = super::bot::home()?;
        let config = BotConfig::load_at(&home).context("failed to load config")?;
        let path = config.registry_path_at(&home);
        let queue = registry::read_at(&path, &EmptyDirectory)
            .with_context(|| format!("failed to load queue at {}", path.display()))?;

        if let Some(status) = self.status.map(RecruitmentStatus::from) {
            print_filtered(&queue, status, self.json)?;
            return Ok(());
        }
        if self.json {
            print_json(&queue)?;
            return Ok(());
        }
        print_table(&queue);
        Ok(())
    }
}

fn print_filtered(queue: &RecruitQueue, status: RecruitmentStatus, json: bool) -> Result<()> {
    let ids: Vec<u64> = queue.list_by_status(status).map(|m| m.id().0).collect();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ids).context("failed to serialize queue JSON")?
        );
        return Ok(());
    }
    if ids.is_empty() {
        println!("Nobody is {} right now.", status.label().to_lowercase());
        return Ok(());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn print_json(queue: &RecruitQueue) -> Result<()> {
    let payload = QueueJson {
        active: queue.active_member().map(|m| m.id().0),
        entries: queue
            .iter()
            .map(|entry| EntryJson {
                id: entry.member.id().0,
                status: entry.status.label(),
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize queue JSON")?
    );
    Ok(())
}

fn print_table(queue: &RecruitQueue) {
    let roster = queue.render();
    println!(
        "Baton v{} | {} members | active: {}",
        env!("CARGO_PKG_VERSION"),
        queue.len(),
        roster.active.as_deref().unwrap_or("nobody"),
    );

    if roster.is_empty() {
        println!("Nobody is in the queue.");
        return;
    }

    let mut rows = Vec::with_capacity(roster.rows.len() + 1);
    if let Some(active) = &roster.active {
        rows.push(QueueTableRow {
            member: active.bold().to_string(),
            status: RecruitmentStatus::Active.label().green().bold().to_string(),
        });
    }
    rows.extend(roster.rows.into_iter().map(|row| QueueTableRow {
        member: row.name,
        status: row.status.label().yellow().to_string(),
    }));

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

//! `baton run|stop|status`: bot lifecycle over the gateway socket.

use std::path::PathBuf;

use anyhow::{Context, Result};

use baton_bot::paths::socket_path;
use baton_bot::{request_status, request_stop, start_blocking, BotConfig, BotError};

pub fn run() -> Result<()> {
    let home = home()?;
    let config = BotConfig::load_at(&home).context("failed to load config")?;
    start_blocking(&home, config).context("bot exited with error")?;
    Ok(())
}

pub fn stop() -> Result<()> {
    let home = home()?;
    let token = read_token(&home)?;
    match request_stop(&home, token) {
        Ok(()) => println!("bot stop requested"),
        Err(BotError::BotNotRunning { .. }) => println!("bot is not running"),
        Err(err) => return Err(err).context("failed to stop bot"),
    }
    Ok(())
}

pub fn status() -> Result<()> {
    let home = home()?;
    let token = read_token(&home)?;
    let payload = match request_status(&home, token) {
        Ok(status) => status,
        Err(BotError::BotNotRunning { .. }) => serde_json::json!({
            "running": false,
            "socket": socket_path(&home).display().to_string(),
        }),
        Err(err) => return Err(err).context("failed to query bot status"),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to render bot status JSON")?
    );
    Ok(())
}

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

pub(crate) fn read_token(home: &std::path::Path) -> Result<Option<String>> {
    let config = BotConfig::load_at(home).context("failed to load config")?;
    config.read_token_at(home).context("failed to read token file")
}

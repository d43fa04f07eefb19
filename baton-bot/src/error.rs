use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the bot runtime, bridge protocol, and configuration.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry error: {0}")]
    Registry(#[from] baton_core::RegistryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("bridge protocol error: {0}")]
    Protocol(String),

    #[error("bot is not running (socket missing: {socket})")]
    BotNotRunning { socket: PathBuf },

    #[error("request rejected: bad or missing token")]
    Unauthorized,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BotError {
    BotError::Io {
        path: path.into(),
        source,
    }
}

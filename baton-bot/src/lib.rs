//! Baton bot runtime: command handling, gateway bridge socket, configuration.

pub mod commands;
pub mod config;
mod error;
pub mod handler;
pub mod paths;
pub mod protocol;
mod runtime;

pub use config::BotConfig;
pub use error::BotError;
pub use handler::{Announcement, Bot, IncomingMessage, Reply};
pub use protocol::{
    request_message, request_status, request_stop, send_request, BridgeRequest, BridgeResponse,
};
pub use runtime::{run, start_blocking};

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use baton_core::Member;

use crate::error::{io_err, BotError};
use crate::handler::{IncomingMessage, Reply};
use crate::paths::socket_path;

/// JSON newline-delimited request from the gateway (or the CLI).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// `message` only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<IncomingMessage>,
    /// `ready` only: the members the gateway can see.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
}

impl BridgeRequest {
    pub fn new(cmd: impl Into<String>, token: Option<String>) -> Self {
        Self {
            cmd: cmd.into(),
            token,
            ..Self::default()
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Send one JSON request to the bot socket and return one response.
pub fn send_request(home: &Path, request: &BridgeRequest) -> Result<BridgeResponse, BotError> {
    let socket = socket_path(home);
    if !socket.exists() {
        return Err(BotError::BotNotRunning { socket });
    }

    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        if matches!(
            err.kind(),
            std::io::ErrorKind::NotFound
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
        ) {
            BotError::BotNotRunning {
                socket: socket.clone(),
            }
        } else {
            io_err(&socket, err)
        }
    })?;

    let payload = serde_json::to_string(request)?;
    stream
        .write_all(payload.as_bytes())
        .map_err(|e| io_err(&socket, e))?;
    stream.write_all(b"\n").map_err(|e| io_err(&socket, e))?;
    stream.flush().map_err(|e| io_err(&socket, e))?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| io_err(&socket, e))?;
    if read == 0 {
        return Err(BotError::Protocol(
            "bot closed connection before responding".to_string(),
        ));
    }

    let response: BridgeResponse = serde_json::from_str(line.trim_end())?;
    Ok(response)
}

pub fn request_status(home: &Path, token: Option<String>) -> Result<Value, BotError> {
    let request = BridgeRequest::new("status", token);

    let mut last_not_running: Option<BotError> = None;
    for attempt in 0..5 {
        match send_request(home, &request) {
            Ok(response) => return response_into_data(response),
            Err(err @ BotError::BotNotRunning { .. }) => {
                last_not_running = Some(err);
                if attempt < 4 {
                    sleep(Duration::from_millis(100));
                    continue;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_not_running.unwrap_or_else(|| {
        BotError::Protocol("status retry loop exited unexpectedly".to_string())
    }))
}

pub fn request_stop(home: &Path, token: Option<String>) -> Result<(), BotError> {
    let response = send_request(home, &BridgeRequest::new("stop", token))?;
    response_into_data(response).map(|_| ())
}

/// Relay one chat message and collect the bot's replies.
pub fn request_message(
    home: &Path,
    token: Option<String>,
    message: IncomingMessage,
) -> Result<Vec<Reply>, BotError> {
    let request = BridgeRequest {
        message: Some(message),
        ..BridgeRequest::new("message", token)
    };
    let data = response_into_data(send_request(home, &request)?)?;
    let replies = data.get("replies").cloned().unwrap_or(Value::Array(vec![]));
    Ok(serde_json::from_value(replies)?)
}

fn response_into_data(response: BridgeResponse) -> Result<Value, BotError> {
    if response.ok {
        Ok(response.data.unwrap_or(Value::Null))
    } else {
        Err(BotError::Protocol(
            response
                .error
                .unwrap_or_else(|| "unknown bot error".to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_socket_is_not_running() {
        let home = TempDir::new().unwrap();
        let err = send_request(home.path(), &BridgeRequest::new("status", None)).unwrap_err();
        assert!(matches!(err, BotError::BotNotRunning { .. }), "got: {err}");
    }

    #[test]
    fn message_request_wire_shape() {
        let request = BridgeRequest {
            message: Some(IncomingMessage {
                author: Member::new(1, "alice"),
                admin: false,
                channel: Some(42),
                content: ".join".into(),
            }),
            ..BridgeRequest::new("message", Some("t".into()))
        };
        let wire: Value = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["cmd"], "message");
        assert_eq!(wire["token"], "t");
        assert_eq!(wire["message"]["author"]["id"], 1);
        assert_eq!(wire["message"]["content"], ".join");
        assert!(wire.get("members").is_none());
    }

    #[test]
    fn minimal_request_parses() {
        let request: BridgeRequest = serde_json::from_str(r#"{"cmd":"status"}"#).unwrap();
        assert_eq!(request.cmd, "status");
        assert!(request.token.is_none());
        assert!(request.members.is_empty());
    }
}

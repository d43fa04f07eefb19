use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};

use baton_core::{EmptyDirectory, KnownMembers, Member, Registry};

use crate::config::BotConfig;
use crate::error::{io_err, BotError};
use crate::handler::{Bot, IncomingMessage};
use crate::paths::{baton_dir_at, socket_path};
use crate::protocol::{BridgeRequest, BridgeResponse};

#[derive(Debug)]
enum BotEvent {
    Ready(Vec<Member>),
    Message(IncomingMessage),
    Status,
}

impl BotEvent {
    fn label(&self) -> &'static str {
        match self {
            BotEvent::Ready(_) => "ready",
            BotEvent::Message(_) => "message",
            BotEvent::Status => "status",
        }
    }
}

struct EventJob {
    event: BotEvent,
    respond_to: oneshot::Sender<Result<Value, String>>,
}

/// Start the bot runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, config: BotConfig) -> Result<(), BotError> {
    init_tracing(config.log_json);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Run the bot runtime: one dispatcher owning the registry, one socket
/// server for the gateway, one signal handler.
pub async fn run(home: PathBuf, config: BotConfig) -> Result<(), BotError> {
    ensure_runtime_dirs(&home)?;

    let token = config.read_token_at(&home)?;
    if token.is_none() {
        tracing::warn!(
            path = %config.token_path_at(&home).display(),
            "no gateway token configured; accepting unauthenticated requests"
        );
    }

    let registry_path = config.registry_path_at(&home);
    let registry = Registry::open(&registry_path, &EmptyDirectory)?;
    tracing::info!(
        path = %registry_path.display(),
        entries = registry.queue().len(),
        "registry loaded"
    );
    let bot = Bot::new(registry, KnownMembers::new(), config);
    let started_at = Utc::now();

    let (event_tx, event_rx) = mpsc::channel::<EventJob>(64);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let dispatcher_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let result = dispatcher_task(bot, event_rx, shutdown.subscribe(), started_at).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        tokio::spawn(async move {
            let result = socket_server_task(
                home,
                token,
                event_tx,
                shutdown.clone(),
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down bot");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(BotError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (dispatcher_result, socket_result, signal_result) =
        tokio::join!(dispatcher_handle, socket_handle, signal_handle);

    handle_join("dispatcher", dispatcher_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Applies events strictly one at a time. The registry write happens inside
/// the handler, so a reply is only sent once its mutation is on disk.
async fn dispatcher_task(
    mut bot: Bot,
    mut event_rx: mpsc::Receiver<EventJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at: DateTime<Utc>,
) -> Result<(), BotError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = event_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let label = job.event.label();
                let outcome = apply_event(&mut bot, job.event, started_at);
                if let Err(err) = &outcome {
                    tracing::error!(event = label, error = %err, "event failed");
                }
                let _ = job.respond_to.send(outcome);
            }
        }
    }
    Ok(())
}

fn apply_event(bot: &mut Bot, event: BotEvent, started_at: DateTime<Utc>) -> Result<Value, String> {
    match event {
        BotEvent::Ready(members) => Ok(json!(bot.on_ready(members))),
        BotEvent::Message(message) => bot
            .on_message(&message)
            .map(|replies| json!({ "replies": replies }))
            .map_err(|err| err.to_string()),
        BotEvent::Status => {
            let mut payload = bot.status_payload();
            payload["running"] = json!(true);
            payload["started_at"] = json!(started_at.to_rfc3339());
            Ok(payload)
        }
    }
}

async fn socket_server_task(
    home: PathBuf,
    token: Option<String>,
    event_tx: mpsc::Sender<EventJob>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), BotError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "listening for gateway connections");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let token = token.clone();
                let event_tx = event_tx.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, token, event_tx, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    token: Option<String>,
    event_tx: mpsc::Sender<EventJob>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), BotError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("bot socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Result<BridgeRequest, _> = serde_json::from_str(&line);
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &BridgeResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        if token.is_some() && request.token != token {
            tracing::warn!(cmd = %request.cmd, "rejected request with bad token");
            write_response(
                &mut writer,
                &BridgeResponse::error(BotError::Unauthorized.to_string()),
            )
            .await?;
            continue;
        }

        let cmd = request.cmd.clone();
        let response = match cmd.as_str() {
            "ready" => dispatch(&event_tx, BotEvent::Ready(request.members)).await,
            "message" => match request.message {
                Some(message) => dispatch(&event_tx, BotEvent::Message(message)).await,
                None => BridgeResponse::error("message request without a message"),
            },
            "status" => dispatch(&event_tx, BotEvent::Status).await,
            "stop" => {
                let _ = shutdown_tx.send(());
                BridgeResponse::ok(json!({ "stopping": true }))
            }
            other => BridgeResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn dispatch(event_tx: &mpsc::Sender<EventJob>, event: BotEvent) -> BridgeResponse {
    match enqueue_event(event_tx, event).await {
        Ok(data) => BridgeResponse::ok(data),
        Err(err) => BridgeResponse::error(err.to_string()),
    }
}

async fn enqueue_event(event_tx: &mpsc::Sender<EventJob>, event: BotEvent) -> Result<Value, BotError> {
    let (tx, rx) = oneshot::channel();
    event_tx
        .send(EventJob {
            event,
            respond_to: tx,
        })
        .await
        .map_err(|_| BotError::ChannelClosed("event queue"))?;

    let outcome = rx
        .await
        .map_err(|_| BotError::ChannelClosed("event response"))?;
    outcome.map_err(BotError::Protocol)
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), BotError> {
    if !socket.exists() {
        return Ok(());
    }

    if StdUnixStream::connect(socket).is_ok() {
        return Err(BotError::Protocol(format!(
            "bot socket already in use: {}",
            socket.display()
        )));
    }
    tracing::warn!(socket = %socket.display(), "removing stale bot socket before bind");

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), BotError> {
    let dir = baton_dir_at(home);
    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        set_dir_permissions(&dir)?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &BridgeResponse,
) -> Result<(), BotError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("bot socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("bot socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("bot socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), BotError>, tokio::task::JoinError>,
) -> Result<(), BotError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(BotError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        let _ = fmt().json().with_env_filter(filter).with_target(false).try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), BotError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), BotError> {
    Ok(())
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), BotError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), BotError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::handler::Reply;

    fn test_bot(home: &TempDir) -> Bot {
        let path = home.path().join("recruiters.yaml");
        let registry = Registry::open(path, &EmptyDirectory).expect("open");
        Bot::new(registry, KnownMembers::new(), BotConfig::default())
    }

    fn message(id: u64, name: &str, content: &str) -> BotEvent {
        BotEvent::Message(IncomingMessage {
            author: Member::new(id, name),
            admin: false,
            channel: None,
            content: content.to_string(),
        })
    }

    #[tokio::test]
    async fn dispatcher_applies_events_in_order() {
        let home = TempDir::new().expect("home");
        let (event_tx, event_rx) = mpsc::channel::<EventJob>(8);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        let dispatcher = tokio::spawn(dispatcher_task(
            test_bot(&home),
            event_rx,
            shutdown_tx.subscribe(),
            Utc::now(),
        ));

        let first = enqueue_event(&event_tx, message(1, "alice", ".join"))
            .await
            .expect("alice joins");
        let second = enqueue_event(&event_tx, message(2, "bob", ".join"))
            .await
            .expect("bob rejected");
        let replies: Vec<Reply> =
            serde_json::from_value(second["replies"].clone()).expect("replies");
        assert_eq!(first["replies"][0]["text"], "alice is now active.");
        assert!(replies[0].body().starts_with("alice is already actively recruiting"));

        let status = enqueue_event(&event_tx, BotEvent::Status).await.expect("status");
        assert_eq!(status["active"], "alice");
        assert_eq!(status["running"], true);
        assert_eq!(status["commands_handled"], 2);

        let _ = shutdown_tx.send(());
        dispatcher.await.expect("join").expect("dispatcher ok");
    }

    #[tokio::test]
    async fn socket_round_trip_with_token() {
        let home = TempDir::new().expect("home");
        ensure_runtime_dirs(home.path()).expect("dirs");
        let (event_tx, event_rx) = mpsc::channel::<EventJob>(8);
        let (shutdown_tx, _) = broadcast::channel::<()>(4);

        let dispatcher = tokio::spawn(dispatcher_task(
            test_bot(&home),
            event_rx,
            shutdown_tx.subscribe(),
            Utc::now(),
        ));
        let server = tokio::spawn(socket_server_task(
            home.path().to_path_buf(),
            Some("s3cret".to_string()),
            event_tx,
            shutdown_tx.clone(),
            shutdown_tx.subscribe(),
        ));

        let socket = socket_path(home.path());
        for _ in 0..50 {
            if socket.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let stream = UnixStream::connect(&socket).await.expect("connect");
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(b"{\"cmd\":\"status\",\"token\":\"wrong\"}\n")
            .await
            .expect("write");
        let denied: Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(denied["ok"], false);

        let join = json!({
            "cmd": "message",
            "token": "s3cret",
            "message": {"author": {"id": 1, "name": "alice"}, "content": ".ready"}
        });
        writer
            .write_all(format!("{join}\n").as_bytes())
            .await
            .expect("write");
        let joined: Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(joined["ok"], true);
        assert_eq!(joined["data"]["replies"][0]["text"], "alice is now ready.");

        writer
            .write_all(b"{\"cmd\":\"stop\",\"token\":\"s3cret\"}\n")
            .await
            .expect("write");
        let stopped: Value =
            serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
        assert_eq!(stopped["data"]["stopping"], true);

        server.await.expect("join").expect("server ok");
        dispatcher.await.expect("join").expect("dispatcher ok");
        assert!(!socket.exists(), "socket removed on shutdown");
    }

    #[test]
    fn stale_socket_is_removed() {
        let home = TempDir::new().expect("home");
        let socket = home.path().join("stale.sock");
        fs::write(&socket, b"").expect("fake socket");
        prepare_socket_for_bind(&socket).expect("prepare");
        assert!(!socket.exists());
    }
}

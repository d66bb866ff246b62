//! Unix domain socket server for IPC
//!
//! Provides request-response communication and pushes application events
//! to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::AppEvent;
use crate::hotkey::KeySender;

use super::protocol::{read_frame, write_frame, DaemonStatus, Notification, Request, Response};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// State shared with client handlers
struct Shared {
    status: RwLock<DaemonStatus>,
    start_time: Instant,
    events: broadcast::Sender<AppEvent>,
    keys: KeySender,
}

impl Server {
    /// Bind the socket, replacing a stale one
    pub fn new(
        socket_path: &Path,
        status: DaemonStatus,
        events: broadcast::Sender<AppEvent>,
        keys: KeySender,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only (0600)
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            shared: Arc::new(Shared {
                status: RwLock::new(status),
                start_time: Instant::now(),
                events,
                keys,
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections and tracking reminder state
    pub async fn run(&self) -> Result<()> {
        let mut events = self.shared.events.subscribe();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _addr)) => {
                        debug!("client connected");
                        let shared = Arc::clone(&self.shared);
                        let mut shutdown_rx = self.shutdown_tx.subscribe();

                        tokio::spawn(async move {
                            tokio::select! {
                                result = handle_client(stream, shared) => {
                                    if let Err(e) = result {
                                        warn!(?e, "client handler error");
                                    }
                                }
                                _ = shutdown_rx.recv() => {
                                    debug!("client handler shutting down");
                                }
                            }
                        });
                    }
                    Err(e) => {
                        error!(?e, "accept error");
                    }
                },
                event = events.recv() => match event {
                    Ok(event) => self.shared.status.write().await.breaks.apply(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "status tracker lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Disconnect clients and remove the socket file
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Reads requests off the socket so the handler can wait on events too
fn spawn_reader(mut reader: OwnedReadHalf) -> mpsc::Receiver<Result<Request>> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        loop {
            let request = match read_frame(&mut reader).await {
                Ok(Some(body)) => {
                    serde_json::from_slice(&body).context("failed to parse request")
                }
                Ok(None) => break,
                Err(e) => Err(e),
            };
            let failed = request.is_err();
            if tx.send(request).await.is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Handle a single client connection
async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut requests = spawn_reader(reader);
    let mut subscription: Option<broadcast::Receiver<AppEvent>> = None;

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(request) = request else {
                    debug!("client disconnected");
                    return Ok(());
                };
                let request = request?;
                debug!(?request, "received request");

                if request == Request::Subscribe && subscription.is_none() {
                    subscription = Some(shared.events.subscribe());
                    debug!("client subscribed to events");
                }
                let response = process_request(request, &shared).await;
                write_frame(&mut writer, &response).await?;
            }
            event = next_event(&mut subscription) => {
                match event {
                    Ok(event) => {
                        write_frame(&mut writer, &Notification::Event { event }).await?;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        subscription = None;
                    }
                }
            }
        }
    }
}

/// Next event for a subscribed client; pending forever otherwise
async fn next_event(
    subscription: &mut Option<broadcast::Receiver<AppEvent>>,
) -> Result<AppEvent, broadcast::error::RecvError> {
    match subscription {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn process_request(request: Request, shared: &Shared) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::GetStatus => {
            let mut status = shared.status.read().await.clone();
            status.uptime_secs = shared.start_time.elapsed().as_secs();
            Response::Status(status)
        }

        Request::Subscribe => Response::Subscribed,

        Request::Paste => {
            let keys = shared.keys.clone();
            match tokio::task::spawn_blocking(move || keys.paste()).await {
                Ok(()) => {
                    info!("paste keystroke sent via IPC");
                    Response::Pasted
                }
                Err(e) => Response::Error {
                    code: "paste_failed".to_string(),
                    message: e.to_string(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::testing::{KeyTransition, RecordingSynth};
    use crate::hotkey::KeyCode;
    use crate::ipc::BreakStatus;

    fn shared() -> (Arc<Shared>, broadcast::Sender<AppEvent>, Arc<RecordingSynth>) {
        let (events, _) = broadcast::channel(16);
        let synth = Arc::new(RecordingSynth::default());
        let shared = Arc::new(Shared {
            status: RwLock::new(DaemonStatus {
                hotkeys_registered: true,
                ..DaemonStatus::default()
            }),
            start_time: Instant::now(),
            events: events.clone(),
            keys: KeySender::new(synth.clone()),
        });
        (shared, events, synth)
    }

    async fn request(stream: &mut UnixStream, request: &Request) {
        write_frame(stream, request).await.unwrap();
    }

    async fn reply<T: serde::de::DeserializeOwned>(stream: &mut UnixStream) -> T {
        let body = read_frame(stream).await.unwrap().unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let (shared, _events, _synth) = shared();
        let (mut client, server) = UnixStream::pair().unwrap();
        let handler = tokio::spawn(handle_client(server, shared));

        request(&mut client, &Request::Ping).await;
        assert_eq!(reply::<Response>(&mut client).await, Response::Pong);

        request(&mut client, &Request::GetStatus).await;
        match reply::<Response>(&mut client).await {
            Response::Status(status) => {
                assert!(status.hotkeys_registered);
                assert_eq!(status.breaks, BreakStatus::default());
            }
            other => panic!("unexpected response: {:?}", other),
        }

        drop(client);
        handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let (shared, events, _synth) = shared();
        let (mut client, server) = UnixStream::pair().unwrap();
        tokio::spawn(handle_client(server, shared));

        request(&mut client, &Request::Subscribe).await;
        assert_eq!(reply::<Response>(&mut client).await, Response::Subscribed);

        let event = AppEvent::BreakReminderOpened {
            title: "Break reminder".to_string(),
        };
        events.send(event.clone()).unwrap();
        assert_eq!(
            reply::<Notification>(&mut client).await,
            Notification::Event { event }
        );
    }

    #[tokio::test]
    async fn test_paste_sends_keystroke() {
        let (shared, _events, synth) = shared();
        let (mut client, server) = UnixStream::pair().unwrap();
        tokio::spawn(handle_client(server, shared));

        request(&mut client, &Request::Paste).await;
        assert_eq!(reply::<Response>(&mut client).await, Response::Pasted);

        let transitions = synth.transitions();
        let v = KeyCode::from_char('V').unwrap();
        assert!(transitions.contains(&KeyTransition::Down(v)));
        assert!(transitions.contains(&KeyTransition::Up(v)));
    }

    #[tokio::test]
    async fn test_malformed_request_ends_connection() {
        let (shared, _events, _synth) = shared();
        let (mut client, server) = UnixStream::pair().unwrap();
        let handler = tokio::spawn(handle_client(server, shared));

        write_frame(&mut client, &serde_json::json!({"type": "launch"}))
            .await
            .unwrap();
        assert!(handler.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_server_tracks_reminder_state() {
        let socket_path = std::env::temp_dir().join(format!(
            "deskmate-test-{}.sock",
            std::process::id()
        ));
        let (events, _) = broadcast::channel(16);
        let server = Arc::new(
            Server::new(
                &socket_path,
                DaemonStatus::default(),
                events.clone(),
                KeySender::new(Arc::new(RecordingSynth::default())),
            )
            .unwrap(),
        );
        let running = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.run().await }
        });
        // Let the server subscribe before events are published.
        tokio::task::yield_now().await;

        events
            .send(AppEvent::BreakReminderOpened {
                title: "Break reminder".to_string(),
            })
            .unwrap();
        events
            .send(AppEvent::BreakProgress {
                text: "Active: 55 minutes".to_string(),
                progress: 0.9,
            })
            .unwrap();
        tokio::task::yield_now().await;

        let mut client = UnixStream::connect(&socket_path).await.unwrap();
        request(&mut client, &Request::GetStatus).await;
        match reply::<Response>(&mut client).await {
            Response::Status(status) => {
                assert!(status.breaks.reminding);
                assert_eq!(status.breaks.text, "Active: 55 minutes");
            }
            other => panic!("unexpected response: {:?}", other),
        }

        server.shutdown().await;
        running.abort();
        assert!(!socket_path.exists());
    }
}

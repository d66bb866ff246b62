//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::app::HotkeyAction;
use crate::events::AppEvent;
use crate::hotkey::KeyCombination;

/// Largest accepted message body
pub const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Requests from client to daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Subscribe to application events
    Subscribe,

    /// Release held modifiers and send the paste keystroke
    Paste,
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Subscription confirmed
    Subscribed,

    /// Paste keystroke sent
    Pasted,

    /// Error response
    Error { code: String, message: String },
}

/// Push notification to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    Event { event: AppEvent },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyInfo {
    pub action: HotkeyAction,
    pub hotkey: KeyCombination,
}

/// Break reminder as last reported by the application loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BreakStatus {
    pub reminding: bool,
    pub text: String,
    pub progress: f32,
}

impl BreakStatus {
    /// Fold an application event into the status
    pub fn apply(&mut self, event: &AppEvent) {
        match event {
            AppEvent::BreakReminderOpened { .. } => {
                *self = Self {
                    reminding: true,
                    text: String::new(),
                    progress: 1.0,
                };
            }
            AppEvent::BreakProgress { text, progress } => {
                self.text = text.clone();
                self.progress = *progress;
            }
            AppEvent::BreakCompleted { .. } | AppEvent::BreakReminderClosed => {
                *self = Self::default();
            }
            AppEvent::HotkeyPressed { .. } => {}
        }
    }
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Configured hotkeys in registration order
    pub hotkeys: Vec<HotkeyInfo>,

    /// Whether every hotkey is live at the OS level
    pub hotkeys_registered: bool,

    pub break_monitor_enabled: bool,

    pub breaks: BreakStatus,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            hotkeys: Vec::new(),
            hotkeys_registered: false,
            break_monitor_enabled: false,
            breaks: BreakStatus::default(),
            uptime_secs: 0,
        }
    }
}

/// Read one length-prefixed message body; `None` on a clean disconnect
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        bail!("message too large: {} bytes", len);
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

/// Send a length-prefixed JSON message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let body = serde_json::to_vec(msg)?;
    writer.write_all(&(body.len() as u32).to_le_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

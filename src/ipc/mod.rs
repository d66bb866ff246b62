//! IPC module for daemon-client communication

mod protocol;
mod server;

pub use protocol::{BreakStatus, DaemonStatus, HotkeyInfo};
pub use server::Server;

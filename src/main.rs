//! deskmate-daemon: background desktop helper
//!
//! Runs in the background and provides:
//! - System-wide hotkeys for the clip popup, uploads and screenshots
//! - Break reminders driven by system idle time
//! - IPC server for status queries, event subscription and paste
//!
//! Threads: `ui` owns application state, `hotkeys` talks to the OS event
//! queue, `break-timer` and `break-countdown` sample idle time. The tokio
//! runtime only handles signals and IPC.

mod app;
mod breaks;
mod config;
mod events;
mod hotkey;
mod idle;
#[cfg(unix)]
mod ipc;
mod lifecycle;
mod platform;
mod ui;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::App;
use crate::breaks::BreakMonitor;
use crate::config::Config;
use crate::events::AppEvent;
use crate::hotkey::HotkeyBridge;
use crate::idle::{IdleSource, SystemClock};
use crate::lifecycle::ShutdownSignal;
use crate::platform::{NativeHotkeys, NativeIdle, NativeKeySynth};
use crate::ui::UiLoop;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "deskmate-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    let bindings = config.hotkey_bindings()?;
    info!(?config.socket_path, hotkeys = bindings.len(), "configuration loaded");

    // App -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<AppEvent>(64);

    let (ui, ui_thread) = UiLoop::spawn({
        let bindings = bindings.clone();
        let events = event_tx.clone();
        move || App::new(bindings, events)
    })
    .context("failed to spawn ui thread")?;

    // Hotkeys must be live before anything advertises them
    let synth = Arc::new(NativeKeySynth::new()?);
    let mut bridge = HotkeyBridge::new(NativeHotkeys::new()?, synth);
    for (action, combo) in &bindings {
        bridge
            .register_hotkey(*combo)
            .with_context(|| format!("cannot register {} hotkey", action))?;
        info!(%action, %combo, "hotkey configured");
    }
    if let Err(e) = bridge.start(ui.clone()) {
        error!(%e, "global hotkeys unavailable, exiting");
        ui.quit();
        let _ = ui_thread.join();
        return Err(e.into());
    }

    // Break monitor
    let breaks = config.breaks();
    let mut monitor = if breaks.is_enabled() {
        match NativeIdle::new() {
            Ok(idle) => {
                let idle: Arc<dyn IdleSource> = Arc::new(idle);
                Some(
                    BreakMonitor::start(breaks, idle, Arc::new(SystemClock::new()), ui.clone())
                        .context("failed to start break monitor")?,
                )
            }
            Err(e) => {
                error!(%e, "idle time unavailable, break reminders disabled");
                None
            }
        }
    } else {
        info!("break reminders disabled");
        None
    };

    let shutdown = ShutdownSignal::new();

    #[cfg(unix)]
    let server = {
        let status = ipc::DaemonStatus {
            hotkeys: bindings
                .iter()
                .map(|(action, hotkey)| ipc::HotkeyInfo {
                    action: *action,
                    hotkey: *hotkey,
                })
                .collect(),
            hotkeys_registered: bridge.is_started(),
            break_monitor_enabled: monitor.as_ref().is_some_and(BreakMonitor::is_enabled),
            ..ipc::DaemonStatus::default()
        };
        ipc::Server::new(&config.socket_path, status, event_tx.clone(), bridge.key_sender())?
    };

    info!("daemon initialized, waiting for shutdown");

    #[cfg(unix)]
    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }
        result = shutdown.wait() => {
            result.context("failed to install signal handlers")?;
            info!("shutdown signal received");
        }
    }

    #[cfg(not(unix))]
    {
        shutdown.wait().await.context("failed to install Ctrl-C handler")?;
        info!("shutdown signal received");
    }

    // Cleanup
    info!("shutting down...");

    if let Some(monitor) = monitor.as_mut() {
        info!(state = %monitor.state(), "stopping break monitor");
        monitor.stop();
    }
    bridge.stop();
    ui.quit();
    if ui_thread.join().is_err() {
        warn!("ui thread panicked");
    }

    #[cfg(unix)]
    server.shutdown().await;

    info!("deskmate-daemon stopped");

    Ok(())
}

//! Global hotkey bridge
//!
//! Registers a fixed set of key combinations with the OS from a dedicated
//! native-event thread and hands every matching event to the application's
//! event loop. The native thread never touches UI state: it pushes the
//! combination onto a hand-off queue and posts a drain task, and each drain
//! task pops exactly one entry on the UI thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, error, info, trace, warn};

use super::backend::{HotkeyBackend, HotkeyError, HotkeyId, KeySynth, QuitHandle};
use super::keys::{KeyCode, KeyCombination};
use super::synth::KeySender;
use crate::ui::UiHandle;

/// Application code notified of hotkeys.
///
/// Always called on the event-loop thread, one event per call, in the
/// order the OS reported them.
pub trait HotkeyHandler {
    fn hotkey(&mut self, combo: &KeyCombination);
}

/// Owns the registration list and the native-event thread
pub struct HotkeyBridge<B: HotkeyBackend> {
    entries: Vec<KeyCombination>,
    started: AtomicBool,
    backend: Option<B>,
    keys: KeySender,
    native: Option<NativeThread>,
}

struct NativeThread {
    quit: QuitHandle,
    join: thread::JoinHandle<()>,
}

impl<B: HotkeyBackend> HotkeyBridge<B> {
    pub fn new(backend: B, synth: Arc<dyn KeySynth>) -> Self {
        Self {
            entries: Vec::new(),
            started: AtomicBool::new(false),
            backend: Some(backend),
            keys: KeySender::new(synth),
            native: None,
        }
    }

    /// Append a combination to the registration list.
    ///
    /// Nothing reaches the OS until [`start`](Self::start).
    pub fn register_hotkey(&mut self, combo: KeyCombination) -> Result<HotkeyId, HotkeyError> {
        if combo.is_empty() {
            return Err(HotkeyError::EmptyCombination);
        }
        if self.started.load(Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyStarted);
        }

        let id = HotkeyId(self.entries.len() as u32);
        self.entries.push(combo);
        Ok(id)
    }

    /// Registered combinations, indexed by `HotkeyId`
    pub fn hotkeys(&self) -> &[KeyCombination] {
        &self.entries
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Freeze the registration list, bind every entry with the OS and start
    /// delivering events to `ui`.
    ///
    /// Blocks until the native-event thread has bound every hotkey and its
    /// event queue is running. A binding the OS refuses is returned as
    /// `HotkeyError::Bind`, and an event queue that cannot start returns
    /// its own error. Either way the bindings made so far are released and
    /// no events are delivered.
    pub fn start<S>(&mut self, ui: UiHandle<S>) -> Result<(), HotkeyError>
    where
        S: HotkeyHandler + 'static,
    {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyStarted);
        }
        let mut backend = self.backend.take().ok_or(HotkeyError::AlreadyStarted)?;
        let entries: Arc<[KeyCombination]> = self.entries.clone().into();
        let count = entries.len();

        // Zero capacity: the native thread and `start` meet here.
        let (ready_tx, ready_rx) = bounded(0);

        let join = thread::Builder::new()
            .name("hotkeys".to_string())
            .spawn(move || {
                info!("native-event thread started");
                run_native_thread(&mut backend, &entries, ready_tx, ui);
                info!("native-event thread stopped");
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(quit)) => {
                info!(count, "global hotkeys registered");
                self.native = Some(NativeThread { quit, join });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(HotkeyError::NativeThreadExited)
            }
        }
    }

    /// Stop the native-event thread and release every binding.
    pub fn stop(&mut self) {
        if let Some(native) = self.native.take() {
            native.quit.quit();
            if native.join.join().is_err() {
                warn!("native-event thread panicked");
            }
        }
    }

    /// Handle for synthesizing keys from other threads
    pub fn key_sender(&self) -> KeySender {
        self.keys.clone()
    }

    pub fn send_key_down(&self, code: KeyCode) {
        self.keys.send_key_down(code);
    }

    pub fn send_key_up(&self, code: KeyCode) {
        self.keys.send_key_up(code);
    }

    pub fn send_key_press(&self, code: KeyCode) {
        self.keys.send_key_press(code);
    }
}

impl<B: HotkeyBackend> Drop for HotkeyBridge<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Body of the native-event thread
fn run_native_thread<B, S>(
    backend: &mut B,
    entries: &[KeyCombination],
    ready: Sender<Result<QuitHandle, HotkeyError>>,
    ui: UiHandle<S>,
) where
    B: HotkeyBackend,
    S: HotkeyHandler + 'static,
{
    let mut bound = Vec::with_capacity(entries.len());
    for (index, combo) in entries.iter().enumerate() {
        let id = HotkeyId(index as u32);
        match backend.bind(id, combo) {
            Ok(()) => {
                debug!(%combo, %id, "registered hotkey");
                bound.push(id);
            }
            Err(e) => {
                error!(%combo, %e, "unable to register hotkey");
                unbind_all(backend, &bound);
                let _ = ready.send(Err(e));
                return;
            }
        }
    }

    let quit = backend.quit_handle();
    let mut ready = Some(ready);
    let (queue_tx, queue_rx) = unbounded::<KeyCombination>();
    let result = backend.run(
        &mut || {
            if let Some(ready) = ready.take() {
                if ready.send(Ok(quit.clone())).is_err() {
                    quit.quit();
                }
            }
        },
        &mut |id| {
            let Some(combo) = entries.get(id.index()) else {
                trace!(%id, "ignoring unknown hotkey id");
                return;
            };
            trace!(%combo, "received hotkey");

            // Unbounded, so this only fails once the receiver is gone.
            let _ = queue_tx.send(*combo);
            let queue = queue_rx.clone();
            if !ui.post(move |state: &mut S| drain_one(&queue, state)) {
                debug!(%combo, "event loop has exited, hotkey not delivered");
            }
        },
    );

    // Never got going: the failure belongs to `start`.
    if let Some(ready) = ready.take() {
        unbind_all(backend, &bound);
        let error = match result {
            Err(e) => e,
            Ok(()) => HotkeyError::NativeThreadExited,
        };
        error!(%error, "native event queue failed to start");
        let _ = ready.send(Err(error));
        return;
    }

    if let Err(e) = result {
        error!(%e, "native event queue failed");
    }
    unbind_all(backend, &bound);
}

fn unbind_all<B: HotkeyBackend>(backend: &mut B, bound: &[HotkeyId]) {
    for id in bound {
        if let Err(e) = backend.unbind(*id) {
            warn!(%id, %e, "failed to unregister hotkey");
        }
    }
}

/// Pop one pending hotkey and hand it to the application.
fn drain_one<S: HotkeyHandler>(queue: &Receiver<KeyCombination>, state: &mut S) {
    if let Ok(combo) = queue.try_recv() {
        state.hotkey(&combo);
    }
}

//! In-memory OS layer used by the hotkey tests

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use crossbeam_channel::{select, unbounded, Receiver, Sender};

use super::backend::{HotkeyBackend, HotkeyError, HotkeyId, KeySynth, QuitHandle};
use super::keys::{KeyCode, KeyCombination};

/// A call the bridge made into the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Bind(HotkeyId, KeyCombination),
    Unbind(HotkeyId),
}

/// What the test can observe about the backend
#[derive(Default)]
pub struct BackendLog {
    pub calls: Vec<BackendCall>,
    pub threads: Vec<ThreadId>,
}

/// Scripted backend: hotkey ids sent on `events` are reported in order.
pub struct MockBackend {
    log: Arc<Mutex<BackendLog>>,
    events: Receiver<HotkeyId>,
    quit_tx: Sender<()>,
    quit_rx: Receiver<()>,
    fail_at: Option<usize>,
    fail_start: bool,
    bind_delay: Duration,
}

impl MockBackend {
    pub fn new() -> (Self, Sender<HotkeyId>, Arc<Mutex<BackendLog>>) {
        let (events_tx, events) = unbounded();
        let (quit_tx, quit_rx) = unbounded();
        let log = Arc::new(Mutex::new(BackendLog::default()));
        let backend = Self {
            log: Arc::clone(&log),
            events,
            quit_tx,
            quit_rx,
            fail_at: None,
            fail_start: false,
            bind_delay: Duration::ZERO,
        };
        (backend, events_tx, log)
    }

    /// Reject the binding with this index, as if another process held it.
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Fail in `run` before the event queue comes up, as when the OS
    /// refuses the event source after every bind succeeded.
    pub fn failing_to_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Make every bind slow so tests can observe the startup rendezvous.
    pub fn with_bind_delay(mut self, delay: Duration) -> Self {
        self.bind_delay = delay;
        self
    }

    fn record(&self, call: BackendCall) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(call);
        log.threads.push(thread::current().id());
    }
}

impl HotkeyBackend for MockBackend {
    fn bind(&mut self, id: HotkeyId, combo: &KeyCombination) -> Result<(), HotkeyError> {
        thread::sleep(self.bind_delay);
        if self.fail_at == Some(id.index()) {
            return Err(HotkeyError::Bind {
                combo: *combo,
                reason: "already registered by another process".to_string(),
            });
        }
        self.record(BackendCall::Bind(id, *combo));
        Ok(())
    }

    fn unbind(&mut self, id: HotkeyId) -> Result<(), HotkeyError> {
        self.record(BackendCall::Unbind(id));
        Ok(())
    }

    fn quit_handle(&self) -> QuitHandle {
        let quit_tx = self.quit_tx.clone();
        QuitHandle::new(move || {
            let _ = quit_tx.send(());
        })
    }

    fn run(
        &mut self,
        started: &mut dyn FnMut(),
        on_hotkey: &mut dyn FnMut(HotkeyId),
    ) -> Result<(), HotkeyError> {
        if self.fail_start {
            return Err(HotkeyError::Os("event source unavailable".to_string()));
        }
        started();
        loop {
            select! {
                recv(self.events) -> id => match id {
                    Ok(id) => on_hotkey(id),
                    Err(_) => return Ok(()),
                },
                recv(self.quit_rx) -> _ => return Ok(()),
            }
        }
    }
}

/// A single synthesized key transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Down(KeyCode),
    Up(KeyCode),
}

/// Key synthesizer that remembers what it was asked to send
#[derive(Default)]
pub struct RecordingSynth {
    sent: Mutex<Vec<KeyTransition>>,
    fail: bool,
}

impl RecordingSynth {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn transitions(&self) -> Vec<KeyTransition> {
        self.sent.lock().unwrap().clone()
    }

    fn push(&self, transition: KeyTransition) -> Result<(), HotkeyError> {
        if self.fail {
            return Err(HotkeyError::Os("input injection blocked".to_string()));
        }
        self.sent.lock().unwrap().push(transition);
        Ok(())
    }
}

impl KeySynth for RecordingSynth {
    fn key_down(&self, code: KeyCode) -> Result<(), HotkeyError> {
        self.push(KeyTransition::Down(code))
    }

    fn key_up(&self, code: KeyCode) -> Result<(), HotkeyError> {
        self.push(KeyTransition::Up(code))
    }
}

//! Single-threaded application event loop
//!
//! All UI-visible state lives in one value `S` owned by the loop thread.
//! Other threads never touch it directly; they post closures through a
//! `UiHandle`, which the loop runs one per turn in the order posted.

use std::io;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};

/// Work posted to the event loop
pub type Task<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Message<S> {
    Run(Task<S>),
    Quit,
}

/// The event loop and the state it owns
pub struct UiLoop<S> {
    state: S,
    rx: Receiver<Message<S>>,
    tx: Sender<Message<S>>,
}

/// Posts work onto the event loop from any thread
pub struct UiHandle<S> {
    tx: Sender<Message<S>>,
}

impl<S> Clone for UiHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S> UiHandle<S> {
    /// Schedule `task` to run on the loop thread.
    ///
    /// Returns false if the loop has already exited.
    pub fn post(&self, task: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.tx.send(Message::Run(Box::new(task))).is_ok()
    }

    /// Ask the loop to exit after the tasks already posted.
    pub fn quit(&self) {
        let _ = self.tx.send(Message::Quit);
    }
}

impl<S: 'static> UiLoop<S> {
    pub fn new(state: S) -> Self {
        let (tx, rx) = unbounded();
        Self { state, rx, tx }
    }

    pub fn handle(&self) -> UiHandle<S> {
        UiHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run on the calling thread until `quit` is posted or every handle is
    /// dropped, then hand the state back.
    pub fn run(self) -> S {
        let Self { mut state, rx, tx } = self;
        drop(tx);

        debug!("event loop running");
        for message in rx.iter() {
            match message {
                Message::Run(task) => task(&mut state),
                Message::Quit => break,
            }
        }
        debug!("event loop exited");

        state
    }

    /// Build the state on a dedicated `ui` thread and run the loop there.
    pub fn spawn<F>(init: F) -> io::Result<(UiHandle<S>, thread::JoinHandle<()>)>
    where
        F: FnOnce() -> S + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let handle = UiHandle { tx: tx.clone() };

        let join = thread::Builder::new().name("ui".to_string()).spawn(move || {
            info!("ui thread started");
            let ui = UiLoop {
                state: init(),
                rx,
                tx,
            };
            ui.run();
            info!("ui thread stopped");
        })?;

        Ok((handle, join))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_run_in_post_order() {
        let ui = UiLoop::new(Vec::new());
        let handle = ui.handle();

        for i in 0..5 {
            assert!(handle.post(move |log: &mut Vec<i32>| log.push(i)));
        }
        handle.quit();

        assert_eq!(ui.run(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_quit_stops_before_later_tasks() {
        let ui = UiLoop::new(0u32);
        let handle = ui.handle();

        handle.post(|n| *n += 1);
        handle.quit();
        handle.post(|n| *n += 10);

        assert_eq!(ui.run(), 1);
    }

    #[test]
    fn test_loop_ends_when_handles_dropped() {
        let ui = UiLoop::new(0u32);
        let handle = ui.handle();
        handle.post(|n| *n += 2);
        drop(handle);

        assert_eq!(ui.run(), 2);
    }

    #[test]
    fn test_spawned_loop_runs_on_ui_thread() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let (handle, join) = UiLoop::spawn(|| ()).unwrap();
        let ui_thread = join.thread().id();

        handle.post(move |_| {
            let _ = tx.send(thread::current().id());
        });
        handle.quit();
        join.join().unwrap();

        assert_eq!(rx.recv().unwrap(), ui_thread);
        assert!(!handle.post(|_| {}));
    }
}

//! The UI loop: a single consumer of everything other threads marshal onto
//! the UI thread (posted messages and blocking calls).

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use phonon_types::{MessageKind, MessageParams};

use super::Bus;
use crate::error::CallError;

pub(crate) type UiTask = Box<dyn FnOnce() + Send>;

pub(crate) enum UiEvent {
    Post(MessageKind, MessageParams),
    Call(UiTask),
    Quit,
}

impl Bus {
    pub(super) fn send_ui(&self, event: UiEvent) {
        // The bus owns a receiver, so this only fails if the bus is gone.
        if self.inner.ui_tx.send(event).is_err() {
            log::warn!(target: "bus", "UI loop gone, event dropped");
        }
    }

    /// Run the UI loop until [`Bus::request_quit`]. UI thread only.
    pub fn run(&self) {
        if !self.is_ui_thread() {
            log::error!(target: "bus", "Bus::run called off the UI thread");
            return;
        }
        log::debug!(target: "bus", "UI loop running");
        while !self.inner.quit_requested.swap(false, Ordering::AcqRel) {
            match self.inner.ui_rx.recv() {
                Ok(event) => self.handle_event(event),
                Err(_) => break,
            }
        }
        log::debug!(target: "bus", "UI loop left");
    }

    /// Process everything queued right now without blocking. Returns the
    /// number of events handled. UI thread only.
    pub fn pump(&self) -> usize {
        if !self.is_ui_thread() {
            return 0;
        }
        let mut handled = 0;
        while let Ok(event) = self.inner.ui_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Wait up to `timeout` for UI work, then process everything queued.
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        if !self.is_ui_thread() {
            std::thread::sleep(timeout);
            return 0;
        }
        match self.inner.ui_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_event(event);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Ask [`Bus::run`] to return once the events queued before this one
    /// have been handled.
    pub fn request_quit(&self) {
        self.send_ui(UiEvent::Quit);
    }

    /// Run `f` on the UI loop and block until it has returned its value.
    ///
    /// Meant for worker threads that need something only the UI thread may
    /// touch. `f` runs after any UI work already queued. On the UI thread
    /// itself `f` runs inline. There is no timeout: a slow `f` stalls the
    /// caller for as long as it takes.
    pub fn call_on_ui<T, F>(&self, f: F) -> Result<T, CallError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.is_ui_thread() {
            return Ok(f());
        }
        if self.is_closed() {
            return Err(CallError::Disconnected);
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let task: UiTask = Box::new(move || {
            let _ = reply_tx.send(f());
        });
        self.inner
            .ui_tx
            .send(UiEvent::Call(task))
            .map_err(|_| CallError::Disconnected)?;

        // A panicking `f` drops the reply sender, which wakes us with Err.
        reply_rx.recv().map_err(|_| CallError::Panicked)
    }

    fn handle_event(&self, event: UiEvent) {
        match event {
            UiEvent::Post(kind, params) => self.deliver(kind, &params),
            UiEvent::Call(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                    log::error!(
                        target: "bus",
                        "call_on_ui function panicked: {}",
                        crate::panic_message(payload.as_ref())
                    );
                }
            }
            UiEvent::Quit => {
                self.inner.quit_requested.store(true, Ordering::Release);
            }
        }
    }
}

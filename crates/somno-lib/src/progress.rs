use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::io::Write;
use std::thread::JoinHandle;

enum StatusMessage {
    Update(String),
    Done,
}

/// Latest-value status line drained by a background thread.
///
/// The channel holds a single message; reporting replaces whatever is still
/// pending, so a slow consumer only ever sees the newest status.
pub struct ProgressReporter {
    tx: Sender<StatusMessage>,
    // second handle on the slot so stale updates can be evicted
    slot: Receiver<StatusMessage>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    pub fn spawn<F>(mut sink: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let slot = rx.clone();
        let handle = std::thread::spawn(move || {
            while let Ok(message) = rx.recv() {
                match message {
                    StatusMessage::Update(status) => sink(&status),
                    StatusMessage::Done => break,
                }
            }
        });
        Self {
            tx,
            slot,
            handle: Some(handle),
        }
    }

    /// Reporter that rewrites a single stderr line.
    pub fn stderr() -> Self {
        Self::spawn(|status| {
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "\r{status}");
            let _ = err.flush();
        })
    }

    pub fn report(&self, status: impl Into<String>) {
        let mut message = StatusMessage::Update(status.into());
        loop {
            match self.tx.try_send(message) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(pending)) => {
                    let _ = self.slot.try_recv();
                    message = pending;
                }
            }
        }
    }

    /// Send the sentinel and wait for the consumer to exit.
    pub fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.slot.try_recv();
            let _ = self.tx.send(StatusMessage::Done);
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

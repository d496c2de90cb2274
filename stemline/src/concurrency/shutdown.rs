//! Broadcast shutdown signal for pipeline threads.
//!
//! The signal is a zero-capacity channel on which nothing is ever sent. Triggering shutdown
//! drops the only sender, which disconnects every receiver at once. Blocked threads observe
//! the disconnection through `select!`, idle threads through [`ShutdownRx::is_shutdown`].

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};

/// Transmitter side of the shutdown signal.
///
/// Clones share the same signal: triggering it from any clone shuts down every subscriber.
#[derive(Debug, Clone)]
pub struct ShutdownTx {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl ShutdownTx {
    /// Triggers shutdown for every subscriber.
    ///
    /// Returns `false` if shutdown had already been triggered.
    pub fn shutdown(&self) -> bool {
        let mut sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);

        sender.take().is_some()
    }

    /// Creates a new receiver observing this signal.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx {
            receiver: self.receiver.clone(),
        }
    }
}

/// Receiver side of the shutdown signal.
#[derive(Debug, Clone)]
pub struct ShutdownRx {
    receiver: Receiver<()>,
}

impl ShutdownRx {
    /// Returns `true` once shutdown has been triggered.
    pub fn is_shutdown(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// The underlying receiver, ready to be used in a `select!`.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

/// Creates a new shutdown signal.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (sender, receiver) = bounded(0);

    let shutdown_tx = ShutdownTx {
        sender: Arc::new(Mutex::new(Some(sender))),
        receiver: receiver.clone(),
    };
    let shutdown_rx = ShutdownRx { receiver };

    (shutdown_tx, shutdown_rx)
}

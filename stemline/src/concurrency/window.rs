//! Flow control between the line source and an order-preserving sink.
//!
//! A sink writing in input order holds every record that overtook an earlier, still pending
//! one. Without a limit a single slow line lets the rest of the input pile up in the sink.
//! The window caps the number of lines admitted by the source but not yet written: the
//! source acquires one permit per line and the sink releases one per line written.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select};
use tracing::debug;

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, StemResult};
use crate::stem_error;

/// Creates a window admitting at most `size` lines in flight.
///
/// # Panics
///
/// Panics if `size` is zero.
pub fn order_window(size: usize) -> (WindowTx, WindowRx) {
    assert!(size > 0, "order window size must be greater than zero");

    let (permits_tx, permits_rx) = bounded(size);

    (
        WindowTx { size, permits_tx },
        WindowRx { size, permits_rx },
    )
}

/// Acquiring side of the window, owned by the source.
#[derive(Debug)]
pub struct WindowTx {
    size: usize,
    permits_tx: Sender<()>,
}

impl WindowTx {
    /// Takes one permit, blocking while `size` lines are already in flight.
    ///
    /// Fails with [`ErrorKind::Interrupted`] on shutdown and with [`ErrorKind::ChannelClosed`]
    /// once the sink is gone.
    pub fn acquire(&self, shutdown_rx: &ShutdownRx) -> StemResult<()> {
        if shutdown_rx.is_shutdown() {
            return Err(stem_error!(
                ErrorKind::Interrupted,
                "Interrupted while waiting on the order window"
            ));
        }

        select! {
            send(self.permits_tx, ()) -> result => result.map_err(|_| {
                stem_error!(
                    ErrorKind::ChannelClosed,
                    "Channel closed",
                    "the sink releasing the order window is gone"
                )
            }),
            recv(shutdown_rx.receiver()) -> _ => Err(stem_error!(
                ErrorKind::Interrupted,
                "Interrupted while waiting on the order window",
                format!("{} lines were in flight", self.size)
            )),
        }
    }

    /// Returns the number of lines currently in flight.
    pub fn in_flight(&self) -> usize {
        self.permits_tx.len()
    }
}

/// Releasing side of the window, owned by the sink.
#[derive(Debug)]
pub struct WindowRx {
    size: usize,
    permits_rx: Receiver<()>,
}

impl WindowRx {
    /// Gives back the permit of one written line.
    ///
    /// Never blocks: the source acquires the permit of a line before sending it.
    pub fn release(&self) {
        if let Err(TryRecvError::Empty) = self.permits_rx.try_recv() {
            debug!(size = self.size, "released a line without a matching permit");
        }
    }
}

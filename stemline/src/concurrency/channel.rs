//! Bounded channels connecting the units of a pipeline.
//!
//! Both ends can be cloned and shared between threads. [`ChannelTx::put`] blocks while the
//! channel is full, which throttles fast producers down to the pace of slow consumers, and
//! [`ChannelRx::take`] blocks while it is empty. Memory use is bounded by the capacity no
//! matter how large the input is.
//!
//! Every blocking operation also watches the pipeline [`ShutdownRx`], so a shutdown request
//! never leaves a thread parked on a channel.

use std::fmt;

use crossbeam_channel::{Receiver, Sender, bounded, select};

use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, StemError, StemResult};
use crate::stem_error;
use crate::types::Item;

/// Creates a bounded channel named `name` holding at most `capacity` items.
///
/// The name only appears in logs and errors.
///
/// # Panics
///
/// Panics if `capacity` is zero; configuration validation rejects such values upfront.
pub fn bounded_channel<T>(name: &'static str, capacity: usize) -> (ChannelTx<T>, ChannelRx<T>) {
    assert!(capacity > 0, "channel capacity must be greater than zero");

    let (sender, receiver) = bounded(capacity);

    (ChannelTx { name, sender }, ChannelRx { name, receiver })
}

/// Sending side of a pipeline channel.
pub struct ChannelTx<T> {
    name: &'static str,
    sender: Sender<Item<T>>,
}

impl<T> ChannelTx<T> {
    /// Puts `item` on the channel, blocking while the channel is full.
    ///
    /// Fails with [`ErrorKind::Interrupted`] if shutdown is triggered first and with
    /// [`ErrorKind::ChannelClosed`] if every receiver is gone.
    pub fn put(&self, item: Item<T>, shutdown_rx: &ShutdownRx) -> StemResult<()> {
        if shutdown_rx.is_shutdown() {
            return Err(interrupted(self.name));
        }

        select! {
            send(self.sender, item) -> result => result.map_err(|_| {
                stem_error!(
                    ErrorKind::ChannelClosed,
                    "Channel closed",
                    format!("no receiver is left on the {} channel", self.name)
                )
            }),
            recv(shutdown_rx.receiver()) -> _ => Err(interrupted(self.name)),
        }
    }

    /// Returns the number of items currently queued.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    /// Returns `true` if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

impl<T> Clone for ChannelTx<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<T> fmt::Debug for ChannelTx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTx")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.sender.capacity())
            .finish()
    }
}

/// Receiving side of a pipeline channel.
pub struct ChannelRx<T> {
    name: &'static str,
    receiver: Receiver<Item<T>>,
}

impl<T> ChannelRx<T> {
    /// Takes the next item off the channel, blocking while the channel is empty.
    ///
    /// Fails with [`ErrorKind::Interrupted`] if shutdown is triggered first and with
    /// [`ErrorKind::ChannelClosed`] if the channel is empty and every sender is gone.
    pub fn take(&self, shutdown_rx: &ShutdownRx) -> StemResult<Item<T>> {
        if shutdown_rx.is_shutdown() {
            return Err(interrupted(self.name));
        }

        select! {
            recv(self.receiver) -> item => item.map_err(|_| {
                stem_error!(
                    ErrorKind::ChannelClosed,
                    "Channel closed",
                    format!("no sender is left on the {} channel", self.name)
                )
            }),
            recv(shutdown_rx.receiver()) -> _ => Err(interrupted(self.name)),
        }
    }

    /// Returns the number of items currently queued.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns `true` if no item is queued.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> Clone for ChannelRx<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> fmt::Debug for ChannelRx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRx")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

fn interrupted(name: &'static str) -> StemError {
    stem_error!(
        ErrorKind::Interrupted,
        "Interrupted while waiting on a channel",
        format!("shutdown was requested while blocked on the {name} channel")
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;

    #[test]
    fn items_come_out_in_fifo_order() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let (tx, rx) = bounded_channel("test", 3);

        tx.put(Item::Data(1), &shutdown_rx).unwrap();
        tx.put(Item::Data(2), &shutdown_rx).unwrap();
        tx.put(Item::End, &shutdown_rx).unwrap();

        assert_eq!(tx.len(), 3);
        assert_eq!(rx.take(&shutdown_rx).unwrap(), Item::Data(1));
        assert_eq!(rx.take(&shutdown_rx).unwrap(), Item::Data(2));
        assert!(rx.take(&shutdown_rx).unwrap().is_end());
        assert!(rx.is_empty());
    }

    #[test]
    fn put_blocks_while_channel_is_full() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let (tx, rx) = bounded_channel("test", 1);
        tx.put(Item::Data("first"), &shutdown_rx).unwrap();

        let delivered = Arc::new(AtomicBool::new(false));
        let producer = {
            let delivered = delivered.clone();
            let shutdown_rx = shutdown_rx.clone();
            thread::spawn(move || {
                tx.put(Item::Data("second"), &shutdown_rx).unwrap();
                delivered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!delivered.load(Ordering::SeqCst));

        assert_eq!(rx.take(&shutdown_rx).unwrap(), Item::Data("first"));
        producer.join().unwrap();

        assert!(delivered.load(Ordering::SeqCst));
        assert_eq!(rx.take(&shutdown_rx).unwrap(), Item::Data("second"));
    }

    #[test]
    fn blocked_take_is_interrupted_by_shutdown() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let (_tx, rx) = bounded_channel::<String>("test", 1);

        let consumer = thread::spawn(move || rx.take(&shutdown_rx));

        thread::sleep(Duration::from_millis(20));
        shutdown_tx.shutdown();

        let err = consumer.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
    }

    #[test]
    fn blocked_put_is_interrupted_by_shutdown() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let (tx, _rx) = bounded_channel("test", 1);
        tx.put(Item::Data(1), &shutdown_rx).unwrap();

        let producer = thread::spawn(move || tx.put(Item::Data(2), &shutdown_rx));

        thread::sleep(Duration::from_millis(20));
        shutdown_tx.shutdown();

        let err = producer.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Interrupted);
    }

    #[test]
    fn put_fails_once_every_receiver_is_gone() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let (tx, rx) = bounded_channel("test", 1);
        drop(rx);

        let err = tx.put(Item::Data(1), &shutdown_rx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ChannelClosed);
    }

    #[test]
    fn take_drains_before_reporting_closed() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let (tx, rx) = bounded_channel("test", 2);
        tx.put(Item::Data(7), &shutdown_rx).unwrap();
        drop(tx);

        assert_eq!(rx.take(&shutdown_rx).unwrap(), Item::Data(7));
        assert_eq!(
            rx.take(&shutdown_rx).unwrap_err().kind(),
            ErrorKind::ChannelClosed
        );
    }
}

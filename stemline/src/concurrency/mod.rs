//! Concurrency primitives used to coordinate pipeline threads.
//!
//! A pipeline runs one source thread, a pool of worker threads and one sink thread. They
//! exchange data exclusively through the bounded channels of the [`channel`] module, so no
//! other lock is needed by any of them.
//!
//! # Termination
//!
//! Termination is carried in-band by [`crate::types::Item::End`]:
//!
//! 1. The source puts exactly one `End` per worker on the input channel once the input is
//!    exhausted, so every worker observes exactly one of them.
//! 2. The coordinator waits until every worker has exited, then puts a single `End` on the
//!    output channel. Workers never signal the sink themselves, otherwise a fast worker's
//!    signal could overtake a slow worker's last record.
//!
//! # Cancellation
//!
//! The [`shutdown`] module provides a broadcast signal. Every blocking channel operation
//! watches it, so a shutdown request unblocks all threads, which then exit with an
//! interrupted error.
//!
//! # Ordered output
//!
//! When the sink writes in input order, the [`window`] module bounds how far the source may
//! run ahead of the last line written, which bounds the sink's reorder buffer.

pub mod channel;
pub mod panic;
pub mod shutdown;
pub mod window;

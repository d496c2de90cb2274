//! The unit reading lines from the input and feeding them to the workers.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::concurrency::channel::ChannelTx;
use crate::concurrency::shutdown::ShutdownRx;
use crate::concurrency::window::WindowTx;
use crate::error::{ErrorKind, StemResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{SOURCE_BEFORE_READ_LINE, stem_fail_point};
use crate::stem_error;
use crate::types::{Item, Line, SequenceNumber};

/// Where a pipeline reads its lines from.
pub enum LineInput {
    /// A text file, opened when the source starts.
    Path(PathBuf),
    /// An already opened reader.
    Reader(Box<dyn BufRead + Send>),
}

impl LineInput {
    /// Wraps any reader into a [`LineInput`].
    pub fn reader<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        LineInput::Reader(Box::new(reader))
    }

    fn open(self) -> StemResult<Box<dyn BufRead + Send>> {
        match self {
            LineInput::Path(path) => {
                let file = File::open(&path).map_err(|err| {
                    stem_error!(
                        ErrorKind::InputOpenFailed,
                        "Failed to open the input file",
                        format!("could not open '{}'", path.display()),
                        source: err
                    )
                })?;

                Ok(Box::new(BufReader::new(file)))
            }
            LineInput::Reader(reader) => Ok(reader),
        }
    }
}

impl fmt::Debug for LineInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineInput::Path(path) => f.debug_tuple("Path").field(path).finish(),
            LineInput::Reader(_) => f.debug_tuple("Reader").finish_non_exhaustive(),
        }
    }
}

/// Counters collected by a [`LineSource`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Physical lines read, blank ones included.
    pub lines_read: u64,
    /// Lines dropped because they were blank after trimming.
    pub lines_skipped: u64,
}

/// Reads the input line by line and puts every non-blank, trimmed line on the input channel.
///
/// Once the input is exhausted, or reading it failed, the source puts exactly one
/// [`Item::End`] per worker on the channel so that every worker terminates.
#[derive(Debug)]
pub struct LineSource {
    input: LineInput,
    input_tx: ChannelTx<Line>,
    worker_count: usize,
    window_tx: Option<WindowTx>,
    shutdown_rx: ShutdownRx,
}

impl LineSource {
    pub fn new(
        input: LineInput,
        input_tx: ChannelTx<Line>,
        worker_count: usize,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            input,
            input_tx,
            worker_count,
            window_tx: None,
            shutdown_rx,
        }
    }

    /// Makes the source acquire a permit of `window_tx` before sending each line.
    pub fn with_order_window(mut self, window_tx: WindowTx) -> Self {
        self.window_tx = Some(window_tx);
        self
    }

    /// Runs the source to completion.
    ///
    /// A failure while opening or reading the input is returned only after the termination
    /// signals have been sent, so the workers never wait for lines that will not come.
    pub fn run(self) -> StemResult<SourceStats> {
        let LineSource {
            input,
            input_tx,
            worker_count,
            window_tx,
            shutdown_rx,
        } = self;

        info!(?input, "starting line source");

        let mut stats = SourceStats::default();
        let read_result = read_lines(
            input,
            &input_tx,
            window_tx.as_ref(),
            &shutdown_rx,
            &mut stats,
        );

        if let Err(err) = &read_result {
            warn!(error = %err, "line source stopped early");
        }

        if let Some(window_tx) = &window_tx {
            debug!(
                in_flight = window_tx.in_flight(),
                "input exhausted with lines still waiting to be written"
            );
        }

        let signal_result = send_end_signals(&input_tx, worker_count, &shutdown_rx);

        match (read_result, signal_result) {
            (Err(err), signal_result) => {
                if let Err(signal_err) = signal_result {
                    debug!(error = %signal_err, "could not send termination signals");
                }

                Err(err)
            }
            (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => {
                info!(
                    lines_read = stats.lines_read,
                    lines_skipped = stats.lines_skipped,
                    "line source finished"
                );

                Ok(stats)
            }
        }
    }
}

fn read_lines(
    input: LineInput,
    input_tx: &ChannelTx<Line>,
    window_tx: Option<&WindowTx>,
    shutdown_rx: &ShutdownRx,
    stats: &mut SourceStats,
) -> StemResult<()> {
    let reader = input.open()?;
    let mut next_seq: SequenceNumber = 0;

    for line in reader.lines() {
        #[cfg(feature = "failpoints")]
        stem_fail_point(SOURCE_BEFORE_READ_LINE)?;

        let line = line.map_err(|err| {
            stem_error!(
                ErrorKind::InputReadFailed,
                "Failed to read from the input",
                format!("read failed after {} lines", stats.lines_read),
                source: err
            )
        })?;
        stats.lines_read += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            stats.lines_skipped += 1;
            continue;
        }

        if let Some(window_tx) = window_tx {
            window_tx.acquire(shutdown_rx)?;
        }

        input_tx.put(
            Item::Data(Line::new(next_seq, trimmed.to_owned())),
            shutdown_rx,
        )?;
        next_seq += 1;
    }

    Ok(())
}

/// Puts one [`Item::End`] per worker on the input channel.
pub(crate) fn send_end_signals(
    input_tx: &ChannelTx<Line>,
    worker_count: usize,
    shutdown_rx: &ShutdownRx,
) -> StemResult<()> {
    for _ in 0..worker_count {
        input_tx.put(Item::End, shutdown_rx)?;
    }

    debug!(worker_count, "termination signals sent to workers");

    Ok(())
}

//! The unit writing transformed lines to the output.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use stemline_config::shared::OutputOrder;
use tracing::{debug, info, warn};

use crate::concurrency::channel::ChannelRx;
use crate::concurrency::shutdown::ShutdownRx;
use crate::concurrency::window::WindowRx;
use crate::error::{ErrorKind, StemResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{SINK_BEFORE_WRITE_LINE, stem_fail_point};
use crate::stem_error;
use crate::types::{Item, ProcessedLine, SequenceNumber};

/// Where a pipeline writes its transformed lines.
pub enum LineOutput {
    /// A text file, created or truncated when the sink starts.
    Path(PathBuf),
    /// An already opened writer.
    Writer(Box<dyn Write + Send>),
}

impl LineOutput {
    /// Wraps any writer into a [`LineOutput`].
    pub fn writer<W>(writer: W) -> Self
    where
        W: Write + Send + 'static,
    {
        LineOutput::Writer(Box::new(writer))
    }

    fn open(self) -> StemResult<BufWriter<Box<dyn Write + Send>>> {
        let writer: Box<dyn Write + Send> = match self {
            LineOutput::Path(path) => {
                let file = File::create(&path).map_err(|err| {
                    stem_error!(
                        ErrorKind::OutputOpenFailed,
                        "Failed to open the output file",
                        format!("could not create '{}'", path.display()),
                        source: err
                    )
                })?;

                Box::new(file)
            }
            LineOutput::Writer(writer) => writer,
        };

        Ok(BufWriter::new(writer))
    }
}

impl fmt::Debug for LineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineOutput::Path(path) => f.debug_tuple("Path").field(path).finish(),
            LineOutput::Writer(_) => f.debug_tuple("Writer").finish_non_exhaustive(),
        }
    }
}

/// Holds records arriving out of order until all their predecessors have been written.
///
/// Its size is bounded by the order window the source acquires its permits from.
#[derive(Debug, Default)]
struct ReorderBuffer {
    pending: BTreeMap<SequenceNumber, ProcessedLine>,
    next_seq: SequenceNumber,
}

impl ReorderBuffer {
    fn insert(&mut self, record: ProcessedLine) {
        self.pending.insert(record.seq(), record);
    }

    fn try_pop_next(&mut self) -> Option<ProcessedLine> {
        let record = self.pending.remove(&self.next_seq)?;
        self.next_seq += 1;

        Some(record)
    }

    /// Removes every pending record in sequence order, gaps included.
    fn drain_remaining(&mut self) -> Vec<ProcessedLine> {
        std::mem::take(&mut self.pending).into_values().collect()
    }
}

/// Takes records off the output channel and appends their transformed text to the output.
///
/// The sink stops at the single [`Item::End`] pushed by the pipeline once every worker has
/// exited. The output is flushed on every exit path.
#[derive(Debug)]
pub struct LineSink {
    output: LineOutput,
    output_rx: ChannelRx<ProcessedLine>,
    order: OutputOrder,
    window_rx: Option<WindowRx>,
    shutdown_rx: ShutdownRx,
}

impl LineSink {
    pub fn new(
        output: LineOutput,
        output_rx: ChannelRx<ProcessedLine>,
        order: OutputOrder,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            output,
            output_rx,
            order,
            window_rx: None,
            shutdown_rx,
        }
    }

    /// Makes the sink release a permit of `window_rx` for every line written in input order.
    pub fn with_order_window(mut self, window_rx: WindowRx) -> Self {
        self.window_rx = Some(window_rx);
        self
    }

    /// Runs the sink to completion and returns the number of lines written.
    pub fn run(self) -> StemResult<u64> {
        let LineSink {
            output,
            output_rx,
            order,
            window_rx,
            shutdown_rx,
        } = self;

        info!(?output, %order, "starting line sink");

        // Dropping the receiver on failure lets the workers unwind with a closed channel.
        let mut writer = output.open()?;
        let mut reorder = match order {
            OutputOrder::Arrival => None,
            OutputOrder::Input => Some(ReorderBuffer::default()),
        };
        let mut lines_written = 0;

        let result = loop {
            let record = match output_rx.take(&shutdown_rx) {
                Ok(Item::Data(record)) => record,
                Ok(Item::End) => break Ok(()),
                Err(err) => break Err(err),
            };

            let written = match reorder.as_mut() {
                None => write_line(&mut writer, &record),
                Some(reorder) => {
                    reorder.insert(record);
                    write_ready(&mut writer, reorder, window_rx.as_ref())
                }
            };

            match written {
                Ok(count) => lines_written += count,
                Err(err) => break Err(err),
            }
        };

        let result = result.and_then(|()| {
            if let Some(reorder) = reorder.as_mut() {
                for record in reorder.drain_remaining() {
                    warn!(seq = record.seq(), "writing record after a sequence gap");
                    lines_written += write_line(&mut writer, &record)?;
                }
            }

            Ok(())
        });

        let flushed = writer.flush().map_err(|err| {
            stem_error!(
                ErrorKind::OutputWriteFailed,
                "Failed to flush the output",
                source: err
            )
        });

        match (result, flushed) {
            (Err(err), flushed) => {
                if let Err(flush_err) = flushed {
                    debug!(error = %flush_err, "could not flush output after failure");
                }

                warn!(lines_written, error = %err, "line sink stopped early");

                Err(err)
            }
            (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => {
                info!(lines_written, "line sink finished");

                Ok(lines_written)
            }
        }
    }
}

fn write_ready<W: Write>(
    writer: &mut W,
    reorder: &mut ReorderBuffer,
    window_rx: Option<&WindowRx>,
) -> StemResult<u64> {
    let mut written = 0;
    while let Some(record) = reorder.try_pop_next() {
        written += write_line(writer, &record)?;

        if let Some(window_rx) = window_rx {
            window_rx.release();
        }
    }

    Ok(written)
}

fn write_line<W: Write>(writer: &mut W, record: &ProcessedLine) -> StemResult<u64> {
    #[cfg(feature = "failpoints")]
    stem_fail_point(SINK_BEFORE_WRITE_LINE)?;

    writer
        .write_all(record.transformed().as_bytes())
        .and_then(|()| writer.write_all(b"\n"))
        .map_err(|err| {
            stem_error!(
                ErrorKind::OutputWriteFailed,
                "Failed to write to the output",
                format!("could not write line {}", record.seq()),
                source: err
            )
        })?;

    Ok(1)
}

use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, info, warn};

use crate::concurrency::channel::{ChannelRx, ChannelTx};
use crate::concurrency::panic::panic_message;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::StemResult;
use crate::transform::Transform;
use crate::types::{Item, Line, ProcessedLine};

/// Identifier of a worker inside its pool, starting at zero.
pub type WorkerId = usize;

/// Counters collected by one or more [`TransformWorker`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Lines taken off the input channel and turned into records.
    pub lines_transformed: u64,
    /// Lines passed through unchanged because their transformation failed.
    pub transform_failures: u64,
}

impl WorkerStats {
    pub(crate) fn merge(&mut self, other: WorkerStats) {
        self.lines_transformed += other.lines_transformed;
        self.transform_failures += other.transform_failures;
    }
}

/// Takes lines off the input channel, transforms them and puts the records on the output
/// channel until it receives [`Item::End`].
///
/// The worker never forwards the termination signal: the output channel is closed by the
/// pipeline once every worker has exited.
#[derive(Debug)]
pub struct TransformWorker<T> {
    id: WorkerId,
    transform: T,
    input_rx: ChannelRx<Line>,
    output_tx: ChannelTx<ProcessedLine>,
    shutdown_rx: ShutdownRx,
}

impl<T> TransformWorker<T>
where
    T: Transform,
{
    pub fn new(
        id: WorkerId,
        transform: T,
        input_rx: ChannelRx<Line>,
        output_tx: ChannelTx<ProcessedLine>,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            id,
            transform,
            input_rx,
            output_tx,
            shutdown_rx,
        }
    }

    /// Runs the worker until the termination signal arrives.
    ///
    /// Transformation failures are recovered by writing the line unchanged. Only channel
    /// failures, such as an interruption, end the worker with an error.
    pub fn run(mut self) -> StemResult<WorkerStats> {
        debug!(worker_id = self.id, "starting transform worker");

        let mut stats = WorkerStats::default();

        loop {
            let line = match self.input_rx.take(&self.shutdown_rx) {
                Ok(Item::Data(line)) => line,
                Ok(Item::End) => break,
                Err(err) => {
                    info!(
                        worker_id = self.id,
                        lines = stats.lines_transformed,
                        error = %err,
                        "transform worker stopped"
                    );

                    return Err(err);
                }
            };

            let transformed = self.transform_line(&line, &mut stats);
            stats.lines_transformed += 1;

            if let Err(err) = self.output_tx.put(
                Item::Data(ProcessedLine::new(line, transformed)),
                &self.shutdown_rx,
            ) {
                info!(
                    worker_id = self.id,
                    lines = stats.lines_transformed,
                    error = %err,
                    "transform worker stopped"
                );

                return Err(err);
            }
        }

        info!(
            worker_id = self.id,
            lines = stats.lines_transformed,
            failures = stats.transform_failures,
            "transform worker finished"
        );

        Ok(stats)
    }

    fn transform_line(&mut self, line: &Line, stats: &mut WorkerStats) -> String {
        let transform = &mut self.transform;
        let result = panic::catch_unwind(AssertUnwindSafe(|| transform.apply(line.text())));

        match result {
            Ok(Ok(transformed)) => transformed,
            Ok(Err(err)) => {
                stats.transform_failures += 1;
                warn!(
                    worker_id = self.id,
                    seq = line.seq(),
                    error = %err,
                    "transform failed, passing the line through unchanged"
                );

                line.text().to_owned()
            }
            Err(payload) => {
                stats.transform_failures += 1;
                warn!(
                    worker_id = self.id,
                    seq = line.seq(),
                    panic = %panic_message(payload.as_ref()),
                    "transform panicked, passing the line through unchanged"
                );

                line.text().to_owned()
            }
        }
    }
}

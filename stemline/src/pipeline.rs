//! The coordinator wiring the source, the workers and the sink together.

use std::fmt;
use std::thread::{self, JoinHandle};

use stemline_config::shared::{OutputOrder, PipelineConfig};
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::concurrency::channel::{ChannelTx, bounded_channel};
use crate::concurrency::panic::panic_message;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::concurrency::window::order_window;
use crate::error::{ErrorKind, StemError, StemResult};
use crate::sink::{LineOutput, LineSink};
use crate::source::{LineInput, LineSource, SourceStats, send_end_signals};
use crate::stem_error;
use crate::transform::Transform;
use crate::types::{Item, Line, PipelineReport, ProcessedLine};
use crate::workers::WorkerPool;

/// Lifecycle phase of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Created, no thread started yet.
    Idle,
    /// Every unit is running.
    Running,
    /// The pipeline is waiting for its units to finish.
    Draining,
    /// Every unit has exited, successfully or not.
    Terminated,
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::Running => "running",
            PipelinePhase::Draining => "draining",
            PipelinePhase::Terminated => "terminated",
        };

        f.write_str(phase)
    }
}

enum PipelineState {
    NotStarted {
        input: LineInput,
        output: LineOutput,
    },
    Started {
        source: JoinHandle<StemResult<SourceStats>>,
        workers: WorkerPool,
        sink: JoinHandle<StemResult<u64>>,
        // The coordinator only keeps senders: receivers held here would keep a channel open
        // after the unit draining it is gone.
        input_tx: ChannelTx<Line>,
        output_tx: ChannelTx<ProcessedLine>,
    },
    Draining,
    Finished,
}

impl fmt::Debug for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::NotStarted { input, output } => f
                .debug_struct("NotStarted")
                .field("input", input)
                .field("output", output)
                .finish(),
            PipelineState::Started { workers, .. } => f
                .debug_struct("Started")
                .field("workers", &workers.len())
                .finish_non_exhaustive(),
            PipelineState::Draining => f.write_str("Draining"),
            PipelineState::Finished => f.write_str("Finished"),
        }
    }
}

/// A bounded, multi-stage pipeline transforming every line of an input.
///
/// One source thread feeds a bounded input channel, a pool of worker threads applies the
/// transform and a single sink thread writes the results. Bounded channels keep memory use
/// constant and throttle fast units to the pace of slow ones.
#[derive(Debug)]
pub struct Pipeline<T> {
    config: PipelineConfig,
    transform: T,
    state: PipelineState,
    shutdown_tx: ShutdownTx,
}

impl<T> Pipeline<T>
where
    T: Transform + Clone,
{
    /// Creates a pipeline reading and writing the paths named in `config`.
    pub fn new(config: PipelineConfig, transform: T) -> Self {
        let input = LineInput::Path(config.input_path.clone());
        let output = LineOutput::Path(config.output_path.clone());

        Self::with_io(config, input, output, transform)
    }

    /// Creates a pipeline with explicit input and output, ignoring the paths in `config`.
    pub fn with_io(
        config: PipelineConfig,
        input: LineInput,
        output: LineOutput,
        transform: T,
    ) -> Self {
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config,
            transform,
            state: PipelineState::NotStarted { input, output },
            shutdown_tx,
        }
    }

    /// Returns the configuration of this pipeline.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the current lifecycle phase.
    pub fn phase(&self) -> PipelinePhase {
        match self.state {
            PipelineState::NotStarted { .. } => PipelinePhase::Idle,
            PipelineState::Started { .. } => PipelinePhase::Running,
            PipelineState::Draining => PipelinePhase::Draining,
            PipelineState::Finished => PipelinePhase::Terminated,
        }
    }

    /// Returns a handle able to shut the pipeline down from another thread.
    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Validates the configuration and starts every unit of the pipeline.
    pub fn start(&mut self) -> StemResult<()> {
        let PipelineState::NotStarted { .. } = self.state else {
            bail!(
                ErrorKind::InvalidState,
                "Pipeline already started",
                format!("cannot start a pipeline in the {} phase", self.phase())
            );
        };

        self.config.validate().map_err(|err| {
            stem_error!(
                ErrorKind::ConfigError,
                "Invalid pipeline configuration",
                err.to_string(),
                source: err
            )
        })?;

        let PipelineState::NotStarted { input, output } =
            std::mem::replace(&mut self.state, PipelineState::Finished)
        else {
            bail!(ErrorKind::InvalidState, "Pipeline already started");
        };

        info!(
            worker_count = self.config.worker_count,
            channel_capacity = self.config.channel_capacity,
            output_order = %self.config.output_order,
            "starting pipeline"
        );

        match self.spawn_units(input, output) {
            Ok(state) => {
                self.state = state;
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "failed to start pipeline, shutting down started units");
                self.shutdown_tx.shutdown();

                Err(err)
            }
        }
    }

    fn spawn_units(&self, input: LineInput, output: LineOutput) -> StemResult<PipelineState> {
        let worker_count = self.config.worker_count;
        let (input_tx, input_rx) = bounded_channel("input", self.config.channel_capacity);
        let (output_tx, output_rx) = bounded_channel("output", self.config.channel_capacity);

        let mut sink = LineSink::new(
            output,
            output_rx,
            self.config.output_order,
            self.shutdown_tx.subscribe(),
        );
        let mut source = LineSource::new(
            input,
            input_tx.clone(),
            worker_count,
            self.shutdown_tx.subscribe(),
        );

        if self.config.output_order == OutputOrder::Input {
            let window_size = self.config.order_window_size();
            let (window_tx, window_rx) = order_window(window_size);
            debug!(window_size, "bounding lines in flight for input order output");

            source = source.with_order_window(window_tx);
            sink = sink.with_order_window(window_rx);
        }

        let sink = spawn_unit("stemline-sink", move || sink.run())?;

        let workers = WorkerPool::spawn(
            worker_count,
            &self.transform,
            &input_rx,
            &output_tx,
            &self.shutdown_tx.subscribe(),
        )?;
        // Workers own the only receivers of the input channel from here on.
        drop(input_rx);

        let source = spawn_unit("stemline-source", move || source.run())?;

        Ok(PipelineState::Started {
            source,
            workers,
            sink,
            input_tx,
            output_tx,
        })
    }

    /// Waits for every unit to finish and returns the counters of the run.
    ///
    /// The source is joined first, then the workers are given at most the configured join
    /// timeout to exit. Only then is the termination signal sent to the sink, which is joined
    /// last. Failures of all units are aggregated into a single error.
    pub fn wait(&mut self) -> StemResult<PipelineReport> {
        let PipelineState::Started { .. } = self.state else {
            bail!(
                ErrorKind::InvalidState,
                "Pipeline not running",
                format!("cannot wait for a pipeline in the {} phase", self.phase())
            );
        };

        let PipelineState::Started {
            source,
            workers,
            sink,
            input_tx,
            output_tx,
        } = std::mem::replace(&mut self.state, PipelineState::Draining)
        else {
            bail!(ErrorKind::InvalidState, "Pipeline not running");
        };

        let result = self.drain(source, workers, sink, input_tx, output_tx);
        self.state = PipelineState::Finished;

        match &result {
            Ok(report) => info!(
                lines_read = report.lines_read,
                lines_written = report.lines_written,
                transform_failures = report.transform_failures,
                "pipeline completed successfully"
            ),
            Err(err) => error!(error = %err, "pipeline completed with an error"),
        }

        result
    }

    fn drain(
        &self,
        source: JoinHandle<StemResult<SourceStats>>,
        workers: WorkerPool,
        sink: JoinHandle<StemResult<u64>>,
        input_tx: ChannelTx<Line>,
        output_tx: ChannelTx<ProcessedLine>,
    ) -> StemResult<PipelineReport> {
        let shutdown_rx = self.shutdown_tx.subscribe();
        let mut errors = Vec::new();
        let mut report = PipelineReport::default();

        info!("waiting for line source to complete");

        match source.join() {
            Ok(Ok(stats)) => {
                report.lines_read = stats.lines_read;
                report.lines_skipped = stats.lines_skipped;
            }
            Ok(Err(err)) => errors.push(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "line source panicked, sending termination signals");
                errors.push(stem_error!(
                    ErrorKind::SourcePanic,
                    "Line source thread panicked",
                    message
                ));

                // The workers would otherwise wait forever for their signals.
                if let Err(err) =
                    send_end_signals(&input_tx, self.config.worker_count, &shutdown_rx)
                {
                    debug!(error = %err, "could not send termination signals on behalf of the source");
                }
            }
        }
        drop(input_tx);

        info!(
            worker_count = workers.len(),
            "waiting for transform workers to complete"
        );

        match workers.wait_all(self.config.worker_join_timeout(), &shutdown_rx) {
            Ok(stats) => {
                report.lines_transformed = stats.lines_transformed;
                report.transform_failures = stats.transform_failures;
            }
            Err(err) => errors.push(err),
        }

        // Workers never signal the sink, so a late record cannot follow the signal.
        if let Err(err) = output_tx.put(Item::End, &shutdown_rx) {
            debug!(error = %err, "could not send termination signal to the sink");
        }
        drop(output_tx);

        info!("waiting for line sink to complete");

        match sink.join() {
            Ok(Ok(lines_written)) => report.lines_written = lines_written,
            Ok(Err(err)) => errors.push(err),
            Err(payload) => errors.push(stem_error!(
                ErrorKind::SinkPanic,
                "Line sink thread panicked",
                panic_message(payload.as_ref())
            )),
        }

        if errors.is_empty() {
            return Ok(report);
        }

        Err(aggregate_errors(errors))
    }

    /// Starts the pipeline and waits for it to complete.
    pub fn run(&mut self) -> StemResult<PipelineReport> {
        self.start()?;
        self.wait()
    }

    /// Signals every unit to stop as soon as possible.
    ///
    /// Blocked units return an [`ErrorKind::Interrupted`] error, which [`Pipeline::wait`]
    /// then reports.
    pub fn shutdown(&self) {
        info!("trying to shut down the pipeline");

        if !self.shutdown_tx.shutdown() {
            info!("pipeline shutdown was already requested");
            return;
        }

        info!("shut down signal successfully sent to all units");
    }

    /// Shuts the pipeline down and waits for its units to exit.
    pub fn shutdown_and_wait(&mut self) -> StemResult<PipelineReport> {
        self.shutdown();
        self.wait()
    }
}

fn spawn_unit<F, R>(name: &'static str, f: F) -> StemResult<JoinHandle<StemResult<R>>>
where
    F: FnOnce() -> StemResult<R> + Send + 'static,
    R: Send + 'static,
{
    let handle = thread::Builder::new()
        .name(name.to_owned())
        .spawn(f)
        .map_err(|err| {
            stem_error!(
                ErrorKind::ThreadSpawnFailed,
                "Failed to spawn a pipeline thread",
                format!("thread '{name}' could not be spawned"),
                source: err
            )
        })?;

    debug!(thread = name, "spawned pipeline thread");

    Ok(handle)
}

/// Keeps the root causes of a failed run.
///
/// Units unblocked by another unit's exit report a closed channel, and every unit reports the
/// same interruption after a shutdown. Those follow-up errors are dropped when a more
/// specific error is present.
fn aggregate_errors(errors: Vec<StemError>) -> StemError {
    let (mut follow_ups, root_causes): (Vec<_>, Vec<_>) =
        errors.into_iter().partition(|err: &StemError| {
            err.kinds()
                .iter()
                .all(|kind| matches!(kind, ErrorKind::ChannelClosed | ErrorKind::Interrupted))
        });

    if !root_causes.is_empty() || follow_ups.is_empty() {
        return root_causes.into();
    }

    let index = follow_ups
        .iter()
        .position(|err| err.contains_kind(ErrorKind::Interrupted))
        .unwrap_or(0);
    let err = follow_ups.swap_remove(index);
    warn!(error = %err, "pipeline was interrupted");

    err
}

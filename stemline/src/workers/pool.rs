use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, at, select, unbounded};
use tracing::{debug, error, warn};

use crate::concurrency::channel::{ChannelRx, ChannelTx};
use crate::concurrency::panic::panic_message;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, StemResult};
use crate::stem_error;
use crate::transform::Transform;
use crate::types::{Line, ProcessedLine};
use crate::workers::transform::{TransformWorker, WorkerId, WorkerStats};

/// Reports the exit of a worker thread when dropped, panics included.
struct CompletionGuard {
    worker_id: WorkerId,
    completion_tx: Sender<WorkerId>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // The pool may already have given up waiting.
        let _ = self.completion_tx.send(self.worker_id);
    }
}

/// Pool of [`TransformWorker`] threads sharing the same input and output channels.
///
/// Every worker runs on its own named thread with a private clone of the transform.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<(WorkerId, JoinHandle<StemResult<WorkerStats>>)>,
    completion_rx: Receiver<WorkerId>,
}

impl WorkerPool {
    /// Spawns `worker_count` workers.
    ///
    /// If a thread cannot be spawned, the workers spawned so far are detached and keep
    /// running until the caller triggers shutdown.
    pub fn spawn<T>(
        worker_count: usize,
        transform: &T,
        input_rx: &ChannelRx<Line>,
        output_tx: &ChannelTx<ProcessedLine>,
        shutdown_rx: &ShutdownRx,
    ) -> StemResult<Self>
    where
        T: Transform + Clone,
    {
        let (completion_tx, completion_rx) = unbounded();
        let mut handles = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = TransformWorker::new(
                worker_id,
                transform.clone(),
                input_rx.clone(),
                output_tx.clone(),
                shutdown_rx.clone(),
            );
            let guard = CompletionGuard {
                worker_id,
                completion_tx: completion_tx.clone(),
            };

            let handle = thread::Builder::new()
                .name(format!("stemline-worker-{worker_id}"))
                .spawn(move || {
                    let _guard = guard;
                    worker.run()
                })
                .map_err(|err| {
                    stem_error!(
                        ErrorKind::ThreadSpawnFailed,
                        "Failed to spawn a worker thread",
                        format!("worker {worker_id} of {worker_count} could not be spawned"),
                        source: err
                    )
                })?;

            debug!(worker_id, "spawned worker in pool");

            handles.push((worker_id, handle));
        }

        Ok(Self {
            handles,
            completion_rx,
        })
    }

    /// Returns the number of workers in the pool.
    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Waits at most `timeout` for every worker to exit and collects their results.
    ///
    /// Workers still running when the timeout elapses, or when shutdown is requested, are
    /// detached and reported with a single [`ErrorKind::WorkerJoinTimeout`] or
    /// [`ErrorKind::Interrupted`] error. Errors of all workers are aggregated.
    pub fn wait_all(
        self,
        timeout: Duration,
        shutdown_rx: &ShutdownRx,
    ) -> StemResult<WorkerStats> {
        let deadline = at(Instant::now() + timeout);
        let total = self.handles.len();
        let mut finished = 0;
        let mut stopped = None;

        while finished < total {
            select! {
                recv(self.completion_rx) -> worker_id => match worker_id {
                    Ok(worker_id) => {
                        finished += 1;
                        debug!(worker_id, finished, total, "worker exited");
                    }
                    // Every guard is gone, so every worker has exited.
                    Err(_) => break,
                },
                recv(deadline) -> _ => {
                    stopped = Some(ErrorKind::WorkerJoinTimeout);
                    break;
                }
                recv(shutdown_rx.receiver()) -> _ => {
                    stopped = Some(ErrorKind::Interrupted);
                    break;
                }
            }
        }

        let mut stats = WorkerStats::default();
        let mut errors = Vec::new();
        let mut still_running = 0;

        for (worker_id, handle) in self.handles {
            if stopped.is_some() && !handle.is_finished() {
                still_running += 1;
                continue;
            }

            match handle.join() {
                Ok(Ok(worker_stats)) => stats.merge(worker_stats),
                Ok(Err(err)) => {
                    debug!(worker_id, error = %err, "worker completed with error");
                    errors.push(err);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(worker_id, panic = %message, "worker panicked");
                    errors.push(stem_error!(
                        ErrorKind::WorkerPanic,
                        "Worker thread panicked",
                        format!("worker {worker_id} panicked: {message}")
                    ));
                }
            }
        }

        match stopped {
            Some(ErrorKind::WorkerJoinTimeout) if still_running > 0 => {
                warn!(
                    still_running,
                    ?timeout,
                    "workers did not finish in time, detaching them"
                );
                errors.push(stem_error!(
                    ErrorKind::WorkerJoinTimeout,
                    "Workers did not finish in time",
                    format!(
                        "{still_running} of {total} workers were still running after {}ms",
                        timeout.as_millis()
                    )
                ));
            }
            Some(ErrorKind::Interrupted) if still_running > 0 => {
                warn!(still_running, "shutdown requested, detaching running workers");
                errors.push(stem_error!(
                    ErrorKind::Interrupted,
                    "Interrupted while waiting for workers",
                    format!(
                        "{still_running} of {total} workers were still running when shutdown was requested"
                    )
                ));
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(stats)
        } else {
            Err(errors.into())
        }
    }
}

use std::io::Cursor;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stemline_config::shared::{OutputOrder, PipelineConfig};

use crate::error::StemResult;
use crate::pipeline::Pipeline;
use crate::sink::LineOutput;
use crate::source::LineInput;
use crate::test_utils::output::SharedBuffer;
use crate::transform::Transform;
use crate::types::PipelineReport;

/// Join timeout used by test configurations, long enough to never fire on a healthy run.
pub const TEST_WORKER_JOIN_TIMEOUT_MS: u64 = 30_000;

/// Time after which [`with_deadline`] considers a run deadlocked.
pub const TEST_DEADLINE: Duration = Duration::from_secs(60);

/// Creates a configuration with the given number of workers and channel capacity.
pub fn test_config(worker_count: usize, channel_capacity: usize) -> PipelineConfig {
    PipelineConfig {
        input_path: PathBuf::from(PipelineConfig::DEFAULT_INPUT_PATH),
        output_path: PathBuf::from(PipelineConfig::DEFAULT_OUTPUT_PATH),
        worker_count,
        channel_capacity,
        worker_join_timeout_ms: TEST_WORKER_JOIN_TIMEOUT_MS,
        output_order: OutputOrder::Arrival,
    }
}

/// Joins `lines` into an input text, one line each.
pub fn input_text<S: AsRef<str>>(lines: &[S]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }

    text
}

/// Generates `count` lines of random words, some of them blank or padded with whitespace.
///
/// The same `seed` always yields the same lines.
pub fn generate_lines(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            if rng.gen_bool(0.1) {
                return " ".repeat(rng.gen_range(0..3));
            }

            let words: Vec<String> = (0..rng.gen_range(1..6))
                .map(|_| {
                    let len = rng.gen_range(1..10);
                    (&mut rng)
                        .sample_iter(&Alphanumeric)
                        .take(len)
                        .map(char::from)
                        .collect()
                })
                .collect();
            let padding = " ".repeat(rng.gen_range(0..3));

            format!("{padding}{}{padding}", words.join(" "))
        })
        .collect()
}

/// Returns the trimmed, non-blank lines of `lines`, sorted.
pub fn expected_multiset<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let mut expected: Vec<String> = lines
        .iter()
        .map(|line| line.as_ref().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect();
    expected.sort();

    expected
}

/// Outcome of [`run_on_lines`].
#[derive(Debug)]
pub struct TestRun {
    pub result: StemResult<PipelineReport>,
    pub output: Vec<String>,
}

impl TestRun {
    /// Returns the output lines, sorted.
    pub fn sorted_output(&self) -> Vec<String> {
        let mut output = self.output.clone();
        output.sort();

        output
    }
}

/// Builds a pipeline reading `lines` from memory and writing to a [`SharedBuffer`].
pub fn memory_pipeline<T, S>(
    config: PipelineConfig,
    lines: &[S],
    transform: T,
) -> (Pipeline<T>, SharedBuffer)
where
    T: Transform + Clone,
    S: AsRef<str>,
{
    let buffer = SharedBuffer::default();
    let pipeline = Pipeline::with_io(
        config,
        LineInput::reader(Cursor::new(input_text(lines))),
        LineOutput::writer(buffer.clone()),
        transform,
    );

    (pipeline, buffer)
}

/// Runs a pipeline over `lines` entirely in memory.
pub fn run_on_lines<T, S>(config: PipelineConfig, lines: &[S], transform: T) -> TestRun
where
    T: Transform + Clone,
    S: AsRef<str>,
{
    let (mut pipeline, buffer) = memory_pipeline(config, lines, transform);
    let result = pipeline.run();

    TestRun {
        result,
        output: buffer.lines(),
    }
}

/// Runs `f` on a separate thread and returns its result.
///
/// # Panics
///
/// Panics if `f` does not return within [`TEST_DEADLINE`] or panics itself.
pub fn with_deadline<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let _ = tx.send(f());
    });

    rx.recv_timeout(TEST_DEADLINE)
        .expect("run did not complete before the deadline or panicked")
}

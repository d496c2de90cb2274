use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use stemline::error::ErrorKind;
use stemline::pipeline::{Pipeline, PipelinePhase};
use stemline::test_utils::pipeline::{
    generate_lines, input_text, memory_pipeline, test_config, with_deadline,
};
use stemline::test_utils::transform::SlowIdentity;
use stemline::transform::{EnglishStemmer, Identity, transform_fn};
use stemline_telemetry::tracing::init_test_tracing;

#[test]
fn reads_and_writes_files() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(2, 100);
    config.input_path = dir.path().join("input.txt");
    config.output_path = dir.path().join("output.txt");

    fs::write(&config.input_path, "Running\n\n  Beautifully  \njumps\n").unwrap();
    fs::write(&config.output_path, "stale\nstale\nstale\nstale\nstale\n").unwrap();

    let output_path = config.output_path.clone();
    let report = with_deadline(move || Pipeline::new(config, EnglishStemmer::new()).run()).unwrap();

    let mut output: Vec<_> = fs::read_to_string(&output_path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect();
    output.sort();

    assert_eq!(output, vec!["beauti", "jump", "run"]);
    assert_eq!(report.lines_written, 3);
}

#[test]
fn missing_input_fails_and_leaves_an_empty_output() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(4, 2);
    config.input_path = dir.path().join("does-not-exist.txt");
    config.output_path = dir.path().join("output.txt");

    let output_path = config.output_path.clone();
    let err = with_deadline(move || Pipeline::new(config, Identity).run()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InputOpenFailed);
    assert_eq!(fs::read_to_string(&output_path).unwrap(), "");
}

#[test]
fn unopenable_output_terminates_without_hanging() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(3, 1);
    config.input_path = dir.path().join("input.txt");
    config.output_path = dir.path().join("missing-dir").join("output.txt");
    fs::write(&config.input_path, input_text(&generate_lines(5_000, 3))).unwrap();

    let err = with_deadline(move || Pipeline::new(config, Identity).run()).unwrap_err();

    assert_eq!(err.kinds(), vec![ErrorKind::OutputOpenFailed]);
}

#[test]
fn same_input_and_output_is_rejected() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(2, 2);
    config.input_path = dir.path().join("lines.txt");
    config.output_path = dir.path().join("lines.txt");
    fs::write(&config.input_path, "keep me\n").unwrap();

    let err = Pipeline::new(config, Identity).run().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert_eq!(
        fs::read_to_string(dir.path().join("lines.txt")).unwrap(),
        "keep me\n"
    );
}

#[test]
fn shutdown_interrupts_a_running_pipeline() {
    init_test_tracing();

    let lines = generate_lines(10_000, 5);
    let (mut pipeline, buffer) = memory_pipeline(
        test_config(2, 2),
        &lines,
        SlowIdentity::new(Duration::from_millis(2)),
    );

    pipeline.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let err = pipeline.shutdown_and_wait().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Interrupted);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(pipeline.phase(), PipelinePhase::Terminated);
    // Lines written before the interruption are kept.
    assert!(buffer.lines().len() < 10_000);
}

#[test]
fn shutdown_can_be_requested_from_another_thread() {
    init_test_tracing();

    let lines = generate_lines(10_000, 9);
    let (mut pipeline, _buffer) = memory_pipeline(
        test_config(4, 8),
        &lines,
        SlowIdentity::new(Duration::from_millis(1)),
    );
    let shutdown_tx = pipeline.shutdown_tx();

    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        shutdown_tx.shutdown()
    });

    let err = with_deadline(move || pipeline.run()).unwrap_err();

    assert!(trigger.join().unwrap());
    assert!(err.contains_kind(ErrorKind::Interrupted));
}

#[test]
fn slow_workers_past_the_join_timeout_are_reported() {
    init_test_tracing();

    let mut config = test_config(2, 4);
    config.worker_join_timeout_ms = 50;

    let (mut pipeline, buffer) = memory_pipeline(
        config,
        &["slow line"],
        SlowIdentity::new(Duration::from_millis(1_000)),
    );

    let started = Instant::now();
    let err = with_deadline(move || {
        let result = pipeline.run();
        (result, pipeline.phase())
    });
    let (result, phase) = err;
    let err = result.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WorkerJoinTimeout);
    assert_eq!(err.detail(), Some("1 of 2 workers were still running after 50ms"));
    assert!(started.elapsed() < Duration::from_millis(1_000));
    assert_eq!(phase, PipelinePhase::Terminated);
    // The sink was terminated before the slow worker delivered its record.
    assert!(buffer.lines().is_empty());
}

#[test]
fn shutdown_does_not_wait_for_busy_workers() {
    init_test_tracing();

    let release = Arc::new(AtomicBool::new(false));
    let transform = {
        let release = release.clone();
        transform_fn(move |line: &str| {
            while !release.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(5));
            }

            Ok(line.to_owned())
        })
    };

    let mut config = test_config(1, 4);
    config.worker_join_timeout_ms = 60_000;
    let (mut pipeline, buffer) = memory_pipeline(config, &["busy line"], transform);

    pipeline.start().unwrap();
    thread::sleep(Duration::from_millis(100));

    let started = Instant::now();
    let (result, phase) = with_deadline(move || {
        let result = pipeline.shutdown_and_wait();
        (result, pipeline.phase())
    });
    let elapsed = started.elapsed();
    release.store(true, Ordering::SeqCst);

    assert_eq!(result.unwrap_err().kinds(), vec![ErrorKind::Interrupted]);
    assert!(elapsed < Duration::from_secs(10));
    assert_eq!(phase, PipelinePhase::Terminated);
    assert!(buffer.lines().is_empty());
}

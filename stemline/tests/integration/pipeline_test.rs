use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use stemline::error::ErrorKind;
use stemline::test_utils::pipeline::{
    expected_multiset, generate_lines, run_on_lines, test_config, with_deadline,
};
use stemline::test_utils::transform::{CountingIdentity, FaultyUppercase};
use stemline::transform::{EnglishStemmer, Identity, Lowercase, transform_fn};
use stemline_config::shared::OutputOrder;
use stemline_telemetry::tracing::init_test_tracing;

#[test]
fn stems_every_non_blank_line() {
    init_test_tracing();

    let lines = ["Running", "", "  Beautifully  ", "jumps"];
    let run = with_deadline(move || run_on_lines(test_config(2, 100), &lines, EnglishStemmer::new()));

    let report = run.result.as_ref().unwrap();
    assert_eq!(run.sorted_output(), vec!["beauti", "jump", "run"]);
    assert_eq!(report.lines_read, 4);
    assert_eq!(report.lines_skipped, 1);
    assert_eq!(report.lines_transformed, 3);
    assert_eq!(report.transform_failures, 0);
    assert_eq!(report.lines_written, 3);
}

#[test]
fn single_worker_with_unit_capacity_copies_the_input_in_order() {
    init_test_tracing();

    let lines: Vec<String> = (0..1000).map(|i| format!("line number {i}")).collect();
    let expected = lines.clone();

    let run = with_deadline(move || run_on_lines(test_config(1, 1), &lines, Identity));

    assert_eq!(run.result.as_ref().unwrap().lines_written, 1000);
    assert_eq!(run.output, expected);
}

#[test]
fn identity_reproduces_the_trimmed_non_blank_lines() {
    init_test_tracing();

    let lines = generate_lines(2_000, 7);
    let expected = expected_multiset(&lines);

    let run = with_deadline(move || run_on_lines(test_config(5, 100), &lines, Identity));
    let report = run.result.as_ref().unwrap();

    assert_eq!(run.sorted_output(), expected);
    assert_eq!(report.lines_written as usize, expected.len());
    assert_eq!(report.lines_read, 2_000);
    assert_eq!(report.lines_read - report.lines_skipped, report.lines_written);
}

#[test]
fn terminates_for_every_worker_count_and_capacity() {
    init_test_tracing();

    for worker_count in [1, 2, 3, 8, 16] {
        for channel_capacity in [1, 2, 7, 100] {
            let lines = generate_lines(300, (worker_count * 1000 + channel_capacity) as u64);
            let expected = expected_multiset(&lines);

            let run = with_deadline(move || {
                run_on_lines(test_config(worker_count, channel_capacity), &lines, Lowercase)
            });

            let expected: Vec<String> = {
                let mut lowered: Vec<String> = expected.iter().map(|l| l.to_lowercase()).collect();
                lowered.sort();
                lowered
            };
            assert!(
                run.result.is_ok(),
                "run with {worker_count} workers and capacity {channel_capacity} failed: {:?}",
                run.result
            );
            assert_eq!(run.sorted_output(), expected);
        }
    }
}

#[test]
fn more_workers_than_lines_terminates() {
    init_test_tracing();

    let run = with_deadline(|| run_on_lines(test_config(32, 1), &["only", "two"], Identity));

    assert_eq!(run.result.as_ref().unwrap().lines_written, 2);
    assert_eq!(run.sorted_output(), vec!["only", "two"]);
}

#[test]
fn blank_only_input_yields_empty_output() {
    init_test_tracing();

    let run = with_deadline(|| run_on_lines(test_config(3, 4), &["", "   ", "\t"], Identity));
    let report = run.result.as_ref().unwrap();

    assert!(run.output.is_empty());
    assert_eq!(report.lines_read, 3);
    assert_eq!(report.lines_skipped, 3);
    assert_eq!(report.lines_written, 0);
}

#[test]
fn every_line_is_transformed_exactly_once() {
    init_test_tracing();

    let lines = generate_lines(1_000, 11);
    let expected = expected_multiset(&lines).len() as u64;
    let transform = CountingIdentity::default();

    let run = {
        let transform = transform.clone();
        with_deadline(move || run_on_lines(test_config(6, 3), &lines, transform))
    };

    assert_eq!(run.result.as_ref().unwrap().lines_transformed, expected);
    assert_eq!(transform.calls(), expected);
}

#[test]
fn ordered_mode_writes_lines_in_input_order() {
    init_test_tracing();

    for worker_count in [1, 4, 12] {
        let lines = generate_lines(1_500, worker_count as u64);
        let expected: Vec<String> = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        let mut config = test_config(worker_count, 4);
        config.output_order = OutputOrder::Input;

        let run = with_deadline(move || run_on_lines(config, &lines, Identity));

        assert!(run.result.is_ok());
        assert_eq!(run.output, expected);
    }
}

#[test]
fn ordered_mode_bounds_lines_overtaking_a_slow_line() {
    init_test_tracing();

    let overtaking = Arc::new(AtomicU64::new(0));
    let overtaken_by = Arc::new(AtomicU64::new(0));
    let transform = {
        let overtaking = overtaking.clone();
        let overtaken_by = overtaken_by.clone();
        transform_fn(move |line: &str| {
            if line == "line 0" {
                thread::sleep(Duration::from_millis(300));
                overtaken_by.store(overtaking.load(Ordering::SeqCst), Ordering::SeqCst);
            } else {
                overtaking.fetch_add(1, Ordering::SeqCst);
            }

            Ok(line.to_owned())
        })
    };

    let mut config = test_config(2, 1);
    config.output_order = OutputOrder::Input;
    let window = config.order_window_size() as u64;

    let lines: Vec<String> = (0..1_000).map(|i| format!("line {i}")).collect();
    let expected = lines.clone();
    let run = with_deadline(move || run_on_lines(config, &lines, transform));

    assert_eq!(run.result.as_ref().unwrap().lines_written, 1_000);
    assert_eq!(run.output, expected);

    // Only the lines admitted alongside the slow one can get ahead of it.
    let overtaken_by = overtaken_by.load(Ordering::SeqCst);
    assert!(
        overtaken_by < window,
        "{overtaken_by} lines overtook the slow line with a window of {window}"
    );
}

#[test]
fn failing_lines_pass_through_without_affecting_others() {
    init_test_tracing();

    let lines = [
        "first line",
        "please fail here",
        "second line",
        "please panic here",
        "third line",
    ];

    let run = with_deadline(move || {
        run_on_lines(test_config(3, 2), &lines, FaultyUppercase::new("fail", "panic"))
    });
    let report = run.result.as_ref().unwrap();

    let output: HashSet<_> = run.output.iter().map(String::as_str).collect();
    let expected: HashSet<_> = [
        "FIRST LINE",
        "please fail here",
        "SECOND LINE",
        "please panic here",
        "THIRD LINE",
    ]
    .into_iter()
    .collect();

    assert_eq!(output, expected);
    assert_eq!(run.output.len(), 5);
    assert_eq!(report.transform_failures, 2);
    assert_eq!(report.lines_written, 5);
}

#[test]
fn zero_workers_is_rejected() {
    init_test_tracing();

    let run = run_on_lines(test_config(0, 4), &["a"], Identity);

    assert_eq!(run.result.as_ref().unwrap_err().kind(), ErrorKind::ConfigError);
    assert!(run.output.is_empty());
}

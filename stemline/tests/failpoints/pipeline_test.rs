use stemline::error::ErrorKind;
use stemline::failpoints::{SINK_BEFORE_WRITE_LINE, SOURCE_BEFORE_READ_LINE};
use stemline::test_utils::failpoints::CustomFailScenario;
use stemline::test_utils::pipeline::{generate_lines, run_on_lines, test_config, with_deadline};
use stemline::transform::Identity;
use stemline_telemetry::tracing::init_test_tracing;

fn numbered_lines(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("line {i}")).collect()
}

#[test]
fn source_read_failure_still_terminates_workers() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(SOURCE_BEFORE_READ_LINE, "3*off->return")]);

    let lines = numbered_lines(10);
    let run = with_deadline(move || run_on_lines(test_config(4, 2), &lines, Identity));

    assert_eq!(run.result.as_ref().unwrap_err().kind(), ErrorKind::FailPoint);
    // Lines read before the failure still reach the output.
    assert_eq!(run.sorted_output(), vec!["line 0", "line 1", "line 2"]);
}

#[test]
fn source_panic_is_recovered_by_the_pipeline() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(SOURCE_BEFORE_READ_LINE, "2*off->panic")]);

    let lines = numbered_lines(10);
    let run = with_deadline(move || run_on_lines(test_config(3, 1), &lines, Identity));

    assert_eq!(run.result.as_ref().unwrap_err().kind(), ErrorKind::SourcePanic);
    assert_eq!(run.sorted_output(), vec!["line 0", "line 1"]);
}

#[test]
fn sink_write_failure_unwinds_every_unit() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(SINK_BEFORE_WRITE_LINE, "5*off->return(io)")]);

    let lines = generate_lines(5_000, 1);
    let run = with_deadline(move || run_on_lines(test_config(4, 1), &lines, Identity));

    let err = run.result.as_ref().unwrap_err();
    assert_eq!(err.kinds(), vec![ErrorKind::IoError]);
    assert_eq!(run.output.len(), 5);
}

#[test]
fn sink_panic_unwinds_every_unit() {
    init_test_tracing();
    let _scenario = CustomFailScenario::setup(&[(SINK_BEFORE_WRITE_LINE, "panic")]);

    let lines = generate_lines(5_000, 2);
    let run = with_deadline(move || run_on_lines(test_config(2, 1), &lines, Identity));

    assert_eq!(run.result.as_ref().unwrap_err().kinds(), vec![ErrorKind::SinkPanic]);
    assert!(run.output.is_empty());
}

use std::fs;

use stemline::pipeline::Pipeline;
use stemline::test_utils::pipeline::with_deadline;
use stemline::transform::BuiltinTransform;
use stemline_config::load_config;
use stemline_config::shared::{OutputOrder, PipelineConfig};
use stemline_telemetry::tracing::init_test_tracing;

#[test]
fn pipeline_runs_from_a_configuration_file() {
    init_test_tracing();

    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("words.txt");
    let output_path = dir.path().join("stems.txt");
    let config_path = dir.path().join("stemline.yaml");

    fs::write(&input_path, "Running fast\n\nJumping\nflowers bloomed\n").unwrap();
    fs::write(
        &config_path,
        format!(
            "input_path: {}\noutput_path: {}\nworker_count: 3\nchannel_capacity: 2\noutput_order: input\n",
            input_path.display(),
            output_path.display()
        ),
    )
    .unwrap();

    let config: PipelineConfig = load_config(Some(&config_path)).unwrap();
    assert_eq!(config.worker_count, 3);
    assert_eq!(config.output_order, OutputOrder::Input);

    let report =
        with_deadline(move || Pipeline::new(config, BuiltinTransform::stem()).run()).unwrap();

    assert_eq!(report.lines_written, 3);
    assert_eq!(
        fs::read_to_string(&output_path).unwrap(),
        "run fast\njump\nflower bloom\n"
    );
}

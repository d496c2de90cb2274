use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use stemline::transform::BuiltinTransform;
use stemline_config::load_config;
use stemline_config::shared::{OutputOrder, PipelineConfig};

use crate::error::CliResult;

/// Transforms every line of a text file with a pool of worker threads.
#[derive(Debug, Parser)]
#[command(name = "stemline", version, about)]
pub struct Args {
    /// Input file, one item per line [default: input.txt].
    pub input: Option<PathBuf>,

    /// Output file, truncated before writing [default: output.txt].
    pub output: Option<PathBuf>,

    /// Number of worker threads.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Capacity of the channels between the units.
    #[arg(short, long)]
    pub capacity: Option<usize>,

    /// Seconds to wait for the workers once the input is exhausted.
    #[arg(long)]
    pub join_timeout_secs: Option<u64>,

    /// Write lines in input order instead of completion order.
    #[arg(long)]
    pub preserve_order: bool,

    /// Transformation applied to every line.
    #[arg(long, value_enum, default_value_t = TransformArg::Stem)]
    pub transform: TransformArg,

    /// Configuration file (YAML, TOML or JSON) providing defaults for every setting.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Transformations selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransformArg {
    /// English Snowball stemming of every word.
    Stem,
    /// Copy lines unchanged.
    Identity,
    /// Lowercase lines.
    Lowercase,
}

impl From<TransformArg> for BuiltinTransform {
    fn from(value: TransformArg) -> Self {
        match value {
            TransformArg::Stem => BuiltinTransform::stem(),
            TransformArg::Identity => BuiltinTransform::Identity,
            TransformArg::Lowercase => BuiltinTransform::Lowercase,
        }
    }
}

/// Loads the configuration layers and applies the command line overrides on top.
///
/// Returns the validated configuration.
pub fn resolve_config(args: &Args) -> CliResult<PipelineConfig> {
    let config = load_config::<PipelineConfig>(args.config.as_deref())?;
    let config = apply_overrides(config, args);
    config.validate()?;

    Ok(config)
}

fn apply_overrides(mut config: PipelineConfig, args: &Args) -> PipelineConfig {
    match &args.input {
        Some(input) => config.input_path = input.clone(),
        None => println!(
            "No input file specified. Using: {}",
            config.input_path.display()
        ),
    }

    match &args.output {
        Some(output) => config.output_path = output.clone(),
        None => println!(
            "No output file specified. Using: {}",
            config.output_path.display()
        ),
    }

    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }

    if let Some(capacity) = args.capacity {
        config.channel_capacity = capacity;
    }

    if let Some(secs) = args.join_timeout_secs {
        config.worker_join_timeout_ms = secs.saturating_mul(1_000);
    }

    if args.preserve_order {
        config.output_order = OutputOrder::Input;
    }

    config
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::error::ErrorKind as ClapErrorKind;

    use super::*;
    use crate::error::CliError;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("stemline").chain(args.iter().copied()))
    }

    #[test]
    fn positionals_are_optional() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.input, None);
        assert_eq!(args.output, None);
        assert_eq!(args.transform, TransformArg::Stem);

        let args = parse(&["in.txt"]).unwrap();
        assert_eq!(args.input, Some(PathBuf::from("in.txt")));
        assert_eq!(args.output, None);

        let args = parse(&["in.txt", "out.txt"]).unwrap();
        assert_eq!(args.output, Some(PathBuf::from("out.txt")));
    }

    #[test]
    fn more_than_two_positionals_is_a_usage_error() {
        let err = parse(&["a.txt", "b.txt", "c.txt"]).unwrap_err();

        assert_eq!(err.kind(), ClapErrorKind::UnknownArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn flags_override_the_defaults() {
        let args = parse(&[
            "in.txt",
            "out.txt",
            "--workers",
            "8",
            "--capacity",
            "16",
            "--join-timeout-secs",
            "3",
            "--preserve-order",
            "--transform",
            "lowercase",
        ])
        .unwrap();

        let config = apply_overrides(PipelineConfig::default(), &args);

        assert_eq!(config.input_path, PathBuf::from("in.txt"));
        assert_eq!(config.output_path, PathBuf::from("out.txt"));
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.channel_capacity, 16);
        assert_eq!(config.worker_join_timeout_ms, 3_000);
        assert_eq!(config.output_order, OutputOrder::Input);
        assert_eq!(args.transform, TransformArg::Lowercase);
    }

    #[test]
    fn defaults_are_kept_without_flags() {
        let args = parse(&[]).unwrap();
        let config = apply_overrides(PipelineConfig::default(), &args);

        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn flags_take_precedence_over_the_configuration_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("stemline.toml");
        fs::write(&config_path, "worker_count = 2\nchannel_capacity = 4\n").unwrap();

        let config_arg = config_path.to_string_lossy().into_owned();
        let args = parse(&["--config", &config_arg, "--workers", "6"]).unwrap();
        let config = resolve_config(&args).unwrap();

        assert_eq!(config.worker_count, 6);
        assert_eq!(config.channel_capacity, 4);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let args = parse(&["--workers", "0"]).unwrap();

        assert!(matches!(
            resolve_config(&args).unwrap_err(),
            CliError::InvalidConfig(_)
        ));
    }
}

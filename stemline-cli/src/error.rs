use stemline::error::StemError;
use stemline_config::LoadConfigError;
use stemline_config::shared::ValidationError;
use stemline_telemetry::tracing::TracingError;
use thiserror::Error;

/// Result type for the command line tool.
pub type CliResult<T> = Result<T, CliError>;

/// Errors ending a run of the command line tool.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to load configuration: {0}")]
    LoadConfig(#[from] LoadConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("failed to initialize logging: {0}")]
    Telemetry(#[from] TracingError),

    #[error("failed to start the runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("{0}")]
    Pipeline(#[from] StemError),
}

impl CliError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            CliError::LoadConfig(_) | CliError::InvalidConfig(_) => "configuration error",
            CliError::Telemetry(_) | CliError::Runtime(_) | CliError::Join(_) => "runtime error",
            CliError::Pipeline(_) => "pipeline error",
        }
    }

    /// Returns a report suited for terminal output.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("stemline failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        // Aggregated pipeline errors already list every cause.
        if !matches!(self, CliError::Pipeline(_)) {
            let mut source = std::error::Error::source(self);
            let mut index = 1;
            while let Some(err) = source {
                out.push_str(&format!("cause {index}: {err}\n"));
                source = err.source();
                index += 1;
            }
        }

        out
    }
}

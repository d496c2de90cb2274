use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Prefix for environment variable configuration overrides.
pub const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

/// Supported extensions for configuration files.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// The requested configuration file does not exist.
    #[error("configuration file `{0}` does not exist")]
    MissingConfigurationFile(PathBuf),

    /// The configuration file has an extension the loader cannot parse.
    #[error("configuration file `{path}` has an unsupported extension; expected one of: {expected}")]
    UnsupportedExtension { path: PathBuf, expected: String },

    /// A configuration file existed but could not be parsed.
    #[error("failed to load configuration from `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: config::ConfigError,
    },

    /// Failed to build the layered configuration.
    #[error("failed to initialize configuration builder: {0}")]
    Builder(#[source] config::ConfigError),

    /// The configuration sources were merged but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads configuration from an optional file and `APP_`-prefixed environment variables.
///
/// Values missing from every source fall back to the serde defaults of `T`. Environment
/// variables take precedence over the file, e.g. `APP_WORKER_COUNT=8`. Nested keys use
/// double underscores (`APP_SECTION__KEY`).
pub fn load_config<T>(file: Option<&Path>) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    load_config_with_env(file, None)
}

/// Same as [`load_config`] but reads overrides from `env` instead of the process
/// environment when provided.
pub(crate) fn load_config_with_env<T>(
    file: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        validate_configuration_file(path)?;

        let file_source = config::File::from(path.to_path_buf()).required(true);
        builder = builder.add_source(file_source);

        // We build once here so that parse errors point at the file instead of at the merged
        // configuration.
        builder
            .build_cloned()
            .map_err(|source| LoadConfigError::ConfigurationFileLoad {
                path: path.to_path_buf(),
                source,
            })?;
    }

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .source(env);

    let settings = builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn validate_configuration_file(path: &Path) -> Result<(), LoadConfigError> {
    if !path.is_file() {
        return Err(LoadConfigError::MissingConfigurationFile(
            path.to_path_buf(),
        ));
    }

    let supported = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| CONFIG_FILE_EXTENSIONS.contains(&extension));

    if !supported {
        let expected = CONFIG_FILE_EXTENSIONS
            .iter()
            .map(|extension| format!("`.{extension}`"))
            .collect::<Vec<_>>()
            .join(", ");

        return Err(LoadConfigError::UnsupportedExtension {
            path: path.to_path_buf(),
            expected,
        });
    }

    Ok(())
}

use std::io;
use std::path::{Path, PathBuf};

use rust_cli_config::{File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;
use crate::shared::ValidationError;

/// Directory, relative to the working directory, holding the configuration files.
const CONFIGURATION_DIR: &str = "configuration";

/// Stem of the file every environment starts from.
const BASE_STEM: &str = "base";

/// Accepted file extensions, in lookup order.
const EXTENSIONS: &[(&str, FileFormat)] = &[
    ("yaml", FileFormat::Yaml),
    ("yml", FileFormat::Yaml),
    ("json", FileFormat::Json),
];

/// Prefix of environment variables overriding file values, as in `APP_DISPATCH__WORKER_COUNT`.
const ENV_PREFIX: &str = "APP";

/// Separator between nested keys in override variables.
const ENV_SEPARATOR: &str = "__";

/// Configuration document that can be loaded with [`load_config`].
pub trait Config: DeserializeOwned {
    /// Checks invariants serde cannot express. Runs after every layer is merged.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Errors raised while loading a configuration document.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    /// No file with a supported extension was found for a layer.
    #[error("no `{stem}` configuration in `{directory}` (looked for {extensions})")]
    ConfigurationFileMissing {
        stem: String,
        directory: PathBuf,
        extensions: String,
    },

    /// A layer file exists but is not a valid document.
    #[error("failed to parse `{path}`: {source}")]
    ConfigurationFileLoad {
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    #[error("failed to merge configuration layers: {0}")]
    Merge(#[source] rust_cli_config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

/// Loads `T` from `./configuration` for the environment named by `APP_ENVIRONMENT`.
pub fn load_config<T: Config>() -> Result<T, LoadConfigError> {
    let cwd = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load()?;

    load_config_from(&cwd.join(CONFIGURATION_DIR), environment)
}

/// Loads `T` from `directory` by merging, lowest precedence first:
/// 1. `base.(yaml|yml|json)`,
/// 2. `{environment}.(yaml|yml|json)`,
/// 3. `APP_`-prefixed environment variables, nested with `__`.
///
/// The merged document is validated before it is returned.
pub fn load_config_from<T: Config>(
    directory: &Path,
    environment: Environment,
) -> Result<T, LoadConfigError> {
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base = layer(directory, BASE_STEM)?;
    let overrides = layer(directory, environment.as_str())?;
    let variables = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(ENV_SEPARATOR);

    let config: T = rust_cli_config::Config::builder()
        .add_source(base)
        .add_source(overrides)
        .add_source(variables)
        .build()
        .map_err(LoadConfigError::Merge)?
        .try_deserialize()
        .map_err(LoadConfigError::Deserialization)?;
    config.validate()?;

    Ok(config)
}

/// Finds the file for one layer and checks that it parses on its own, so a broken file is
/// reported by path rather than as a merge failure.
fn layer(
    directory: &Path,
    stem: &str,
) -> Result<File<rust_cli_config::FileSourceFile, FileFormat>, LoadConfigError> {
    let Some((path, format)) = EXTENSIONS
        .iter()
        .map(|(extension, format)| (directory.join(format!("{stem}.{extension}")), *format))
        .find(|(path, _)| path.is_file())
    else {
        return Err(LoadConfigError::ConfigurationFileMissing {
            stem: stem.to_owned(),
            directory: directory.to_path_buf(),
            extensions: EXTENSIONS
                .iter()
                .map(|(extension, _)| *extension)
                .collect::<Vec<_>>()
                .join(", "),
        });
    };

    let file = File::from(path.as_path()).format(format);
    rust_cli_config::Config::builder()
        .add_source(file.clone())
        .build()
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            path: path.clone(),
            source,
        })?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::shared::PipelineConfig;

    fn scratch_directory() -> PathBuf {
        let directory =
            std::env::temp_dir().join(format!("conduit-config-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&directory).unwrap();
        directory
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let directory = scratch_directory();
        fs::write(
            directory.join("base.yaml"),
            "dispatch:\n  worker_count: 4\n  total_items: 100\nconsumer:\n  deadline_ms: 1000\n",
        )
        .unwrap();
        fs::write(
            directory.join("prod.json"),
            r#"{ "dispatch": { "worker_count": 16 }, "channel": { "capacity": 8 } }"#,
        )
        .unwrap();

        let config: PipelineConfig = load_config_from(&directory, Environment::Prod).unwrap();

        assert_eq!(config.dispatch.worker_count, 16);
        assert_eq!(config.dispatch.total_items, 100);
        assert_eq!(config.consumer.deadline_ms, 1000);
        assert_eq!(config.channel.capacity, 8);

        fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn invalid_merged_document_is_rejected() {
        let directory = scratch_directory();
        fs::write(directory.join("base.yaml"), "channel:\n  capacity: 4\n").unwrap();
        fs::write(directory.join("dev.yml"), "channel:\n  capacity: 0\n").unwrap();

        let err = load_config_from::<PipelineConfig>(&directory, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::Validation(ValidationError::ChannelCapacityZero)
        ));

        fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn broken_layer_is_reported_by_path() {
        let directory = scratch_directory();
        fs::write(directory.join("base.yaml"), "dispatch: {}\n").unwrap();
        fs::write(directory.join("dev.json"), "{ not json").unwrap();

        let err = load_config_from::<PipelineConfig>(&directory, Environment::Dev).unwrap_err();

        match err {
            LoadConfigError::ConfigurationFileLoad { path, .. } => {
                assert_eq!(path, directory.join("dev.json"));
            }
            other => panic!("unexpected error: {other}"),
        }

        fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn missing_environment_file_is_reported() {
        let directory = scratch_directory();
        fs::write(directory.join("base.yaml"), "dispatch:\n  worker_count: 1\n").unwrap();

        let err = load_config_from::<PipelineConfig>(&directory, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::ConfigurationFileMissing { ref stem, .. } if stem == "dev"
        ));

        fs::remove_dir_all(directory).unwrap();
    }

    #[test]
    fn missing_directory_is_reported() {
        let directory = std::env::temp_dir().join(format!("missing-{}", uuid::Uuid::new_v4()));

        let err = load_config_from::<PipelineConfig>(&directory, Environment::Dev).unwrap_err();

        assert!(matches!(
            err,
            LoadConfigError::MissingConfigurationDirectory(_)
        ));
    }
}

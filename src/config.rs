//! Run configuration, decoded from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::dataset::{DatasetRegistry, DatasetSpec};
use crate::instance::InstanceOption;
use crate::query_type::QueryType;

/// A validated benchmark configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Query types to run, in order.
    pub query_types: Vec<QueryType>,
    /// Datasets to run, in order. Names are lower-cased.
    pub datasets: Vec<DatasetSpec>,
    /// Instances to benchmark, one worker each.
    pub instances: Vec<InstanceOption>,
    /// Directory receiving the report files.
    pub report_dir: PathBuf,
    /// Cases per (dataset, query type) pair.
    pub n: usize,
    /// Base seed for case generation.
    pub seed: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    query_types: Vec<String>,
    #[serde(default)]
    datasets: Vec<DatasetSpec>,
    #[serde(default)]
    instances: Vec<InstanceOption>,
    report_dir: PathBuf,
    n: i64,
    #[serde(default)]
    seed: u64,
}

impl Config {
    /// Decodes and validates a configuration document.
    pub fn decode(content: &str, registry: &DatasetRegistry) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|source| ConfigError::Parse { source })?;
        let query_types = raw
            .query_types
            .iter()
            .map(|name| {
                QueryType::parse(name).map_err(|_| ConfigError::UnknownQueryType {
                    name: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut datasets = raw.datasets;
        for ds in &mut datasets {
            if !registry.contains(&ds.name) {
                return Err(ConfigError::UnknownDataset {
                    name: ds.name.clone(),
                });
            }
            ds.name = ds.name.to_lowercase();
        }
        let n = usize::try_from(raw.n)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidCaseCount { n: raw.n })?;
        Ok(Self {
            query_types,
            datasets,
            instances: raw.instances,
            report_dir: raw.report_dir,
            n,
            seed: raw.seed,
        })
    }

    /// Reads and decodes the configuration file at `path`.
    pub fn load(path: &Path, registry: &DatasetRegistry) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&content, registry)
    }
}

/// Failures while reading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File that was read.
        path: PathBuf,
        /// I/O cause.
        source: std::io::Error,
    },
    /// The document is not valid TOML for this schema.
    #[error("failed to parse config: {source}")]
    Parse {
        /// TOML cause.
        source: toml::de::Error,
    },
    /// A dataset name is not registered.
    #[error("unknown dataset={name}")]
    UnknownDataset {
        /// Offending name.
        name: String,
    },
    /// A query-type name is not part of the taxonomy.
    #[error("unknown query-type={name}")]
    UnknownQueryType {
        /// Offending name.
        name: String,
    },
    /// `n` is not a positive integer.
    #[error("case count n={n} must be a positive integer")]
    InvalidCaseCount {
        /// Configured value.
        n: i64,
    },
    /// No config file was given and no default location exists.
    #[error("no config directory found; pass --config or set CETEST_CONFIG")]
    NoConfigPath,
}

/// `$CONFIG_DIR/cetest/config.toml`, when the platform has a config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("cetest").join("config.toml"))
}

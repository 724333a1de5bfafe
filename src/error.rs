//! Error type shared by every module.

use thiserror::Error;

use crate::config::ConfigError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by a benchmark run.
///
/// Configuration and connection errors abort the run before any worker
/// starts. Generation, execution, scan and extraction errors are recorded
/// against the instance whose worker hit them.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration document could not be read or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A query-type name is not part of the taxonomy.
    #[error("unknown query-type={0}")]
    UnknownQueryType(String),
    /// An instance could not be reached.
    #[error("failed to connect to instance '{label}': {message}")]
    Connection {
        /// Instance label from the configuration.
        label: String,
        /// Driver message.
        message: String,
    },
    /// A dataset could not produce the requested cases.
    #[error("dataset '{dataset}' failed to generate {query_type} cases: {message}")]
    DatasetGeneration {
        /// Dataset label.
        dataset: String,
        /// Query-type name.
        query_type: String,
        /// Underlying cause.
        message: String,
    },
    /// The database rejected or failed the statement.
    #[error("query failed: {sql}: {message}")]
    QueryExecution {
        /// Statement that was sent.
        sql: String,
        /// Driver message.
        message: String,
    },
    /// The plan result set could not be scanned into strings.
    #[error("failed to scan plan rows: {0}")]
    PlanScan(String),
    /// The plan did not carry the expected estimate annotation.
    #[error("malformed plan for version {version}: {reason}")]
    MalformedPlan {
        /// Instance version the plan came from.
        version: String,
        /// What could not be located.
        reason: String,
    },
    /// The report could not be produced.
    #[error("failed to write report: {0}")]
    Report(String),
    /// The tracing subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
    /// A worker task aborted before returning its results.
    #[error("worker for instance '{label}' aborted: {message}")]
    WorkerPanicked {
        /// Instance label.
        label: String,
        /// Join error description.
        message: String,
    },
}

impl Error {
    pub(crate) fn malformed(version: &str, reason: impl Into<String>) -> Self {
        Error::MalformedPlan {
            version: version.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn generation(
        dataset: &str,
        query_type: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Error::DatasetGeneration {
            dataset: dataset.to_string(),
            query_type: query_type.to_string(),
            message: message.into(),
        }
    }
}

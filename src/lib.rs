//! Cardinality-estimation accuracy benchmark.
//!
//! `cetest` generates queries per dataset and query type, runs each one
//! under `EXPLAIN ANALYZE` on every configured instance concurrently, and
//! compares the optimizer's estimated row count with the actual one. The
//! observations are gathered in a [`ResultCollector`] indexed by
//! (instance, dataset, query type) and summarized into a report.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod collector;
pub mod config;
pub mod dataset;
pub mod error;
pub mod instance;
pub mod logging;
pub mod orchestrator;
pub mod plan;
pub mod query_type;
pub mod report;
pub mod runner;

pub use collector::{CollectorPartition, EstResult, ResultCollector};
pub use config::{Config, ConfigError};
pub use dataset::{Dataset, DatasetRegistry, DatasetSpec};
pub use error::{Error, Result};
pub use instance::{
    Cell, Connector, Instance, InstanceHandle, InstanceOption, InstanceSet, ResultSet,
};
pub use orchestrator::{run_with_config, Orchestrator, Phase, RunOutcome};
pub use query_type::QueryType;

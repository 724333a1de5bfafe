//! Live database instances the benchmark runs against.
//!
//! An [`Instance`] executes SQL text and hands back a loosely typed
//! [`ResultSet`]. Instances are connected once per run through a
//! [`Connector`], owned by an [`InstanceSet`] for the run's lifetime and
//! closed exactly once when the run ends, whichever way it ends.

mod tidb;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

pub use tidb::{TidbConnector, TidbInstance};

/// Connection settings for one instance, as written in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstanceOption {
    /// Human readable label used in progress logs and reports.
    pub label: String,
    /// Host name or IP address.
    #[serde(default = "default_addr")]
    pub addr: String,
    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// User name.
    #[serde(default = "default_user")]
    pub user: String,
    /// Password, empty for none.
    #[serde(default)]
    pub password: String,
}

fn default_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_user() -> String {
    "root".to_string()
}

/// One value of a result row as returned by the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// SQL `NULL`.
    Null,
    /// Textual value.
    Text(String),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point value.
    Float(f64),
    /// Raw bytes, expected to be UTF-8 text.
    Bytes(Vec<u8>),
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// Tabular query result: column names plus ordered rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names in result order.
    pub columns: Vec<String>,
    /// Rows, each expected to have one cell per column.
    pub rows: Vec<Vec<Cell>>,
}

impl ResultSet {
    /// Builds a result set from string literals, handy for fixtures.
    pub fn from_text(columns: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| Cell::from(*v)).collect())
                .collect(),
        }
    }
}

/// A database instance able to run SQL.
#[async_trait]
pub trait Instance: Send + Sync {
    /// Label from the configuration.
    fn label(&self) -> &str;

    /// Version string reported by the server, stable for the instance's lifetime.
    fn version(&self) -> &str;

    /// Executes `sql` and returns its full result.
    ///
    /// Fails with [`crate::Error::QueryExecution`] when the statement fails.
    async fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Releases the underlying connection. Calling it again is a no-op.
    async fn close(&self) -> Result<()>;
}

/// A connected instance, shared between the worker that drives it and the
/// datasets that read from it.
pub type InstanceHandle = Arc<dyn Instance>;

/// Opens instances from their configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects to a single instance.
    ///
    /// Fails with [`crate::Error::Connection`] when the instance is unreachable.
    async fn connect(&self, opt: &InstanceOption) -> Result<InstanceHandle>;
}

/// Every instance connected for a run, closed together.
pub struct InstanceSet {
    handles: Vec<InstanceHandle>,
    closed: bool,
}

impl InstanceSet {
    /// Wraps already connected instances.
    pub fn new(handles: Vec<InstanceHandle>) -> Self {
        Self {
            handles,
            closed: false,
        }
    }

    /// Number of instances.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the set holds no instance.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Instance handles in configuration order.
    pub fn handles(&self) -> &[InstanceHandle] {
        &self.handles
    }

    /// Closes every instance. Close failures are logged, never propagated,
    /// so an error already being returned is not masked.
    pub async fn close_all(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for ins in &self.handles {
            if let Err(err) = ins.close().await {
                warn!(instance = ins.label(), error = %err, "instance.close_failed");
            }
        }
    }
}

/// A set dropped without [`InstanceSet::close_all`], for example when the
/// run's future is cancelled, hands its instances to a background task on
/// the current tokio runtime that closes them. Outside a runtime the
/// connections are released by their own drop.
impl Drop for InstanceSet {
    fn drop(&mut self) {
        if self.closed || self.handles.is_empty() {
            return;
        }
        self.closed = true;
        let handles = std::mem::take(&mut self.handles);
        warn!(instances = handles.len(), "instance.set.dropped_without_close");
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                for ins in handles {
                    if let Err(err) = ins.close().await {
                        warn!(instance = ins.label(), error = %err, "instance.close_failed");
                    }
                }
            });
        }
    }
}

/// Connects to every configured instance in order.
///
/// When one connection fails the instances connected so far are closed
/// before the error is returned.
pub async fn connect_to_instances(
    connector: &dyn Connector,
    opts: &[InstanceOption],
) -> Result<InstanceSet> {
    let mut set = InstanceSet::new(Vec::with_capacity(opts.len()));
    for opt in opts {
        match connector.connect(opt).await {
            Ok(ins) => {
                info!(
                    instance = ins.label(),
                    version = ins.version(),
                    "instance.connected"
                );
                set.handles.push(ins);
            }
            Err(err) => {
                set.close_all().await;
                return Err(err);
            }
        }
    }
    Ok(set)
}

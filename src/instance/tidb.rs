use std::sync::Arc;

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Row, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Cell, Connector, Instance, InstanceOption, ResultSet};
use crate::error::{Error, Result};

/// MySQL-protocol instance, typically a TiDB server.
///
/// Holds a single connection; queries from the owning worker are serialized
/// on it.
pub struct TidbInstance {
    label: String,
    version: String,
    conn: Mutex<Option<Conn>>,
}

impl TidbInstance {
    /// Opens a connection and resolves the server version.
    pub async fn connect(opt: &InstanceOption) -> Result<Self> {
        let connection_error = |err: mysql_async::Error| Error::Connection {
            label: opt.label.clone(),
            message: err.to_string(),
        };
        let builder = OptsBuilder::default()
            .ip_or_hostname(opt.addr.clone())
            .tcp_port(opt.port)
            .user(Some(opt.user.clone()))
            .pass(Some(opt.password.clone()));
        let mut conn = Conn::new(builder).await.map_err(connection_error)?;
        let version: Option<String> = conn
            .query_first("SELECT VERSION()")
            .await
            .map_err(connection_error)?;
        let version = version.ok_or_else(|| Error::Connection {
            label: opt.label.clone(),
            message: "server did not report a version".into(),
        })?;
        debug!(instance = %opt.label, %version, "tidb.connected");
        Ok(Self {
            label: opt.label.clone(),
            version,
            conn: Mutex::new(Some(conn)),
        })
    }
}

#[async_trait]
impl Instance for TidbInstance {
    fn label(&self) -> &str {
        &self.label
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn query(&self, sql: &str) -> Result<ResultSet> {
        let execution_error = |message: String| Error::QueryExecution {
            sql: sql.to_string(),
            message,
        };
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| execution_error("connection already closed".into()))?;
        let mut result = conn
            .query_iter(sql)
            .await
            .map_err(|err| execution_error(err.to_string()))?;
        let columns = result
            .columns()
            .map(|cols| cols.iter().map(|c| c.name_str().into_owned()).collect())
            .unwrap_or_default();
        let rows: Vec<Row> = result
            .collect()
            .await
            .map_err(|err| execution_error(err.to_string()))?;
        Ok(ResultSet {
            columns,
            rows: rows
                .into_iter()
                .map(|row| {
                    row.unwrap_raw()
                        .into_iter()
                        .map(|value| value.map_or(Cell::Null, cell_from_value))
                        .collect()
                })
                .collect(),
        })
    }

    async fn close(&self) -> Result<()> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.disconnect().await.map_err(|err| Error::Connection {
                label: self.label.clone(),
                message: err.to_string(),
            })?;
            debug!(instance = %self.label, "tidb.closed");
        }
        Ok(())
    }
}

fn cell_from_value(value: Value) -> Cell {
    match value {
        Value::NULL => Cell::Null,
        Value::Bytes(bytes) => Cell::Bytes(bytes),
        Value::Int(v) => Cell::Int(v),
        Value::UInt(v) => Cell::UInt(v),
        Value::Float(v) => Cell::Float(f64::from(v)),
        Value::Double(v) => Cell::Float(v),
        Value::Date(year, month, day, hour, minute, second, micros) => Cell::Text(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
        )),
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            let hours = u64::from(days) * 24 + u64::from(hours);
            Cell::Text(format!(
                "{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    }
}

/// Connects [`TidbInstance`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TidbConnector;

#[async_trait]
impl Connector for TidbConnector {
    async fn connect(&self, opt: &InstanceOption) -> Result<Arc<dyn Instance>> {
        Ok(Arc::new(TidbInstance::connect(opt).await?))
    }
}

//! Executes single cases under `EXPLAIN ANALYZE`.

use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::collector::EstResult;
use crate::error::{Error, Result};
use crate::instance::{Cell, Instance, ResultSet};
use crate::plan::extract_est_result;

/// Calls slower than this are logged as slow queries.
pub const SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(50);

/// Runs `query` on `ins` with plan introspection and extracts its estimation
/// observation.
pub async fn run_one_case(ins: &dyn Instance, query: &str) -> Result<EstResult> {
    let sql = format!("EXPLAIN ANALYZE {query}");
    let begin = Instant::now();
    let result = ins.query(&sql).await?;
    let elapsed = begin.elapsed();
    if elapsed > SLOW_QUERY_THRESHOLD {
        warn!(
            instance = ins.label(),
            sql = %sql,
            elapsed_ms = elapsed.as_secs_f64() * 1_000.0,
            "runner.slow_query"
        );
    } else {
        trace!(instance = ins.label(), elapsed_us = elapsed.as_micros() as u64, "runner.case");
    }
    let rows = scan_rows(&result)?;
    extract_est_result(&rows, ins.version())
}

/// Converts every cell of `result` to its string form.
///
/// Fails with [`Error::PlanScan`] when the result exposes no columns, a row
/// does not match the column count, or a cell cannot be read as a string.
pub fn scan_rows(result: &ResultSet) -> Result<Vec<Vec<String>>> {
    let n_cols = result.columns.len();
    if n_cols == 0 {
        return Err(Error::PlanScan("result exposes no columns".into()));
    }
    let mut rows = Vec::with_capacity(result.rows.len());
    for (row_idx, row) in result.rows.iter().enumerate() {
        if row.len() != n_cols {
            return Err(Error::PlanScan(format!(
                "row {row_idx} has {} values, expected {n_cols}",
                row.len()
            )));
        }
        let mut cols = Vec::with_capacity(n_cols);
        for (col_idx, cell) in row.iter().enumerate() {
            cols.push(scan_cell(cell).map_err(|reason| {
                Error::PlanScan(format!(
                    "row {row_idx} column '{}': {reason}",
                    result.columns[col_idx]
                ))
            })?);
        }
        rows.push(cols);
    }
    Ok(rows)
}

fn scan_cell(cell: &Cell) -> std::result::Result<String, &'static str> {
    match cell {
        Cell::Null => Err("cannot scan NULL into a string"),
        Cell::Text(s) => Ok(s.clone()),
        Cell::Int(v) => Ok(v.to_string()),
        Cell::UInt(v) => Ok(v.to_string()),
        Cell::Float(v) => Ok(v.to_string()),
        Cell::Bytes(bytes) => String::from_utf8(bytes.clone()).map_err(|_| "value is not UTF-8"),
    }
}

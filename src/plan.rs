//! Extraction of the estimate/actual pair from `EXPLAIN ANALYZE` output.
//!
//! The plan's column layout depends on the server version, so each known
//! layout is a [`PlanFormat`] and the version string picks one. Only the
//! root operator (first plan row) is inspected: its estimate and actual row
//! count describe the whole query.

use crate::collector::EstResult;
use crate::error::{Error, Result};

/// Known `EXPLAIN ANALYZE` layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanFormat {
    /// TiDB v3.x and earlier: `id, count, task, operator info, execution info, memory`.
    /// The actual row count lives inside `execution info` as `rows:N`.
    Legacy,
    /// TiDB v4.0 onwards: `id, estRows, actRows, task, access object,
    /// execution info, operator info, memory, disk`.
    Modern,
}

const LEGACY_EST_COL: usize = 1;
const LEGACY_EXEC_INFO_COL: usize = 4;
const MODERN_EST_COL: usize = 1;
const MODERN_ACT_COL: usize = 2;

impl PlanFormat {
    /// Every registered layout.
    pub fn all() -> &'static [PlanFormat] {
        &[PlanFormat::Legacy, PlanFormat::Modern]
    }

    /// Picks the layout for a server version such as `5.7.25-TiDB-v4.0.0`.
    /// Unrecognised versions use the newest layout.
    pub fn for_version(version: &str) -> Self {
        match tidb_major_version(version) {
            Some(major) if major < 4 => PlanFormat::Legacy,
            _ => PlanFormat::Modern,
        }
    }

    /// Minimum number of columns a root row must carry.
    pub fn min_columns(self) -> usize {
        match self {
            PlanFormat::Legacy => LEGACY_EXEC_INFO_COL + 1,
            PlanFormat::Modern => MODERN_ACT_COL + 1,
        }
    }

    /// Reads the root row of `rows` according to this layout.
    pub fn extract(self, rows: &[Vec<String>], version: &str) -> Result<EstResult> {
        let root = rows
            .first()
            .ok_or_else(|| Error::malformed(version, "plan has no rows"))?;
        if root.len() < self.min_columns() {
            return Err(Error::malformed(
                version,
                format!(
                    "root row has {} columns, {:?} layout needs {}",
                    root.len(),
                    self,
                    self.min_columns()
                ),
            ));
        }
        let (est, act) = match self {
            PlanFormat::Legacy => {
                let est = parse_count(&root[LEGACY_EST_COL], "count", version)?;
                let rows_field = execution_info_rows(&root[LEGACY_EXEC_INFO_COL]).ok_or_else(
                    || {
                        Error::malformed(
                            version,
                            format!(
                                "execution info '{}' has no rows annotation",
                                root[LEGACY_EXEC_INFO_COL]
                            ),
                        )
                    },
                )?;
                (est, parse_count(rows_field, "rows", version)?)
            }
            PlanFormat::Modern => (
                parse_count(&root[MODERN_EST_COL], "estRows", version)?,
                parse_count(&root[MODERN_ACT_COL], "actRows", version)?,
            ),
        };
        Ok(EstResult::new(est, act, version))
    }
}

/// Extracts one observation from scanned plan rows of an instance running
/// `version`.
pub fn extract_est_result(rows: &[Vec<String>], version: &str) -> Result<EstResult> {
    PlanFormat::for_version(version).extract(rows, version)
}

fn tidb_major_version(version: &str) -> Option<u32> {
    let tail = match version.find("TiDB-v") {
        Some(pos) => &version[pos + "TiDB-v".len()..],
        None => version.strip_prefix('v')?,
    };
    let end = tail
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(tail.len());
    tail[..end].parse().ok()
}

fn execution_info_rows(info: &str) -> Option<&str> {
    info.split(',')
        .map(str::trim)
        .find_map(|field| field.strip_prefix("rows:"))
        .map(str::trim)
}

fn parse_count(raw: &str, field: &str, version: &str) -> Result<f64> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(Error::malformed(
            version,
            format!("{field} value '{raw}' is not a row count"),
        )),
    }
}

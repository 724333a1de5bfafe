//! Per-cell error summaries written to the report directory.

use std::fs;
use std::path::{Path, PathBuf};

use csv::Writer;
use serde::Serialize;
use tracing::info;

use crate::collector::{EstResult, ResultCollector};
use crate::config::Config;
use crate::error::{Error, Result};

/// JSON summary file name.
pub const JSON_FILE: &str = "p-error.json";
/// CSV summary file name.
pub const CSV_FILE: &str = "p-error.csv";

/// Nearest-rank percentiles of a cell's q-errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Percentiles {
    /// Median.
    pub p50: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
    /// Largest observation.
    pub max: f64,
}

impl Percentiles {
    /// Summarizes `values`; `None` when empty.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let rank = |p: f64| {
            let idx = (p / 100.0 * sorted.len() as f64).ceil() as usize;
            sorted[idx.clamp(1, sorted.len()) - 1]
        };
        Some(Self {
            p50: rank(50.0),
            p90: rank(90.0),
            p95: rank(95.0),
            p99: rank(99.0),
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Summary of one (instance, dataset, query type) cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSummary {
    /// Instance label.
    pub instance: String,
    /// Version that produced the observations, if any.
    pub version: Option<String>,
    /// Dataset label.
    pub dataset: String,
    /// Query-type name.
    pub query_type: String,
    /// Number of observations.
    pub count: usize,
    /// q-error distribution.
    pub q_error: Option<Percentiles>,
    /// Mean signed p-error.
    pub mean_p_error: Option<f64>,
}

fn summarize_cell(results: &[EstResult]) -> (Option<Percentiles>, Option<f64>) {
    let q: Vec<f64> = results.iter().map(EstResult::q_error).collect();
    let mean_p = (!results.is_empty())
        .then(|| results.iter().map(EstResult::p_error).sum::<f64>() / results.len() as f64);
    (Percentiles::of(&q), mean_p)
}

/// One summary per cell, instance-major, labelled from `config`.
pub fn summarize(config: &Config, collector: &ResultCollector) -> Vec<CellSummary> {
    collector
        .cells()
        .map(|((i, d, q), results)| {
            let (q_error, mean_p_error) = summarize_cell(results);
            CellSummary {
                instance: config.instances[i].label.clone(),
                version: results.first().map(|r| r.version.clone()),
                dataset: config.datasets[d].label.clone(),
                query_type: config.query_types[q].name().to_string(),
                count: results.len(),
                q_error,
                mean_p_error,
            }
        })
        .collect()
}

/// Files produced by [`generate_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    /// JSON summary.
    pub json: PathBuf,
    /// CSV summary.
    pub csv: PathBuf,
}

/// Writes the JSON and CSV summaries of `collector` into `config.report_dir`.
pub fn generate_report(config: &Config, collector: &ResultCollector) -> Result<ReportFiles> {
    let dir = &config.report_dir;
    fs::create_dir_all(dir).map_err(|err| report_error(dir, err))?;
    let summaries = summarize(config, collector);

    let json = dir.join(JSON_FILE);
    let encoded =
        serde_json::to_vec_pretty(&summaries).map_err(|err| report_error(&json, err))?;
    fs::write(&json, encoded).map_err(|err| report_error(&json, err))?;

    let csv = dir.join(CSV_FILE);
    write_csv(&csv, &summaries).map_err(|err| report_error(&csv, err))?;

    info!(
        report_dir = %dir.display(),
        cells = summaries.len(),
        observations = collector.total(),
        "report.written"
    );
    Ok(ReportFiles { json, csv })
}

fn report_error(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::Report(format!("{}: {err}", path.display()))
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

fn write_csv(path: &Path, rows: &[CellSummary]) -> std::result::Result<(), csv::Error> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "instance",
        "version",
        "dataset",
        "query_type",
        "count",
        "q_p50",
        "q_p90",
        "q_p95",
        "q_p99",
        "q_max",
        "mean_p_error",
    ])?;
    for row in rows {
        let q = row.q_error.as_ref();
        writer.write_record(&[
            row.instance.clone(),
            row.version.clone().unwrap_or_default(),
            row.dataset.clone(),
            row.query_type.clone(),
            row.count.to_string(),
            fmt_opt(q.map(|p| p.p50)),
            fmt_opt(q.map(|p| p.p90)),
            fmt_opt(q.map(|p| p.p95)),
            fmt_opt(q.map(|p| p.p99)),
            fmt_opt(q.map(|p| p.max)),
            fmt_opt(row.mean_p_error),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

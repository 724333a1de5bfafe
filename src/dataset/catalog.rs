//! Case generation shared by the datasets that live in real tables.
//!
//! A dataset describes its tables once (two indexed columns each, plus the
//! key pairs tables can be joined on). Values are drawn from per-column
//! histograms read from the instance the first time a column is needed.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use super::{sql_literal, Dataset, DatasetSpec};
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::query_type::QueryType;
use crate::runner::scan_rows;

/// A table with its two indexed columns; `cols[0]` leads the composite index.
#[derive(Debug)]
pub(crate) struct TableDef {
    pub name: &'static str,
    pub cols: [&'static str; 2],
}

/// `tables[left].left_col` joins `tables[right].right_col`.
#[derive(Debug)]
pub(crate) struct JoinDef {
    pub left: usize,
    pub left_col: &'static str,
    pub right: usize,
    pub right_col: &'static str,
}

#[derive(Debug)]
pub(crate) struct Catalog {
    pub tables: &'static [TableDef],
    pub joins: &'static [JoinDef],
}

impl Catalog {
    fn supports(&self, qt: QueryType) -> bool {
        match qt {
            QueryType::JoinEq | QueryType::JoinNonEq => !self.joins.is_empty(),
            _ => !self.tables.is_empty(),
        }
    }

    // Columns a query type may put a filter on.
    fn filter_columns(&self, qt: QueryType) -> Vec<(usize, usize)> {
        match qt {
            QueryType::JoinEq | QueryType::JoinNonEq => {
                let mut cols: Vec<(usize, usize)> = self
                    .joins
                    .iter()
                    .flat_map(|j| [(j.left, 0), (j.right, 0)])
                    .collect();
                cols.sort_unstable();
                cols.dedup();
                cols
            }
            QueryType::SingleColPointQuery
            | QueryType::SingleColRangeQuery
            | QueryType::McvPointQuery
            | QueryType::LcvPointQuery => (0..self.tables.len()).map(|t| (t, 0)).collect(),
            QueryType::Group => (0..self.tables.len()).map(|t| (t, 1)).collect(),
            QueryType::MultiColsPointQuery
            | QueryType::MultiColsRangeQueryEqPrefix
            | QueryType::MultiColsRangeQuery => (0..self.tables.len())
                .flat_map(|t| [(t, 0), (t, 1)])
                .collect(),
        }
    }
}

/// Distinct values of one column, by value and by descending frequency.
#[derive(Debug, Default)]
struct Histogram {
    sorted: Vec<String>,
    by_freq: Vec<String>,
}

impl Histogram {
    fn from_counts(values: Vec<(String, u64)>) -> Self {
        let sorted = values.iter().map(|(v, _)| v.clone()).collect();
        let mut by_count = values;
        by_count.sort_by(|a, b| b.1.cmp(&a.1));
        Self {
            sorted,
            by_freq: by_count.into_iter().map(|(v, _)| v).collect(),
        }
    }

    fn any(&self, rng: &mut ChaCha8Rng) -> &str {
        &self.sorted[rng.gen_range(0..self.sorted.len())]
    }

    fn range(&self, rng: &mut ChaCha8Rng) -> (&str, &str) {
        let a = rng.gen_range(0..self.sorted.len());
        let b = rng.gen_range(0..self.sorted.len());
        (&self.sorted[a.min(b)], &self.sorted[a.max(b)])
    }

    fn tenth(&self) -> usize {
        (self.by_freq.len() / 10).max(1)
    }

    fn most_common(&self, rng: &mut ChaCha8Rng) -> &str {
        &self.by_freq[rng.gen_range(0..self.tenth())]
    }

    fn least_common(&self, rng: &mut ChaCha8Rng) -> &str {
        &self.by_freq[self.by_freq.len() - 1 - rng.gen_range(0..self.tenth())]
    }
}

pub(crate) struct CatalogDataset {
    label: String,
    db: String,
    catalog: &'static Catalog,
    ins: Arc<dyn Instance>,
    rng: Mutex<ChaCha8Rng>,
    hists: tokio::sync::Mutex<HashMap<(usize, usize), Arc<Histogram>>>,
}

impl CatalogDataset {
    pub fn new(
        spec: &DatasetSpec,
        catalog: &'static Catalog,
        ins: Arc<dyn Instance>,
        seed: u64,
    ) -> Self {
        Self {
            label: spec.label.clone(),
            db: spec.db.clone(),
            catalog,
            ins,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            hists: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    fn table(&self, idx: usize) -> String {
        format!("{}.{}", self.db, self.catalog.tables[idx].name)
    }

    fn col(&self, table: usize, col: usize) -> &'static str {
        self.catalog.tables[table].cols[col]
    }

    async fn load_histogram(&self, table: usize, col: usize, qt: QueryType) -> Result<Histogram> {
        let column = self.col(table, col);
        let sql = format!(
            "SELECT {column}, COUNT(*) FROM {} WHERE {column} IS NOT NULL GROUP BY {column} ORDER BY {column}",
            self.table(table)
        );
        let result = self
            .ins
            .query(&sql)
            .await
            .map_err(|err| Error::generation(&self.label, qt, err.to_string()))?;
        let rows = scan_rows(&result)
            .map_err(|err| Error::generation(&self.label, qt, err.to_string()))?;
        let mut counts = Vec::with_capacity(rows.len());
        for row in rows {
            let [value, count] = <[String; 2]>::try_from(row).map_err(|row| {
                Error::generation(
                    &self.label,
                    qt,
                    format!("histogram row has {} columns", row.len()),
                )
            })?;
            let count = count.parse::<u64>().map_err(|_| {
                Error::generation(&self.label, qt, format!("bad histogram count '{count}'"))
            })?;
            counts.push((value, count));
        }
        if counts.is_empty() {
            return Err(Error::generation(
                &self.label,
                qt,
                format!("{}.{column} holds no values", self.table(table)),
            ));
        }
        debug!(
            dataset = %self.label,
            table = %self.table(table),
            column,
            distinct = counts.len(),
            "dataset.histogram.loaded"
        );
        Ok(Histogram::from_counts(counts))
    }

    async fn histograms(&self, qt: QueryType) -> Result<HashMap<(usize, usize), Arc<Histogram>>> {
        let mut cache = self.hists.lock().await;
        let mut out = HashMap::new();
        for key in self.catalog.filter_columns(qt) {
            let hist = match cache.get(&key) {
                Some(hist) => hist.clone(),
                None => {
                    let hist = Arc::new(self.load_histogram(key.0, key.1, qt).await?);
                    cache.insert(key, hist.clone());
                    hist
                }
            };
            out.insert(key, hist);
        }
        Ok(out)
    }

    fn gen_case(
        &self,
        qt: QueryType,
        hists: &HashMap<(usize, usize), Arc<Histogram>>,
        rng: &mut ChaCha8Rng,
    ) -> String {
        let hist = |t: usize, c: usize| &hists[&(t, c)];
        match qt {
            QueryType::JoinEq | QueryType::JoinNonEq => {
                let join = &self.catalog.joins[rng.gen_range(0..self.catalog.joins.len())];
                let op = if qt == QueryType::JoinEq { "=" } else { ">" };
                let v1 = sql_literal(hist(join.left, 0).any(rng));
                let filter = if qt == QueryType::JoinEq {
                    format!("t1.{} = {v1}", self.col(join.left, 0))
                } else {
                    let v2 = sql_literal(hist(join.right, 0).any(rng));
                    format!(
                        "t1.{} = {v1} AND t2.{} = {v2}",
                        self.col(join.left, 0),
                        self.col(join.right, 0)
                    )
                };
                format!(
                    "SELECT * FROM {} t1 JOIN {} t2 ON t1.{} {op} t2.{} WHERE {filter}",
                    self.table(join.left),
                    self.table(join.right),
                    join.left_col,
                    join.right_col,
                )
            }
            _ => {
                let t = rng.gen_range(0..self.catalog.tables.len());
                let (a, b) = (self.col(t, 0), self.col(t, 1));
                let table = self.table(t);
                let predicate = match qt {
                    QueryType::SingleColPointQuery => {
                        format!("{a} = {}", sql_literal(hist(t, 0).any(rng)))
                    }
                    QueryType::SingleColRangeQuery => {
                        let (lo, hi) = hist(t, 0).range(rng);
                        format!("{a} >= {} AND {a} <= {}", sql_literal(lo), sql_literal(hi))
                    }
                    QueryType::McvPointQuery => {
                        format!("{a} = {}", sql_literal(hist(t, 0).most_common(rng)))
                    }
                    QueryType::LcvPointQuery => {
                        format!("{a} = {}", sql_literal(hist(t, 0).least_common(rng)))
                    }
                    QueryType::MultiColsPointQuery => format!(
                        "{a} = {} AND {b} = {}",
                        sql_literal(hist(t, 0).any(rng)),
                        sql_literal(hist(t, 1).any(rng))
                    ),
                    QueryType::MultiColsRangeQueryEqPrefix => {
                        let v = sql_literal(hist(t, 0).any(rng));
                        let (lo, hi) = hist(t, 1).range(rng);
                        format!(
                            "{a} = {v} AND {b} >= {} AND {b} <= {}",
                            sql_literal(lo),
                            sql_literal(hi)
                        )
                    }
                    QueryType::MultiColsRangeQuery | QueryType::Group => {
                        let (lo_a, hi_a) = if qt == QueryType::Group {
                            ("", "")
                        } else {
                            hist(t, 0).range(rng)
                        };
                        let (lo_b, hi_b) = hist(t, 1).range(rng);
                        let b_range =
                            format!("{b} >= {} AND {b} <= {}", sql_literal(lo_b), sql_literal(hi_b));
                        if qt == QueryType::Group {
                            return format!(
                                "SELECT {a}, COUNT(*) FROM {table} WHERE {b_range} GROUP BY {a}"
                            );
                        }
                        format!(
                            "{a} >= {} AND {a} <= {} AND {b_range}",
                            sql_literal(lo_a),
                            sql_literal(hi_a)
                        )
                    }
                    QueryType::JoinEq | QueryType::JoinNonEq => unreachable!("handled above"),
                };
                format!("SELECT * FROM {table} WHERE {predicate}")
            }
        }
    }
}

#[async_trait]
impl Dataset for CatalogDataset {
    async fn gen_cases(&self, n: usize, qt: QueryType) -> Result<Vec<String>> {
        if !self.catalog.supports(qt) {
            return Err(Error::generation(
                &self.label,
                qt,
                "query type not supported by this dataset",
            ));
        }
        let hists = self.histograms(qt).await?;
        let mut rng = self.rng.lock();
        Ok((0..n).map(|_| self.gen_case(qt, &hists, &mut rng)).collect())
    }
}

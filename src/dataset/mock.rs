//! Dataset that needs no data: cases target a fixed `t(a, b)` table and are
//! never checked against the instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{Dataset, DatasetSpec};
use crate::error::Result;
use crate::instance::Instance;
use crate::query_type::QueryType;

/// Generates well-formed SQL over `<db>.t(a, b)` for every query type.
pub struct MockDataset {
    table: String,
    next: AtomicU64,
}

impl MockDataset {
    /// A mock dataset over `db`. Case literals count up from `seed`.
    pub fn new(db: &str, seed: u64) -> Self {
        Self {
            table: format!("{db}.t"),
            next: AtomicU64::new(seed),
        }
    }

    fn case(&self, qt: QueryType, k: u64) -> String {
        let t = &self.table;
        match qt {
            QueryType::SingleColPointQuery
            | QueryType::McvPointQuery
            | QueryType::LcvPointQuery => format!("SELECT * FROM {t} WHERE a = {k}"),
            QueryType::SingleColRangeQuery => {
                format!("SELECT * FROM {t} WHERE a >= {k} AND a <= {}", k + 10)
            }
            QueryType::MultiColsPointQuery => {
                format!("SELECT * FROM {t} WHERE a = {k} AND b = {k}")
            }
            QueryType::MultiColsRangeQueryEqPrefix => {
                format!("SELECT * FROM {t} WHERE a = {k} AND b > {k}")
            }
            QueryType::MultiColsRangeQuery => {
                format!("SELECT * FROM {t} WHERE a > {k} AND b > {k}")
            }
            QueryType::JoinEq => {
                format!("SELECT * FROM {t} t1 JOIN {t} t2 ON t1.a = t2.a WHERE t1.b = {k}")
            }
            QueryType::JoinNonEq => {
                format!("SELECT * FROM {t} t1 JOIN {t} t2 ON t1.a > t2.a WHERE t1.b = {k}")
            }
            QueryType::Group => format!("SELECT a, COUNT(*) FROM {t} WHERE b > {k} GROUP BY a"),
        }
    }
}

#[async_trait]
impl Dataset for MockDataset {
    async fn gen_cases(&self, n: usize, qt: QueryType) -> Result<Vec<String>> {
        let start = self.next.fetch_add(n as u64, Ordering::Relaxed);
        Ok((start..start + n as u64).map(|k| self.case(qt, k)).collect())
    }
}

pub(super) fn new_dataset(
    spec: &DatasetSpec,
    _ins: Arc<dyn Instance>,
    seed: u64,
) -> Result<Box<dyn Dataset>> {
    Ok(Box::new(MockDataset::new(&spec.db, seed)))
}

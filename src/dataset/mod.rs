//! Datasets that turn a [`QueryType`] into concrete SQL cases.
//!
//! Each configured dataset is instantiated once per instance through the
//! [`DatasetRegistry`], an immutable name → constructor table built at
//! startup and passed by reference to configuration decoding and to the
//! orchestrator.

mod catalog;
mod imdb;
mod mock;
mod tpcc;
mod zipfx;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::query_type::QueryType;

pub use mock::MockDataset;

/// A dataset as named in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatasetSpec {
    /// Registered dataset kind (`zipfx`, `imdb`, `tpcc`, `mock`).
    pub name: String,
    /// Database holding the dataset's tables.
    pub db: String,
    /// Human readable label used in progress logs and reports.
    pub label: String,
}

/// Generates benchmark cases against one live instance.
#[async_trait]
pub trait Dataset: Send + Sync {
    /// Returns exactly `n` independently executable SQL statements of shape
    /// `qt`, or fails as a whole with [`Error::DatasetGeneration`].
    async fn gen_cases(&self, n: usize, qt: QueryType) -> Result<Vec<String>>;
}

/// Builds a dataset for one instance. `seed` drives case generation; the
/// same seed yields the same cases on instances holding the same data.
pub type DatasetCtor = fn(&DatasetSpec, Arc<dyn Instance>, u64) -> Result<Box<dyn Dataset>>;

/// Read-only table of known dataset kinds.
#[derive(Clone, Default)]
pub struct DatasetRegistry {
    ctors: BTreeMap<String, DatasetCtor>,
}

impl DatasetRegistry {
    /// Registry with no dataset kinds.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in dataset kind.
    pub fn builtin() -> Self {
        Self::empty()
            .with("zipfx", zipfx::new_dataset)
            .with("imdb", imdb::new_dataset)
            .with("tpcc", tpcc::new_dataset)
            .with("mock", mock::new_dataset)
    }

    /// Adds (or replaces) a dataset kind. Names are case-insensitive.
    pub fn with(mut self, name: &str, ctor: DatasetCtor) -> Self {
        self.ctors.insert(name.to_lowercase(), ctor);
        self
    }

    /// Whether `name` is a registered kind.
    pub fn contains(&self, name: &str) -> bool {
        self.ctors.contains_key(&name.to_lowercase())
    }

    /// Registered kind names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.ctors.keys().map(String::as_str)
    }

    /// Instantiates `spec` against `ins`.
    pub fn build(
        &self,
        spec: &DatasetSpec,
        ins: Arc<dyn Instance>,
        seed: u64,
    ) -> Result<Box<dyn Dataset>> {
        let ctor = self.ctors.get(&spec.name.to_lowercase()).ok_or_else(|| {
            Error::generation(&spec.label, "any", format!("unknown dataset={}", spec.name))
        })?;
        ctor(spec, ins, seed)
    }
}

impl std::fmt::Debug for DatasetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.ctors.keys()).finish()
    }
}

/// Renders a value read back from the database as a quoted SQL literal.
///
/// Values are always quoted: the server coerces a quoted literal to a numeric
/// column's type, while an unquoted number compared with a string column
/// turns the predicate into a numeric comparison.
pub(crate) fn sql_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\\', "\\\\").replace('\'', "''"))
}

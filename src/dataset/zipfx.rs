//! Synthetic tables whose columns follow Zipf distributions of varying skew.

use std::sync::Arc;

use super::catalog::{Catalog, CatalogDataset, JoinDef, TableDef};
use super::{Dataset, DatasetSpec};
use crate::error::Result;
use crate::instance::Instance;

static TABLES: [TableDef; 4] = [
    TableDef {
        name: "tint",
        cols: ["a", "b"],
    },
    TableDef {
        name: "tdouble",
        cols: ["a", "b"],
    },
    TableDef {
        name: "tstring",
        cols: ["a", "b"],
    },
    TableDef {
        name: "tdatetime",
        cols: ["a", "b"],
    },
];

// Self joins: both sides share the skewed distribution.
static JOINS: [JoinDef; 4] = [
    JoinDef {
        left: 0,
        left_col: "a",
        right: 0,
        right_col: "b",
    },
    JoinDef {
        left: 1,
        left_col: "a",
        right: 1,
        right_col: "b",
    },
    JoinDef {
        left: 2,
        left_col: "a",
        right: 2,
        right_col: "b",
    },
    JoinDef {
        left: 3,
        left_col: "a",
        right: 3,
        right_col: "b",
    },
];

static CATALOG: Catalog = Catalog {
    tables: &TABLES,
    joins: &JOINS,
};

pub(super) fn new_dataset(
    spec: &DatasetSpec,
    ins: Arc<dyn Instance>,
    seed: u64,
) -> Result<Box<dyn Dataset>> {
    Ok(Box::new(CatalogDataset::new(spec, &CATALOG, ins, seed)))
}

//! The IMDB schema used by the Join Order Benchmark.

use std::sync::Arc;

use super::catalog::{Catalog, CatalogDataset, JoinDef, TableDef};
use super::{Dataset, DatasetSpec};
use crate::error::Result;
use crate::instance::Instance;

static TABLES: [TableDef; 5] = [
    TableDef {
        name: "title",
        cols: ["kind_id", "production_year"],
    },
    TableDef {
        name: "movie_companies",
        cols: ["company_id", "company_type_id"],
    },
    TableDef {
        name: "cast_info",
        cols: ["role_id", "person_id"],
    },
    TableDef {
        name: "movie_keyword",
        cols: ["keyword_id", "movie_id"],
    },
    TableDef {
        name: "movie_info_idx",
        cols: ["info_type_id", "movie_id"],
    },
];

static JOINS: [JoinDef; 4] = [
    JoinDef {
        left: 0,
        left_col: "id",
        right: 1,
        right_col: "movie_id",
    },
    JoinDef {
        left: 0,
        left_col: "id",
        right: 2,
        right_col: "movie_id",
    },
    JoinDef {
        left: 0,
        left_col: "id",
        right: 3,
        right_col: "movie_id",
    },
    JoinDef {
        left: 0,
        left_col: "id",
        right: 4,
        right_col: "movie_id",
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

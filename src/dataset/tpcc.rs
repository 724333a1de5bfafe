//! TPC-C tables after a standard load.

use std::sync::Arc;

use super::catalog::{Catalog, CatalogDataset, JoinDef, TableDef};
use super::{Dataset, DatasetSpec};
use crate::error::Result;
use crate::instance::Instance;

static TABLES: [TableDef; 5] = [
    TableDef {
        name: "customer",
        cols: ["c_w_id", "c_d_id"],
    },
    TableDef {
        name: "orders",
        cols: ["o_w_id", "o_d_id"],
    },
    TableDef {
        name: "order_line",
        cols: ["ol_w_id", "ol_d_id"],
    },
    TableDef {
        name: "stock",
        cols: ["s_w_id", "s_quantity"],
    },
    TableDef {
        name: "item",
        cols: ["i_im_id", "i_price"],
    },
];

static JOINS: [JoinDef; 3] = [
    JoinDef {
        left: 0,
        left_col: "c_id",
        right: 1,
        right_col: "o_c_id",
    },
    JoinDef {
        left: 1,
        left_col: "o_id",
        right: 2,
        right_col: "ol_o_id",
    },
    JoinDef {
        left: 4,
        left_col: "i_id",
        right: 3,
        right_col: "s_i_id",
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

//! Benchmark query shapes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

/// Closed set of query shapes a dataset can be asked to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryType {
    /// `where c = ?` or `where c in (?, ..., ?)`
    SingleColPointQuery,
    /// `where c >= ?` or `where c > ? and c < ?`
    SingleColRangeQuery,
    /// `where c1 = ? and c2 = ?`
    MultiColsPointQuery,
    /// `where c1 = ? and c2 > ?`
    MultiColsRangeQueryEqPrefix,
    /// `where c1 > ? and c2 > ?`
    MultiColsRangeQuery,
    /// Point query on the most common 10% of values.
    McvPointQuery,
    /// Point query on the least common 10% of values.
    LcvPointQuery,
    /// `where t1.c = t2.c`
    JoinEq,
    /// `where t1.c > t2.c`
    JoinNonEq,
    /// `group by c`
    Group,
}

impl QueryType {
    /// Every variant, in declaration order.
    pub const ALL: [QueryType; 10] = [
        QueryType::SingleColPointQuery,
        QueryType::SingleColRangeQuery,
        QueryType::MultiColsPointQuery,
        QueryType::MultiColsRangeQueryEqPrefix,
        QueryType::MultiColsRangeQuery,
        QueryType::McvPointQuery,
        QueryType::LcvPointQuery,
        QueryType::JoinEq,
        QueryType::JoinNonEq,
        QueryType::Group,
    ];

    /// Stable external name used in configuration files and reports.
    pub fn name(self) -> &'static str {
        match self {
            QueryType::SingleColPointQuery => "single-col-point-query",
            QueryType::SingleColRangeQuery => "single-col-range-query",
            QueryType::MultiColsPointQuery => "multi-cols-point-query",
            QueryType::MultiColsRangeQueryEqPrefix => "multi-cols-range-query-eq-prefix",
            QueryType::MultiColsRangeQuery => "multi-cols-range-query",
            QueryType::McvPointQuery => "most-common-value-point-query",
            QueryType::LcvPointQuery => "least-common-value-point-query",
            QueryType::JoinEq => "join-eq",
            QueryType::JoinNonEq => "join-non-eq",
            QueryType::Group => "group",
        }
    }

    /// Inverse of [`QueryType::name`]. Matching is exact.
    pub fn parse(name: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|qt| qt.name() == name)
            .ok_or_else(|| Error::UnknownQueryType(name.to_string()))
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueryType::parse(s)
    }
}

impl Serialize for QueryType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for QueryType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        QueryType::parse(&raw).map_err(serde::de::Error::custom)
    }
}

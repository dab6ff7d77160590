//! Plain data types shared by the client components.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Client-local identity of a rule inside a [`crate::catalog::RuleCatalog`].
///
/// Rule names are display names and may repeat, so selection is keyed by id.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule#{}", self.0)
    }
}

/// A query-plan transformation rule.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Rule {
    /// Catalog-assigned identity.
    pub id: RuleId,
    /// Name as known by the planner.
    pub name: String,
}

/// A named dataset registered with the planner.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Dataset {
    /// Dataset (table) name.
    pub name: String,
}

impl Dataset {
    /// Wraps a dataset name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Tabular result of one query execution plus the planner metrics.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct QueryResult {
    /// Column names.
    pub headers: Vec<String>,
    /// Result rows; each row is as wide as `headers`.
    #[serde(rename = "results")]
    pub rows: Vec<Vec<Value>>,
    /// Estimated cost of the plan as written.
    pub plan_cost: f64,
    /// Estimated cost of the best plan the rules produced.
    pub best_cost: f64,
    /// Execution time in seconds.
    pub exec_time: f64,
}

/// Immutable entry of the execution history.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryRecord {
    /// Positive, strictly increasing record id.
    pub id: u64,
    /// Query text that was executed.
    pub query: String,
    /// Applied rule names, in order, at the time the response arrived.
    pub rules: Vec<String>,
    /// Estimated cost of the plan as written.
    pub plan_cost: f64,
    /// Estimated cost of the best plan.
    pub best_cost: f64,
    /// Execution time in seconds.
    pub exec_time: f64,
}

/// Rule lists as reported by `GET /rules`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RuleSets {
    /// Rules currently in effect, in execution order.
    pub applied_rules: Vec<String>,
    /// Every other rule the planner knows.
    pub non_applied_rules: Vec<String>,
}

/// A file ready to be sent to `POST /ds`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatasetUpload {
    /// File name reported in the multipart part.
    pub file_name: String,
    /// MIME type of the part.
    pub content_type: String,
    /// Raw file contents.
    pub contents: Vec<u8>,
}

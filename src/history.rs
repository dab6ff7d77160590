//! Append-only log of past executions.

use crate::model::HistoryRecord;

/// Separator used when a record's rules are shown as one cell.
pub const RULE_SEPARATOR: &str = "|";

/// Inputs of a new history record; the id is assigned by the log.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryEntry {
    /// Query text that was executed.
    pub query: String,
    /// Applied rule names in order.
    pub rules: Vec<String>,
    /// Estimated cost of the plan as written.
    pub plan_cost: f64,
    /// Estimated cost of the best plan.
    pub best_cost: f64,
    /// Execution time in seconds.
    pub exec_time: f64,
}

/// Client-local execution history.
///
/// Ids continue from the last visible record, starting at 1. Records are
/// never reordered or dropped.
#[derive(Clone, Debug, Default)]
pub struct HistoryLog {
    records: Vec<HistoryRecord>,
}

impl HistoryLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record built from `entry` and returns it.
    pub fn append(&mut self, entry: HistoryEntry) -> &HistoryRecord {
        let last_id = self.records.last().map_or(0, |record| record.id);
        self.records.push(HistoryRecord {
            id: last_id + 1,
            query: entry.query,
            rules: entry.rules,
            plan_cost: entry.plan_cost,
            best_cost: entry.best_cost,
            exec_time: entry.exec_time,
        });
        let idx = self.records.len() - 1;
        &self.records[idx]
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&HistoryRecord> {
        self.records.last()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been executed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records as display rows: id, query, rules, plan cost, best cost,
    /// execution time.
    pub fn display_rows(&self) -> Vec<[String; 6]> {
        self.records
            .iter()
            .map(|record| {
                [
                    record.id.to_string(),
                    record.query.clone(),
                    record.rules.join(RULE_SEPARATOR),
                    record.plan_cost.to_string(),
                    record.best_cost.to_string(),
                    record.exec_time.to_string(),
                ]
            })
            .collect()
    }
}

//! Conversion of query results into display rows.

use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::model::QueryResult;

/// Header of the synthetic row-index column.
pub const INDEX_HEADER: &str = "#";

/// Display-ready table: every cell already rendered to text.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DisplayTable {
    /// `"#"` followed by the result headers.
    pub headers: Vec<String>,
    /// One row per result row, each led by its 1-based index.
    pub rows: Vec<Vec<String>>,
}

impl DisplayTable {
    /// Number of body rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no body rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Renders `result` into a [`DisplayTable`].
///
/// Pure: the input is only read and equal inputs give equal tables. A row
/// whose width differs from the header count is reported as a validation
/// error instead of being rendered misaligned.
pub fn render(result: &QueryResult) -> Result<DisplayTable> {
    let width = result.headers.len();
    let mut headers = Vec::with_capacity(width + 1);
    headers.push(INDEX_HEADER.to_string());
    headers.extend(result.headers.iter().cloned());

    let rows = result
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            if row.len() != width {
                return Err(ClientError::Validation(format!(
                    "row {} has {} values but the result has {} columns",
                    idx + 1,
                    row.len(),
                    width
                )));
            }
            let mut cells = Vec::with_capacity(width + 1);
            cells.push((idx + 1).to_string());
            cells.extend(row.iter().map(cell_text));
            Ok(cells)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DisplayTable { headers, rows })
}

/// Text shown for a single result value.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        // Whole floats print without a trailing `.0`.
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

use serde::Serialize;
use serde_json::Value;

use crate::error::AppResult;

/// Which stored table a download covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFile {
    Interactions,
    Sessions,
}

impl ExportFile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFile::Interactions => "interactions",
            ExportFile::Sessions => "sessions",
        }
    }

    /// Attachment name, e.g. `sessions_analytics.csv`
    pub fn filename(&self) -> String {
        format!("{}_analytics.csv", self.as_str())
    }
}

/// Flattens rows into CSV text
///
/// Columns come from the first row's keys in serialization order. Nested
/// arrays and objects are written as JSON. Returns `None` for no rows.
pub fn to_csv<T: Serialize>(rows: &[T]) -> AppResult<Option<String>> {
    let values = rows
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;

    let columns: Vec<String> = match values.first() {
        Some(Value::Object(first)) => first.keys().cloned().collect(),
        _ => return Ok(None),
    };

    let mut out = columns.join(",");
    out.push('\n');

    for value in &values {
        let line: Vec<String> = columns
            .iter()
            .map(|col| cell(value.get(col).unwrap_or(&Value::Null)))
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }

    Ok(Some(out))
}

fn cell(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

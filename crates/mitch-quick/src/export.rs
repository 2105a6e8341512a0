//! CSV export of uniform record sets (report tables, item lists).

use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::format::number_text;

pub type Record = Map<String, Value>;

fn field_text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) if s.contains(',') => format!("\"{s}\""),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.as_f64().map(number_text).unwrap_or_else(|| n.to_string()),
        },
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Header row is the first record's keys in their original order. Text
/// containing a comma is wrapped in double quotes; embedded quotes are left
/// as they are.
pub fn to_csv(records: &[Record]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };
    let headers: Vec<&String> = first.keys().collect();
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(
        headers
            .iter()
            .map(|h| h.as_str())
            .collect::<Vec<_>>()
            .join(","),
    );
    for rec in records {
        let row: Vec<String> = headers.iter().map(|h| field_text(rec.get(*h))).collect();
        lines.push(row.join(","));
    }
    lines.join("\n")
}

/// Parses a JSON array of objects.
pub fn records_from_json(src: &str) -> Result<Vec<Record>> {
    let v: Value = serde_json::from_str(src)?;
    let Value::Array(items) = v else {
        return Err(Error::msg("expected a JSON array of records"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(m) => Ok(m),
            _ => Err(Error::msg(format!("record {i} is not a JSON object"))),
        })
        .collect()
}

pub fn export_to_file(records: &[Record], path: &Path) -> Result<usize> {
    let csv = to_csv(records);
    fs::write(path, csv.as_bytes())
        .map_err(|e| Error::msg(format!("failed to write {}: {e}", path.display())))?;
    Ok(records.len())
}

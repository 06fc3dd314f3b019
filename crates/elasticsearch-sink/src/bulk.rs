//! NDJSON bulk requests and their responses.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Write;
use sync_core::FilmDocument;

/// One `index` action line plus the document source per film work.
pub(crate) fn ndjson_body(index: &str, documents: &[FilmDocument]) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        let action = json!({ "index": { "_index": index, "_id": doc.id.to_string() } });
        let source = serde_json::to_string(doc)
            .with_context(|| format!("Failed to serialize document {}", doc.id))?;
        // Writing into a String cannot fail.
        let _ = writeln!(body, "{action}");
        let _ = writeln!(body, "{source}");
    }
    Ok(body)
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// A document the cluster refused.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemFailure {
    pub id: String,
    pub status: u16,
    pub reason: String,
}

/// Outcome of one `_bulk` request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSummary {
    pub succeeded: usize,
    pub failures: Vec<BulkItemFailure>,
}

pub(crate) fn summarize(body: &str) -> Result<BulkSummary> {
    let response: BulkResponse =
        serde_json::from_str(body).context("Failed to decode bulk response")?;

    let mut summary = BulkSummary::default();
    let items = response.items.into_iter().flat_map(HashMap::into_values);
    for item in items {
        match item.error {
            Some(error) if response.errors || item.status >= 300 => {
                summary.failures.push(BulkItemFailure {
                    id: item.id.unwrap_or_default(),
                    status: item.status,
                    reason: error_reason(&error),
                });
            }
            _ => summary.succeeded += 1,
        }
    }
    Ok(summary)
}

fn error_reason(error: &Value) -> String {
    match (error.get("type"), error.get("reason")) {
        (Some(Value::String(kind)), Some(Value::String(reason))) => format!("{kind}: {reason}"),
        _ => error.to_string(),
    }
}

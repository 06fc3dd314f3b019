//! Filesystem-based checkpoint storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::store::CheckpointStore;

/// Filesystem implementation of CheckpointStore trait.
///
/// Keeps every key in one flat JSON object:
///
/// ```json
/// {
///     "person": "2024-01-01T00:00:00Z#4f0c6b8e-7c39-4b2e-9d44-8f0f1d2c3a4b",
///     "temporary_person": "2024-01-01T00:00:00Z#4f0c6b8e-7c39-4b2e-9d44-8f0f1d2c3a4b",
///     "temporary_film_works_by_person": "-infinity"
/// }
/// ```
///
/// A missing file, unreadable JSON or a non-object document all read as an
/// empty state (cold start). Each `set` re-reads the file, updates one key
/// and writes the whole object to a sibling temp file that is then renamed
/// over the original.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a new JsonFileStore backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_state(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read checkpoint file {}", self.path.display()))?;

        match serde_json::from_slice::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Checkpoint file holds {} instead of an object, starting from empty state",
                    json_kind(&other)
                );
                Ok(Map::new())
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Checkpoint file is not valid JSON ({e}), starting from empty state"
                );
                Ok(Map::new())
            }
        }
    }

    fn write_state(&self, state: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let content = serde_json::to_string_pretty(state)?;
        let mut file = std::fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to move {} over {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.read_state()?;
        match state.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => {
                tracing::warn!(
                    key,
                    "Ignoring checkpoint value of unexpected type {}",
                    json_kind(other)
                );
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Option<String>) -> Result<()> {
        let mut state = self.read_state()?;
        state.insert(key.to_string(), value.map_or(Value::Null, Value::String));
        self.write_state(&state)?;
        tracing::trace!(key, path = %self.path.display(), "Stored checkpoint");
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

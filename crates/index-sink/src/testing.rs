//! In-memory sink for tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use anyhow::Result;
use sync_core::FilmDocument;
use uuid::Uuid;

use crate::IndexSink;

#[derive(Debug, Default)]
struct Inner {
    batches: Vec<Vec<FilmDocument>>,
    index: BTreeMap<Uuid, FilmDocument>,
    provisioned: u32,
    scripted: VecDeque<bool>,
    fail_all: bool,
}

/// Sink that keeps every batch it receives.
///
/// Upserts replace documents by id in [`RecordingSink::indexed`], so the
/// final view matches what an idempotent search index would hold. Failures
/// can be scripted per call with [`RecordingSink::script`] or for every call
/// with [`RecordingSink::fail_all`].
#[derive(Debug, Default)]
pub struct RecordingSink {
    inner: Mutex<Inner>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue results for the next `bulk_upsert` calls; `false` fails that call.
    pub fn script(&self, outcomes: impl IntoIterator<Item = bool>) {
        self.lock().scripted.extend(outcomes);
    }

    /// Make every subsequent call fail (or succeed again with `false`).
    pub fn fail_all(&self, fail: bool) {
        self.lock().fail_all = fail;
    }

    /// Every successfully written batch, in order.
    pub fn batches(&self) -> Vec<Vec<FilmDocument>> {
        self.lock().batches.clone()
    }

    /// All documents written, flattened in write order.
    pub fn documents(&self) -> Vec<FilmDocument> {
        self.lock().batches.iter().flatten().cloned().collect()
    }

    /// Current view of the index: last write wins per film work id.
    pub fn indexed(&self) -> BTreeMap<Uuid, FilmDocument> {
        self.lock().index.clone()
    }

    /// How many times `provision` was called.
    pub fn provision_calls(&self) -> u32 {
        self.lock().provisioned
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl IndexSink for RecordingSink {
    async fn provision(&self) -> Result<()> {
        self.lock().provisioned += 1;
        Ok(())
    }

    async fn bulk_upsert(&self, documents: &[FilmDocument]) -> bool {
        let mut inner = self.lock();
        let ok = inner.scripted.pop_front().unwrap_or(true) && !inner.fail_all;
        if !ok {
            return false;
        }
        for doc in documents {
            inner.index.insert(doc.id, doc.clone());
        }
        inner.batches.push(documents.to_vec());
        true
    }
}

//! Search index sink abstraction.
//!
//! The change detector only needs two things from the search index: make
//! sure the index exists, and upsert a batch of documents. Keeping that
//! behind [`IndexSink`] lets the cascade be exercised against
//! [`testing::RecordingSink`] without a running search engine.

pub mod testing;

use anyhow::Result;
use sync_core::FilmDocument;

/// Trait for writing film documents to a search index.
///
/// # Usage Pattern
///
/// Callers use generics for zero-cost dispatch:
///
/// ```ignore
/// pub async fn sync_stream<S: IndexSink>(sink: &S, docs: &[FilmDocument]) -> Result<()> {
///     if !sink.bulk_upsert(docs).await {
///         anyhow::bail!("bulk upsert failed");
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait IndexSink: Send + Sync {
    /// Create the index with its mapping if it does not exist yet.
    ///
    /// Idempotent. An error here is fatal for startup.
    async fn provision(&self) -> Result<()>;

    /// Index (create or replace) every document, keyed by film work id.
    ///
    /// Returns `false` when the write call as a whole failed (connection
    /// lost, request rejected). Individual document failures are logged by
    /// the implementation and, unless it is configured as strict, do not
    /// turn the result into `false`.
    async fn bulk_upsert(&self, documents: &[FilmDocument]) -> bool;
}

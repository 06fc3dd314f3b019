//! PostgreSQL side of film-sync.
//!
//! - [`SourceRepository`]: the three read-only queries the change detector
//!   needs, implemented over `tokio-postgres` by [`PostgresRepository`] and
//!   in memory by [`testing::MemorySource`].
//! - [`cascade`]: the change detector that pages through changed root
//!   entities, finds every affected film work and hands assembled documents
//!   to an [`index_sink::IndexSink`], checkpointing as it goes.

pub mod cascade;
mod queries;
mod repository;
pub mod testing;


pub use cascade::{sync_stream, CascadeOutcome};
pub use queries::validate_schema;
pub use repository::{PostgresRepository, SourceOpts};

use anyhow::Result;
use checkpoint::Watermark;
use sync_core::{ChangedRow, JoinedRow, Stream};
use uuid::Uuid;

/// Rows per page for every paginated query.
pub const PAGE_SIZE: usize = 100;

/// Read-only access to the film catalog.
#[async_trait::async_trait]
pub trait SourceRepository: Send + Sync {
    /// Up to one page of root rows of `stream` strictly after `after`,
    /// ordered by `(modified, id)`.
    async fn changed_roots(&self, stream: Stream, after: Watermark) -> Result<Vec<ChangedRow>>;

    /// Up to one page of distinct film works linked to any of `root_ids`
    /// whose own `(modified, id)` is strictly after `after`.
    ///
    /// Fails for [`Stream::FilmWork`], which has no link table.
    async fn affected_film_works(
        &self,
        stream: Stream,
        root_ids: &[Uuid],
        after: Watermark,
    ) -> Result<Vec<ChangedRow>>;

    /// Film work × credit × genre outer join for the given film works.
    async fn joined_rows(&self, film_work_ids: &[Uuid]) -> Result<Vec<JoinedRow>>;
}

#[async_trait::async_trait]
impl<T: SourceRepository + ?Sized> SourceRepository for std::sync::Arc<T> {
    async fn changed_roots(&self, stream: Stream, after: Watermark) -> Result<Vec<ChangedRow>> {
        (**self).changed_roots(stream, after).await
    }

    async fn affected_film_works(
        &self,
        stream: Stream,
        root_ids: &[Uuid],
        after: Watermark,
    ) -> Result<Vec<ChangedRow>> {
        (**self).affected_film_works(stream, root_ids, after).await
    }

    async fn joined_rows(&self, film_work_ids: &[Uuid]) -> Result<Vec<JoinedRow>> {
        (**self).joined_rows(film_work_ids).await
    }
}

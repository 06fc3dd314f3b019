//! Change detection with cascading extraction.
//!
//! A root change (person, genre or film work) is turned into the set of
//! film work documents that must be rebuilt:
//!
//! ```text
//! changed_roots(stream)            page of roots, cursor: in-flight root
//!   └─ affected_film_works(ids)    page of film works, cursor: in-flight related
//!        └─ joined_rows(ids)       assemble + bulk upsert
//! ```
//!
//! The film work stream skips the middle level. Link-table edits do not
//! touch `film_work.modified`, so the middle level is what finds film works
//! whose denormalized names changed.
//!
//! The committed checkpoint moves only after the whole stream drained, so an
//! interrupted pass is replayed from the last committed position.

use anyhow::Result;
use checkpoint::{CheckpointLedger, CheckpointStore, Watermark};
use index_sink::IndexSink;
use sync_core::{to_documents, ChangedRow, Stream};
use uuid::Uuid;

use crate::SourceRepository;

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeOutcome {
    /// Drained and promoted to `watermark`.
    Committed {
        watermark: Watermark,
        /// Root pages processed.
        pages: usize,
        /// Documents handed to the sink.
        documents: usize,
    },
    /// A query failed; nothing was committed.
    Aborted,
}

fn last_watermark(rows: &[ChangedRow]) -> Option<Watermark> {
    rows.last().map(|row| Watermark::at(row.modified, row.id))
}

fn ids(rows: &[ChangedRow]) -> Vec<Uuid> {
    rows.iter().map(|row| row.id).collect()
}

/// Fetch, assemble and write one set of film works.
///
/// `Ok(None)` when the detail query failed, `Err` when the sink rejected
/// the write.
async fn deliver<R, S>(
    stream: Stream,
    source: &R,
    sink: &S,
    film_work_ids: &[Uuid],
) -> Result<Option<usize>>
where
    R: SourceRepository + ?Sized,
    S: IndexSink + ?Sized,
{
    let rows = match source.joined_rows(film_work_ids).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(%stream, "Film work details query failed: {e:#}");
            return Ok(None);
        }
    };

    let documents = to_documents(&rows);
    if !sink.bulk_upsert(&documents).await {
        anyhow::bail!(
            "Writing {} documents for stream {stream} failed",
            documents.len()
        );
    }

    tracing::debug!(%stream, documents = documents.len(), "Documents written");
    Ok(Some(documents.len()))
}

/// Drain one stream from its committed position and commit the result.
///
/// Query failures abort the stream without committing and are not errors.
/// Sink write failures and checkpoint store failures are.
pub async fn sync_stream<R, C, S>(
    stream: Stream,
    source: &R,
    ledger: &CheckpointLedger<C>,
    sink: &S,
) -> Result<CascadeOutcome>
where
    R: SourceRepository + ?Sized,
    C: CheckpointStore,
    S: IndexSink + ?Sized,
{
    let key = stream.as_str();
    let mut cursor = ledger.begin(key).await?;
    let mut pages = 0usize;
    let mut documents = 0usize;

    tracing::debug!(%stream, from = %cursor, "Starting stream");

    loop {
        let roots = match source.changed_roots(stream, cursor).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(%stream, after = %cursor, "Changed rows query failed: {e:#}");
                return Ok(CascadeOutcome::Aborted);
            }
        };
        let Some(next) = last_watermark(&roots) else {
            break;
        };

        ledger.advance_root(key, next).await?;
        pages += 1;
        tracing::info!(%stream, rows = roots.len(), up_to = %next, "Fetched changed rows");

        let root_ids = ids(&roots);
        if stream.link().is_none() {
            match deliver(stream, source, sink, &root_ids).await? {
                Some(n) => documents += n,
                None => return Ok(CascadeOutcome::Aborted),
            }
        } else {
            ledger.reset_related(key).await?;
            let mut related = Watermark::Earliest;
            loop {
                let affected = match source.affected_film_works(stream, &root_ids, related).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::error!(
                            %stream,
                            after = %related,
                            "Affected film works query failed: {e:#}"
                        );
                        return Ok(CascadeOutcome::Aborted);
                    }
                };
                let Some(next_related) = last_watermark(&affected) else {
                    break;
                };

                ledger.advance_related(key, next_related).await?;
                related = next_related;

                match deliver(stream, source, sink, &ids(&affected)).await? {
                    Some(n) => documents += n,
                    None => return Ok(CascadeOutcome::Aborted),
                }
            }
        }

        cursor = next;
    }

    let watermark = ledger.promote(key).await?;
    tracing::info!(%stream, %watermark, pages, documents, "Stream committed");
    Ok(CascadeOutcome::Committed {
        watermark,
        pages,
        documents,
    })
}

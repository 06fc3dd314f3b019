//! Sync passes and the run loop.
//!
//! A pass drains the `person`, `genre` and `film_work` streams in that
//! order. The run loop opens a fresh database connection per pass, runs it
//! and sleeps until the next pass is due.

use anyhow::{Context, Result};
use checkpoint::{CheckpointLedger, CheckpointStore};
use film_sync_postgresql_source::{sync_stream, CascadeOutcome, SourceRepository};
use index_sink::IndexSink;
use std::future::Future;
use std::time::{Duration, Instant};
use sync_core::Stream;

/// When passes run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Time between the starts of two passes.
    pub interval: Duration,
    /// Stop after the first pass.
    pub once: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15 * 60),
            once: false,
        }
    }
}

impl Schedule {
    /// Sleep left before the next pass, given how long this one took.
    pub fn wait_after(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }
}

/// What one pass did, per stream.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    pub outcomes: Vec<(Stream, CascadeOutcome)>,
    pub elapsed: Duration,
}

impl PassReport {
    /// Documents handed to the index across all committed streams.
    pub fn documents(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                CascadeOutcome::Committed { documents, .. } => *documents,
                CascadeOutcome::Aborted => 0,
            })
            .sum()
    }

    pub fn aborted(&self) -> Vec<Stream> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == CascadeOutcome::Aborted)
            .map(|(stream, _)| *stream)
            .collect()
    }
}

/// Run one pass over every stream.
///
/// An aborted stream (failed query) is logged and the pass moves on to the
/// next stream. A failed write or checkpoint update ends the pass with an
/// error.
pub async fn run_pass<R, C, S>(
    source: &R,
    ledger: &CheckpointLedger<C>,
    sink: &S,
) -> Result<PassReport>
where
    R: SourceRepository + ?Sized,
    C: CheckpointStore,
    S: IndexSink + ?Sized,
{
    let started = Instant::now();
    sink.provision()
        .await
        .context("Failed to provision the search index")?;

    let mut outcomes = Vec::with_capacity(Stream::ALL.len());
    for stream in Stream::ALL {
        let outcome = sync_stream(stream, source, ledger, sink)
            .await
            .with_context(|| format!("Sync of stream {stream} failed"))?;
        if outcome == CascadeOutcome::Aborted {
            tracing::warn!(%stream, "Stream aborted, retrying on the next pass");
        }
        outcomes.push((stream, outcome));
    }

    let report = PassReport {
        outcomes,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        documents = report.documents(),
        aborted = report.aborted().len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Pass finished"
    );
    Ok(report)
}

/// Provision the index, then run passes on `schedule` until interrupted.
///
/// `connect` is called once per pass; the source it returns is dropped when
/// the pass ends. Any failed pass ends the loop with its error. Ctrl+C while
/// waiting for the next pass ends the loop cleanly.
pub async fn run_with<F, Fut, R, C, S>(
    mut connect: F,
    ledger: &CheckpointLedger<C>,
    sink: &S,
    schedule: Schedule,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R>>,
    R: SourceRepository,
    C: CheckpointStore,
    S: IndexSink + ?Sized,
{
    sink.provision()
        .await
        .context("Failed to provision the search index")?;

    let mut pass = 0u64;
    loop {
        pass += 1;
        let started = Instant::now();
        {
            let source = connect()
                .await
                .context("Failed to connect to the source database")?;
            run_pass(&source, ledger, sink).await?;
        }

        if schedule.once {
            return Ok(());
        }

        let wait = schedule.wait_after(started.elapsed());
        tracing::info!(pass, wait_secs = wait.as_secs(), "Waiting for the next pass");
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_after_saturates() {
        let schedule = Schedule::default();
        assert_eq!(
            schedule.wait_after(Duration::from_secs(60)),
            Duration::from_secs(14 * 60)
        );
        assert_eq!(
            schedule.wait_after(Duration::from_secs(20 * 60)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_report_counts() {
        let report = PassReport {
            outcomes: vec![
                (
                    Stream::Person,
                    CascadeOutcome::Committed {
                        watermark: Default::default(),
                        pages: 1,
                        documents: 3,
                    },
                ),
                (Stream::Genre, CascadeOutcome::Aborted),
                (
                    Stream::FilmWork,
                    CascadeOutcome::Committed {
                        watermark: Default::default(),
                        pages: 2,
                        documents: 4,
                    },
                ),
            ],
            elapsed: Duration::ZERO,
        };
        assert_eq!(report.documents(), 7);
        assert_eq!(report.aborted(), vec![Stream::Genre]);
    }
}

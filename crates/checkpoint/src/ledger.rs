//! Typed cascade checkpoints on top of a key/value store.

use anyhow::{Context, Result};

use crate::{store::CheckpointStore, Watermark};

/// Checkpoint state of one stream across the three cascade levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeState {
    /// Last position whose whole cascade completed. Only ever moves forward.
    pub committed: Watermark,
    /// Progress of the root-entity scan in the current pass.
    pub in_flight_root: Watermark,
    /// Progress of the affected-film-works scan for the current root page.
    pub in_flight_related: Watermark,
}

/// Ledger for cascade checkpoints.
///
/// The `CheckpointLedger` turns a flat [`CheckpointStore`] into per-stream
/// [`CascadeState`]s:
/// - **committed** lives under `<stream>`
/// - **in-flight root** lives under `temporary_<stream>`
/// - **in-flight related** lives under `temporary_film_works_by_<stream>`
///
/// In-flight values are scratch space for the running pass and are never
/// read as the committed position. [`CheckpointLedger::promote`] is the only
/// way a pass moves the committed value.
///
/// # Example
///
/// ```rust
/// # tokio_test_block(async {
/// use checkpoint::{CheckpointLedger, MemoryStore, Watermark};
///
/// let ledger = CheckpointLedger::new(MemoryStore::new());
/// let start = ledger.begin("person").await?;
/// assert_eq!(start, Watermark::Earliest);
/// # anyhow::Ok(())
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct CheckpointLedger<S> {
    store: S,
}

impl<S: CheckpointStore> CheckpointLedger<S> {
    /// Create a ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn committed_key(stream: &str) -> String {
        stream.to_string()
    }

    pub fn in_flight_root_key(stream: &str) -> String {
        format!("temporary_{stream}")
    }

    pub fn in_flight_related_key(stream: &str) -> String {
        format!("temporary_film_works_by_{stream}")
    }

    async fn read(&self, key: &str) -> Result<Watermark> {
        let raw = self
            .store
            .get(key)
            .await
            .with_context(|| format!("Failed to read checkpoint '{key}'"))?;

        match Watermark::decode(raw.as_deref()) {
            Ok(watermark) => Ok(watermark),
            Err(e) => {
                tracing::warn!(key, "Unreadable checkpoint value, treating as earliest: {e}");
                Ok(Watermark::Earliest)
            }
        }
    }

    async fn write(&self, key: &str, watermark: Watermark) -> Result<()> {
        self.store
            .set(key, Some(watermark.encode()))
            .await
            .with_context(|| format!("Failed to store checkpoint '{key}' = {watermark}"))
    }

    /// Read all three levels for `stream`.
    pub async fn load(&self, stream: &str) -> Result<CascadeState> {
        Ok(CascadeState {
            committed: self.read(&Self::committed_key(stream)).await?,
            in_flight_root: self.read(&Self::in_flight_root_key(stream)).await?,
            in_flight_related: self.read(&Self::in_flight_related_key(stream)).await?,
        })
    }

    pub async fn committed(&self, stream: &str) -> Result<Watermark> {
        self.read(&Self::committed_key(stream)).await
    }

    pub async fn in_flight_root(&self, stream: &str) -> Result<Watermark> {
        self.read(&Self::in_flight_root_key(stream)).await
    }

    pub async fn in_flight_related(&self, stream: &str) -> Result<Watermark> {
        self.read(&Self::in_flight_related_key(stream)).await
    }

    /// Start a pass for `stream`: the in-flight root scan restarts from the
    /// committed position, discarding whatever an interrupted pass left.
    pub async fn begin(&self, stream: &str) -> Result<Watermark> {
        let committed = self.committed(stream).await?;
        self.write(&Self::in_flight_root_key(stream), committed)
            .await?;
        Ok(committed)
    }

    /// Record that the root scan has consumed everything up to `watermark`.
    pub async fn advance_root(&self, stream: &str, watermark: Watermark) -> Result<()> {
        self.write(&Self::in_flight_root_key(stream), watermark)
            .await
    }

    /// Restart the related scan, called once per root page.
    pub async fn reset_related(&self, stream: &str) -> Result<()> {
        self.write(&Self::in_flight_related_key(stream), Watermark::Earliest)
            .await
    }

    /// Record that the related scan has consumed everything up to `watermark`.
    pub async fn advance_related(&self, stream: &str, watermark: Watermark) -> Result<()> {
        self.write(&Self::in_flight_related_key(stream), watermark)
            .await
    }

    /// Promote the in-flight root position to committed.
    ///
    /// The committed value never moves backwards: if the in-flight value is
    /// behind (it should not be), the committed value is kept.
    pub async fn promote(&self, stream: &str) -> Result<Watermark> {
        let committed = self.committed(stream).await?;
        let in_flight = self.in_flight_root(stream).await?;

        if in_flight < committed {
            tracing::warn!(
                stream,
                %committed,
                %in_flight,
                "In-flight checkpoint is behind committed, keeping committed"
            );
            return Ok(committed);
        }

        self.write(&Self::committed_key(stream), in_flight).await?;
        tracing::debug!(stream, %in_flight, "Committed checkpoint");
        Ok(in_flight)
    }
}

//! Checkpoint management for film-sync
//!
//! Records how far each change stream has been synchronized so that a crashed
//! or restarted worker resumes from the last committed position.
//!
//! # Architecture
//!
//! - [`Watermark`] is a single checkpoint value: either the earliest possible
//!   instant or a `(modified, id)` cursor into a source table.
//! - [`CheckpointStore`] is the durable key/value backend. Values are the
//!   string encoding of a watermark (or `None`).
//! - [`CheckpointLedger`] maps the three cascade levels of a stream onto store
//!   keys and exposes them as a typed [`CascadeState`].
//!
//! ## Storage Backends
//!
//! - `JsonFileStore` - one flat JSON object in a single file
//! - `MemoryStore` - in-process map, for tests
//!
//! ## Persisted layout
//!
//! For a stream `s` the ledger uses the keys `s` (committed),
//! `temporary_s` (in-flight root level) and `temporary_film_works_by_s`
//! (in-flight related level).

mod filesystem;
mod ledger;
mod memory;
pub mod store;
mod watermark;


pub use filesystem::JsonFileStore;
pub use ledger::{CascadeState, CheckpointLedger};
pub use memory::MemoryStore;
pub use store::CheckpointStore;
pub use watermark::{Watermark, WatermarkParseError, EARLIEST_SENTINEL};

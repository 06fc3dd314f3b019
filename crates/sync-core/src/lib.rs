//! Core data types for film-sync.
//!
//! This crate defines the vocabulary shared by the source, the sink and the
//! orchestrator:
//!
//! - [`Stream`]: the change-tracked source categories and their tables
//! - [`JoinedRow`]: one row of the film work / person / genre outer join,
//!   modelled as a tagged union instead of a wide nullable record
//! - [`FilmAggregate`] and [`FilmDocument`]: the denormalized per-film-work
//!   structure and its index-ready shape
//! - [`assemble`]: the fold from joined rows to aggregates

pub mod assemble;
mod document;
mod error;
mod model;
mod stream;

pub use assemble::{assemble, to_documents, FilmAggregate, RoleCredits};
pub use document::FilmDocument;
pub use error::SyncCoreError;
pub use model::{ChangedRow, Credit, FilmWorkColumns, Genre, JoinedRow, Person, Role};
pub use stream::{Link, Stream};

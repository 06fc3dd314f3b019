use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncCoreError {
    #[error("unknown stream '{0}' (expected person, genre or film_work)")]
    UnknownStream(String),

    #[error("unknown role '{0}' (expected director, writer or actor)")]
    UnknownRole(String),
}

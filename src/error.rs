//! Error types for kaf.

use thiserror::Error;

/// Errors surfaced by the log engine.
///
/// A get for a log the registry does not know is not an error: the registry
/// answers `Ok(None)` and the HTTP layer turns that into an empty window.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller supplied something malformed: a bad log name, a missing or
    /// out-of-range parameter, an empty or oversized payload.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The on-disk framing could not be decoded: bad DB header, bad record
    /// header, or record numbers that do not increase during a scan.
    #[error("corrupt log frame: {0}")]
    CorruptFrame(String),

    /// An archive request that cannot be honored (empty log, `upto` of 0).
    #[error("archive: {0}")]
    Archive(String),

    /// The log's worker task is gone; its command channel is closed.
    #[error("log worker stopped")]
    WorkerStopped,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::CorruptFrame`] with a static description.
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptFrame(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for scrobd
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Non-fatal errors flow through the reporting channel and are
//! logged; fatal startup errors terminate the process via `anyhow` in `main`.

use thiserror::Error;

/// Main error type for scrobd
#[derive(Error, Debug)]
pub enum Error {
    /// Log entry too short to carry a full entry header. Non-fatal, the
    /// frame is dropped and reading continues.
    #[error("log entry too short for header: {len} bytes")]
    Framing { len: usize },

    /// A `componentOnStateChange` payload that does not split into two
    /// bracketed states. Non-fatal, the line is dropped.
    #[error("cannot split player state in two by ->: {payload}; {line}")]
    StateChangeParse { payload: String, line: String },

    /// A track create/destroy line without a parseable track id token.
    /// Non-fatal, the line is dropped.
    #[error("no track id token in line: {line}")]
    TrackIdParse { line: String },

    /// Attempt to change player state while internal storage is unmounted.
    /// The engine state is left unchanged.
    #[error("attempting to set state while storage is unmounted, ignoring")]
    StorageUnmounted,

    /// Content database query errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Metadata resolution errors outside the database layer
    #[error("resolve error: {0}")]
    Resolve(String),

    /// Scrobble log write errors. Reported, the engine keeps running.
    #[error("scrobble log error: {0}")]
    Scrobble(std::io::Error),

    /// Device discovery errors (capability XML, NVP nodes)
    #[error("device error: {0}")]
    Device(String),

    /// Configuration file loading errors
    #[error("configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the scrobd error type
pub type Result<T> = std::result::Result<T, Error>;

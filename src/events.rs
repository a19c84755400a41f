//! Event types for the scrobd pipeline
//!
//! # Architecture
//!
//! scrobd uses two point-to-point channel hops:
//! - **Log events** (tokio::mpsc, capacity 1): marker parser → inference
//!   engine. One closed, tagged union; the engine dispatches on variant.
//! - **Player events** (tokio::mpsc, capacity 1): inference engine →
//!   scrobble sink. Verdicts carry the content descriptor by value, so the
//!   sink never observes later engine mutation.
//!
//! Capacity-1 channels give rendezvous-like backpressure: parsing never
//! outruns the engine.

use crate::content::Content;

/// Typed event recognized from one device-log line.
///
/// State names are carried verbatim as reported by the audio pipeline
/// (`OMX_State*`); the engine maps them onto its own state set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    /// A content URI was announced for the current or the prepared track.
    ContentUri(String),
    /// `componentOnStateChange: [before]->[after]`, brackets stripped.
    PlayerStateChange { before: String, after: String },
    /// The pipeline is about to report the next track's URI separately.
    Preparing,
    /// End of the current stream (track finished or was stopped).
    EndOfStream,
    /// Internal storage is going away; no disc action is allowed after this.
    StorageUnmounting,
    /// Internal storage is usable again.
    StorageMounted,
    /// A player-core track object was created, with its id token.
    TrackCreated(String),
    /// A player-core track object was destroyed, with its id token.
    TrackDestroyed(String),
}

/// Event emitted by the inference engine toward downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// At-most-one verdict per logical playback. `rating_emitted` on the
    /// carried descriptor distinguishes listened (`true`) from skipped.
    TrackListened(Content),
}

//! Marker parser for device-log lines
//!
//! Each line is matched against a small closed set of marker substrings and
//! mapped to at most one [`LogEvent`], pushed synchronously to every
//! subscriber. Unrecognized lines produce no event and no error.

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::events::LogEvent;

pub const CONTENT_URI_MARKER: &str = "] content URI: ";

/// Duplicated by the audio renderer and the current demuxer component; the
/// engine deduplicates the resulting replayed transitions.
pub const PLAYER_STATE_MARKER: &str = "componentOnStateChange: ";

pub const PREPARING_MARKER: &str = "] Preparing next track.";

pub const END_OF_STREAM_MARKER: &str = "] EOS received. nFilledLen =";

pub const STORAGE_UNMOUNTING_MARKER: &str = "storage[Internal], status[Unmounting]";
pub const STORAGE_MOUNTED_MARKER: &str = "storage[Internal], status[Mounted]";

pub const TRACK_DESTROYED_MARKER: &str = "] has been destroyed";
pub const TRACK_CREATED_MARKER: &str = "] has been created";

/// The track id token sits between this substring and the next `]`.
pub const TRACK_ID_PREFIX: &str = "] Track[";

/// Test-only pacing marker: sleeps without emitting an event, so fixture
/// files can let engine ticks elapse between line groups.
pub const SLEEP_MARKER: &str = "SLEEP FOR ";

/// Maps text lines to typed events and broadcasts them to subscribers.
///
/// Subscribers are registered before parsing begins; pushing to a full
/// subscriber channel suspends the parser, which is the desired
/// backpressure.
#[derive(Default)]
pub struct LogParser {
    subs: Vec<mpsc::Sender<LogEvent>>,
}

impl LogParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a downstream consumer. Must not be called once parsing has
    /// begun.
    pub fn subscribe(&mut self, sub: mpsc::Sender<LogEvent>) {
        self.subs.push(sub);
    }

    /// Parse one line and push the recognized event, if any, to every
    /// subscriber in registration order.
    pub async fn parse(&self, line: &str) -> Result<()> {
        let event = match self.recognize(line).await? {
            Some(event) => event,
            None => return Ok(()),
        };

        for (n, sub) in self.subs.iter().enumerate() {
            debug!(subscriber = n, event = ?event, "parser sending");
            if sub.send(event.clone()).await.is_err() {
                debug!(subscriber = n, "subscriber gone");
            }
        }

        Ok(())
    }

    async fn recognize(&self, line: &str) -> Result<Option<LogEvent>> {
        if let Some(uri) = tail_after(line, CONTENT_URI_MARKER) {
            return Ok(Some(LogEvent::ContentUri(uri.to_string())));
        }

        if let Some(payload) = tail_after(line, PLAYER_STATE_MARKER) {
            return state_change(payload, line).map(Some);
        }

        if line.contains(PREPARING_MARKER) {
            return Ok(Some(LogEvent::Preparing));
        }

        if line.contains(END_OF_STREAM_MARKER) {
            return Ok(Some(LogEvent::EndOfStream));
        }

        if line.contains(STORAGE_UNMOUNTING_MARKER) {
            debug!("storage unmounting");
            return Ok(Some(LogEvent::StorageUnmounting));
        }

        if line.contains(STORAGE_MOUNTED_MARKER) {
            debug!("storage mounted");
            return Ok(Some(LogEvent::StorageMounted));
        }

        if line.contains(TRACK_DESTROYED_MARKER) {
            let id = track_id(line)?;
            return Ok(Some(LogEvent::TrackDestroyed(id.to_string())));
        }

        if line.contains(TRACK_CREATED_MARKER) {
            let id = track_id(line)?;
            return Ok(Some(LogEvent::TrackCreated(id.to_string())));
        }

        if let Some(millis) = tail_after(line, SLEEP_MARKER) {
            match millis.trim().parse::<u64>() {
                Ok(ms) => tokio::time::sleep(std::time::Duration::from_millis(ms)).await,
                Err(_) => error!(payload = millis, "cannot parse sleep duration"),
            }
            return Ok(None);
        }

        Ok(None)
    }
}

/// Everything after the first occurrence of `marker`, or `None` when the
/// marker is absent.
fn tail_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    line.find(marker).map(|start| &line[start + marker.len()..])
}

/// Split a `[before]->[after]` payload into the two state names.
fn state_change(payload: &str, line: &str) -> Result<LogEvent> {
    let malformed = || Error::StateChangeParse {
        payload: payload.to_string(),
        line: line.to_string(),
    };

    let (before, after) = payload.split_once("->").ok_or_else(malformed)?;
    if after.contains("->") {
        return Err(malformed());
    }

    let before = before
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(malformed)?;
    let after = after
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(malformed)?;

    Ok(LogEvent::PlayerStateChange {
        before: before.to_string(),
        after: after.to_string(),
    })
}

/// The token between `] Track[` and the following `]`.
fn track_id(line: &str) -> Result<&str> {
    let missing = || Error::TrackIdParse {
        line: line.to_string(),
    };

    let start = line.find(TRACK_ID_PREFIX).ok_or_else(missing)? + TRACK_ID_PREFIX.len();
    let rest = &line[start..];
    let end = rest.find(']').ok_or_else(missing)?;

    Ok(&rest[..end])
}

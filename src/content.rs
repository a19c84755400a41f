//! Content descriptor for a resolved track
//!
//! Carries the metadata the scrobble log needs plus the per-playback
//! accounting flags the inference engine maintains (`rating_emitted`,
//! `started_at`, `attempted`).

/// Rating field value for a track heard past its listen threshold.
pub const RATING_LISTENED: &str = "L";
/// Rating field value for a skipped track.
pub const RATING_SKIPPED: &str = "S";

/// Metadata and scrobble accounting for the currently playing track.
///
/// The default value is the "empty descriptor": nothing resolved, nothing
/// started, nothing emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub track_number: String,
    /// Track duration in whole seconds.
    pub duration: u32,
    /// True once a listened/skipped verdict has been emitted for this
    /// playback instance.
    pub rating_emitted: bool,
    /// Unix seconds of the first executing tick; 0 means not yet started.
    pub started_at: i64,
    pub musicbrainz_id: String,
    pub sample_rate: u32,
    /// Bitrate in bit/s.
    pub bitrate: u32,
    pub channels: u32,
    pub bit_depth: u32,
    /// True once the engine has tried to resolve this URI, regardless of
    /// outcome.
    pub attempted: bool,
}

impl Content {
    /// A descriptor is valid when every field the scrobble log requires is
    /// filled: artist, title, duration and start timestamp.
    pub fn is_valid(&self) -> bool {
        !self.artist.is_empty() && !self.title.is_empty() && self.duration != 0 && self.started_at != 0
    }

    /// One `.scrobbler.log` line, tab-separated, without the terminating
    /// newline. Tab characters inside string fields are stripped.
    pub fn scrobble_line(&self) -> String {
        let rating = if self.rating_emitted {
            RATING_LISTENED
        } else {
            RATING_SKIPPED
        };

        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            strip_tabs(&self.artist),
            strip_tabs(&self.album),
            strip_tabs(&self.title),
            strip_tabs(&self.track_number),
            self.duration,
            rating,
            self.started_at,
            strip_tabs(&self.musicbrainz_id),
        )
    }
}

fn strip_tabs(s: &str) -> String {
    s.replace('\t', "")
}

//! Content metadata resolution
//!
//! The engine only requires [`Resolver`]: a synchronous-from-its-viewpoint
//! lookup from a content URI to a [`Content`] descriptor. The production
//! implementation reads the device's MTP object database.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, error};

use crate::content::Content;
use crate::error::Result;

/// Default path of the device's MTP object database.
pub const DEFAULT_DB_PATH: &str = "/db/MTPDB.dat";

// object_ext_int attribute keys
const AKEY_DURATION_MS: i64 = 12;
const AKEY_SAMPLE_RATE: i64 = 16;
const AKEY_CHANNELS: i64 = 17;
const AKEY_BITRATE: i64 = 19;
const AKEY_BIT_DEPTH: i64 = 78;

/// Lookup from a content URI to a content descriptor.
///
/// Called inline from the engine's tick; implementations are expected to be
/// short. An error never poisons the engine, it just leaves the playback
/// without metadata.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, uri: &str) -> Result<Content>;
}

/// Resolver backed by the device's MTP object database.
///
/// Content is matched on filename and its parent directory title, the way
/// the media scanner stores objects.
pub struct MtpDbResolver {
    db: SqlitePool,
}

impl MtpDbResolver {
    /// Open the object database read-only.
    pub async fn connect(path: &str) -> Result<Self> {
        let url = format!("sqlite://{path}?mode=ro");
        let db = SqlitePool::connect(&url).await?;

        Ok(Self { db })
    }

    /// One integer attribute of a file object, 0 when absent.
    async fn file_param(&self, object_id: i64, akey: i64) -> Result<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT value FROM object_ext_int WHERE object_id = ? AND akey = ?",
        )
        .bind(object_id)
        .bind(akey)
        .fetch_optional(&self.db)
        .await?;

        Ok(value.unwrap_or(0))
    }
}

#[async_trait]
impl Resolver for MtpDbResolver {
    async fn resolve(&self, uri: &str) -> Result<Content> {
        let (directory, filename) = split_uri(uri);

        let row: Option<(
            Option<i64>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<i64>,
            Option<i64>,
        )> = sqlx::query_as(
            "SELECT ob.object_id, a.value, alb.value, ob.title, ob.series_no, info.value \
             FROM object_body ob \
             JOIN artists a ON a.id = ob.artist_id \
             JOIN albums alb ON alb.id = ob.album_id \
             JOIN object_ext_int info ON info.object_id = ob.object_id \
             JOIN object_body ob2 ON ob2.object_id = ob.parent_id \
             WHERE ob.filename = ? AND ob2.title = ? AND info.akey = ?",
        )
        .bind(filename)
        .bind(directory)
        .bind(AKEY_DURATION_MS)
        .fetch_optional(&self.db)
        .await?;

        let mut content = Content::default();
        let Some((object_id, artist, album, title, series_no, duration_ms)) = row else {
            debug!(uri, "no database object for uri");
            return Ok(content);
        };

        content.artist = artist.unwrap_or_default();
        content.album = album.unwrap_or_default();
        content.title = title.unwrap_or_default();
        content.track_number = series_no.map(|n| n.to_string()).unwrap_or_default();
        content.duration = (duration_ms.unwrap_or(0) / 1000).max(0) as u32;

        if let Some(object_id) = object_id {
            // Format attributes are nice-to-have; a missing one is logged
            // and left at zero.
            for (akey, field) in [
                (AKEY_SAMPLE_RATE, &mut content.sample_rate),
                (AKEY_CHANNELS, &mut content.channels),
                (AKEY_BITRATE, &mut content.bitrate),
                (AKEY_BIT_DEPTH, &mut content.bit_depth),
            ] {
                match self.file_param(object_id, akey).await {
                    Ok(value) => *field = value.max(0) as u32,
                    Err(e) => error!(object_id, akey, error = %e, "cannot read file param"),
                }
            }
        }

        debug!(
            uri,
            title = %content.title,
            artist = %content.artist,
            "resolved"
        );

        Ok(content)
    }
}

/// Split a URI into its parent directory's base name and its filename, the
/// two keys the object database is matched on.
fn split_uri(uri: &str) -> (&str, &str) {
    let (dir, filename) = match uri.rsplit_once('/') {
        Some(split) => split,
        None => return ("", uri),
    };
    let directory = dir.rsplit('/').next().unwrap_or("");

    (directory, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_uri_takes_parent_base_and_filename() {
        assert_eq!(
            split_uri("/data/mnt/internal/MUSIC/Albums/1.flac"),
            ("Albums", "1.flac")
        );
        assert_eq!(split_uri("/1.flac"), ("", "1.flac"));
        assert_eq!(split_uri("1.flac"), ("", "1.flac"));
    }
}

//! Scrobble log writer
//!
//! Appends one tab-separated line per verdict to the `.scrobbler.log` file
//! in the Audioscrobbler portable-player format. The file gets its three
//! header lines once on creation and is only ever appended to afterwards.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::debug;

use crate::content::Content;
use crate::error::Error;
use crate::events::PlayerEvent;

/// Default scrobble log location on the device's internal storage.
pub const DEFAULT_LOG_PATH: &str = "/data/mnt/internal/.scrobbler.log";

const FORMAT_HEADER: &str = "#AUDIOSCROBBLER/1.1\n#TZ/UNKNOWN\n";

/// Append-only `.scrobbler.log` sink.
pub struct FileLog {
    path: PathBuf,
    client: String,
    device: String,
}

impl FileLog {
    /// `client` identifies this software, `device` the hardware; both end up
    /// in the `#CLIENT` header line.
    pub fn new(path: impl Into<PathBuf>, client: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            client: client.into(),
            device: device.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consume verdicts until the emitting side closes. Write failures are
    /// reported and do not stop the sink.
    pub async fn listen(&self, mut events: mpsc::Receiver<PlayerEvent>, errors: mpsc::Sender<Error>) {
        while let Some(event) = events.recv().await {
            let PlayerEvent::TrackListened(content) = event;
            if let Err(e) = self.append(&content).await {
                let _ = errors.send(e).await;
            }
        }
    }

    /// Append one verdict line, creating the file with its header first if
    /// needed.
    pub async fn append(&self, content: &Content) -> crate::Result<()> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(Error::Scrobble)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(Error::Scrobble)?;

        if !exists {
            debug!(path = %self.path.display(), "creating new scrobble log");
            let header = format!("{}#CLIENT/{} on {}\n", FORMAT_HEADER, self.client, self.device);
            file.write_all(header.as_bytes())
                .await
                .map_err(Error::Scrobble)?;
        }

        let line = format!("{}\n", content.scrobble_line());
        file.write_all(line.as_bytes())
            .await
            .map_err(Error::Scrobble)?;
        file.flush().await.map_err(Error::Scrobble)?;

        Ok(())
    }
}

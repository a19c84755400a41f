//! Status socket server
//!
//! Serves the engine's current state over a local unix stream socket using a
//! small subset of the MPD line protocol, so existing now-playing widgets can
//! point at the daemon. The only request understood is the status batch;
//! everything else gets a bare `OK`.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info};

use crate::player::{AudioPlayer, PlayerSnapshot, PlayerState};
use crate::Result;

/// Default status socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/scrobbler.sock";

/// The one command batch the MPD-compatible clients send.
const STATUS_BATCH: &[u8] = b"noidle\ncommand_list_begin\nstatus\ncurrentsong\ncommand_list_end\nidle\n";

const REPLY_OK: &str = "OK\n";

/// Unix-socket status server over a shared [`AudioPlayer`].
pub struct StatusServer {
    listener: UnixListener,
    player: Arc<AudioPlayer>,
}

impl StatusServer {
    /// Bind the socket. A stale socket file from a previous run is removed
    /// first; failure to bind is fatal for the process.
    pub fn bind(socket_path: impl Into<PathBuf>, player: Arc<AudioPlayer>) -> Result<Self> {
        let socket_path = socket_path.into();
        if socket_path.exists() {
            let _ = std::fs::remove_file(&socket_path);
        }

        let listener = UnixListener::bind(&socket_path)?;
        info!(path = %socket_path.display(), "status socket bound");

        Ok(Self { listener, player })
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let player = self.player.clone();
                    tokio::spawn(handle_connection(stream, player));
                }
                Err(e) => {
                    error!(error = %e, "cannot accept status connection");
                }
            }
        }
    }
}

async fn handle_connection(mut stream: UnixStream, player: Arc<AudioPlayer>) {
    let mut buf = [0u8; 4096];

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "cannot read from status socket");
                break;
            }
        };

        let reply = if &buf[..n] == STATUS_BATCH {
            status_block(&player.snapshot().await)
        } else {
            REPLY_OK.to_string()
        };

        if let Err(e) = stream.write_all(reply.as_bytes()).await {
            debug!(error = %e, "cannot write to status socket");
            break;
        }
    }
}

/// MPD reports play/pause/stop; everything that is not executing or paused
/// maps to stop.
fn mpd_state(state: PlayerState) -> &'static str {
    match state {
        PlayerState::Executing => "play",
        PlayerState::Pause => "pause",
        _ => "stop",
    }
}

fn status_block(snapshot: &PlayerSnapshot) -> String {
    format!(
        "OK\n\
         volume: 50\n\
         state: {}\n\
         elapsed: {}\n\
         bitrate: {}\n\
         duration: {}\n\
         file: {}\n\
         audio: {}:{}:{}\n\
         Artist: {}\n\
         Album: {}\n\
         Title: {}\n\
         Track: {}\n\
         OK\n",
        mpd_state(snapshot.state),
        snapshot.current.playing_for,
        snapshot.content.bitrate / 1000,
        snapshot.content.duration,
        snapshot.current.content_uri,
        snapshot.content.sample_rate,
        snapshot.content.bit_depth,
        snapshot.content.channels,
        snapshot.content.artist,
        snapshot.content.album,
        snapshot.content.title,
        snapshot.content.track_number,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;
    use crate::player::Track;

    #[test]
    fn status_block_interpolates_snapshot_fields() {
        let snapshot = PlayerSnapshot {
            state: PlayerState::Executing,
            current: Track {
                content_uri: "/data/mnt/internal/MUSIC/1.flac".into(),
                playing_for: 42,
                track_id: "TK_1".into(),
            },
            next: Track::default(),
            preparing: false,
            content: Content {
                artist: "artist".into(),
                album: "album".into(),
                title: "title".into(),
                track_number: "3".into(),
                duration: 365,
                bitrate: 1_411_000,
                sample_rate: 44_100,
                channels: 2,
                bit_depth: 16,
                ..Content::default()
            },
        };

        let block = status_block(&snapshot);
        assert!(block.starts_with("OK\n"));
        assert!(block.ends_with("OK\n"));
        assert!(block.contains("state: play\n"));
        assert!(block.contains("elapsed: 42\n"));
        assert!(block.contains("bitrate: 1411\n"));
        assert!(block.contains("duration: 365\n"));
        assert!(block.contains("file: /data/mnt/internal/MUSIC/1.flac\n"));
        assert!(block.contains("audio: 44100:16:2\n"));
        assert!(block.contains("Track: 3\n"));
    }

    #[test]
    fn only_executing_and_pause_map_to_mpd_states() {
        assert_eq!(mpd_state(PlayerState::Executing), "play");
        assert_eq!(mpd_state(PlayerState::Pause), "pause");
        assert_eq!(mpd_state(PlayerState::Idle), "stop");
        assert_eq!(mpd_state(PlayerState::StorageUnmounted), "stop");
    }
}

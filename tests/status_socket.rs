//! Status socket protocol tests

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

use helpers::StubResolver;
use scrobd::content::Content;
use scrobd::player::{AudioPlayer, PlayerState};
use scrobd::server::StatusServer;

const STATUS_BATCH: &[u8] =
    b"noidle\ncommand_list_begin\nstatus\ncurrentsong\ncommand_list_end\nidle\n";

async fn start_server(state: PlayerState) -> (tempfile::TempDir, UnixStream) {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("scrobbler.sock");

    let (emitter, _verdicts) = mpsc::channel(1);
    let player = Arc::new(
        AudioPlayer::new(Arc::new(StubResolver::default()), emitter)
            .with_state(state)
            .with_current_track("/data/mnt/internal/MUSIC/1.flac", 7)
            .with_content(Content {
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
            }),
    );

    let server = StatusServer::bind(&socket_path, player).unwrap();
    tokio::spawn(server.run());

    // The listener is bound before run() is spawned, so connecting is safe.
    let stream = UnixStream::connect(&socket_path).await.unwrap();
    (dir, stream)
}

async fn read_reply(stream: &mut UnixStream) -> String {
    let mut buf = vec![0u8; 4096];
    let n = tokio::time::timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("reply timeout")
        .unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

#[tokio::test]
async fn status_batch_gets_the_full_block() {
    let (_dir, mut stream) = start_server(PlayerState::Executing).await;

    stream.write_all(STATUS_BATCH).await.unwrap();
    let reply = read_reply(&mut stream).await;

    assert!(reply.starts_with("OK\n"), "reply: {reply}");
    assert!(reply.contains("volume: 50\n"));
    assert!(reply.contains("state: play\n"));
    assert!(reply.contains("elapsed: 7\n"));
    assert!(reply.contains("bitrate: 1411\n"));
    assert!(reply.contains("duration: 365\n"));
    assert!(reply.contains("file: /data/mnt/internal/MUSIC/1.flac\n"));
    assert!(reply.contains("audio: 44100:16:2\n"));
    assert!(reply.contains("Artist: artist\n"));
    assert!(reply.contains("Album: album\n"));
    assert!(reply.contains("Title: title\n"));
    assert!(reply.contains("Track: 3\n"));
    assert!(reply.ends_with("OK\n"));
}

#[tokio::test]
async fn paused_player_reports_pause() {
    let (_dir, mut stream) = start_server(PlayerState::Pause).await;

    stream.write_all(STATUS_BATCH).await.unwrap();
    let reply = read_reply(&mut stream).await;
    assert!(reply.contains("state: pause\n"));
}

#[tokio::test]
async fn anything_else_gets_a_bare_ok() {
    let (_dir, mut stream) = start_server(PlayerState::Executing).await;

    stream.write_all(b"status\n").await.unwrap();
    assert_eq!(read_reply(&mut stream).await, "OK\n");

    // Connection stays usable for the next request.
    stream.write_all(b"currentsong\n").await.unwrap();
    assert_eq!(read_reply(&mut stream).await, "OK\n");
}

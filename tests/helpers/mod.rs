//! Shared test harness for the end-to-end scenario tests
//!
//! Provides the stub resolver with fixed metadata, realistic device-log line
//! builders, and a runner that drives fixture lines through the parser into
//! a live engine loop.

// Each test binary compiles this module; not every binary uses every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use scrobd::clock::FixedClock;
use scrobd::content::Content;
use scrobd::events::PlayerEvent;
use scrobd::parser::LogParser;
use scrobd::player::{AudioPlayer, PlayerSnapshot};
use scrobd::resolver::Resolver;
use scrobd::{Error, Result};

/// Engine tick period used by every scenario; fast enough that all events
/// between two `SLEEP FOR` pacing lines are observed within one tick.
pub const TICK: Duration = Duration::from_millis(50);

/// Unix second the deterministic clock starts at.
pub const CLOCK_START: i64 = 12345;

/// Resolver returning fixed metadata with the URI as title, counting calls.
#[derive(Default)]
pub struct StubResolver {
    calls: AtomicUsize,
}

impl StubResolver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for StubResolver {
    async fn resolve(&self, uri: &str) -> Result<Content> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Content {
            artist: "artist".into(),
            album: "album".into(),
            title: uri.into(),
            track_number: "1".into(),
            duration: 10,
            ..Content::default()
        })
    }
}

/// Expected listened verdict for `uri` started at `started_at`.
pub fn listened(uri: &str, started_at: i64) -> Content {
    Content {
        artist: "artist".into(),
        album: "album".into(),
        title: uri.into(),
        track_number: "1".into(),
        duration: 10,
        rating_emitted: true,
        started_at,
        attempted: true,
        ..Content::default()
    }
}

/// Expected skipped verdict for `uri` started at `started_at`.
pub fn skipped(uri: &str, started_at: i64) -> Content {
    Content {
        rating_emitted: false,
        ..listened(uri, started_at)
    }
}

pub fn uri_line(path: &str) -> String {
    format!("I/hagodaemon(  281): 20240413 180234.150834 [INFO] [DmcOmxDemuxerCmp.c:2487] [tid:2350] content URI: {path}")
}

/// `before`/`after` are the bare state names, e.g. `Pause`, `Executing`.
pub fn state_line(before: &str, after: &str) -> String {
    format!("I/hagodaemon(  281): 20240415 080125.728321 [INFO] [DmcAndroidAudioRendererCmp.c:1567] [tid:1675] componentOnStateChange: [OMX_State{before}]->[OMX_State{after}]")
}

pub fn preparing_line() -> String {
    "I/hagodaemon(  281): 20240414 035736.608085 [INFO] [GapPlayerCmdHandlerPlay.c:533] [tid:527] Preparing next track.".to_string()
}

pub fn eos_line() -> String {
    "I/hagodaemon(  281): 20240414 035742.052219 [INFO] [DmcAndroidAudioRendererCmp.c:1305] [tid:4859] EOS received. nFilledLen = [0], nTimeStamp = [224258321]".to_string()
}

pub fn created_line(id: &str) -> String {
    format!("I/hagodaemon(  312): 20240414 035736.712345 [INFO] [SoundServiceTrack.cpp:154] [tid:312] Track[{id}] has been created")
}

pub fn destroyed_line(id: &str) -> String {
    format!("I/hagodaemon(  312): 20240414 035742.812345 [INFO] [SoundServiceTrack.cpp:209] [tid:312] Track[{id}] has been destroyed")
}

pub fn unmounting_line() -> String {
    "I/StorageManager( 400): storage[Internal], status[Unmounting]".to_string()
}

pub fn mounted_line() -> String {
    "I/StorageManager( 400): storage[Internal], status[Mounted]".to_string()
}

/// Pacing marker: the parser sleeps this long, letting engine ticks elapse.
pub fn sleep_line(millis: u64) -> String {
    format!("SLEEP FOR {millis}")
}

/// Outcome of one scenario run.
pub struct ScenarioResult {
    pub verdicts: Vec<Content>,
    pub errors: Vec<Error>,
    pub snapshot: PlayerSnapshot,
    pub resolver_calls: usize,
}

impl ScenarioResult {
    pub fn storage_unmounted_errors(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| matches!(e, Error::StorageUnmounted))
            .count()
    }
}

/// Feed fixture lines through the parser into a running engine and collect
/// every verdict and error, then stop the engine and snapshot it.
pub async fn run_scenario(lines: &[String]) -> ScenarioResult {
    let resolver = Arc::new(StubResolver::default());
    let (emitter_tx, mut emitter_rx) = mpsc::channel(1);

    let player = Arc::new(
        AudioPlayer::new(resolver.clone(), emitter_tx)
            .with_listen_percent(50)
            .with_clock(Arc::new(FixedClock::starting_at(CLOCK_START)))
            .with_tick_period(TICK),
    );

    let (stop_tx, stop_rx) = mpsc::channel(1);
    let (err_tx, mut err_rx) = mpsc::channel(16);

    let engine = player.clone();
    let consume = tokio::spawn(async move {
        engine.consume(stop_rx, err_tx).await;
    });

    let verdicts = Arc::new(Mutex::new(Vec::new()));
    let verdict_sink = verdicts.clone();
    tokio::spawn(async move {
        while let Some(PlayerEvent::TrackListened(content)) = emitter_rx.recv().await {
            verdict_sink.lock().unwrap().push(content);
        }
    });

    let errors = Arc::new(Mutex::new(Vec::new()));
    let error_sink = errors.clone();
    tokio::spawn(async move {
        while let Some(e) = err_rx.recv().await {
            error_sink.lock().unwrap().push(e);
        }
    });

    let mut parser = LogParser::new();
    parser.subscribe(player.consumer());

    for line in lines {
        if let Err(e) = parser.parse(line).await {
            errors.lock().unwrap().push(e);
        }
    }

    // Let in-flight events and the last tick settle before stopping.
    tokio::time::sleep(Duration::from_millis(120)).await;
    let _ = stop_tx.send(()).await;
    let _ = consume.await;

    let snapshot = player.snapshot().await;
    let verdicts = verdicts.lock().unwrap().clone();
    let errors = std::mem::take(&mut *errors.lock().unwrap());

    ScenarioResult {
        verdicts,
        errors,
        snapshot,
        resolver_calls: resolver.calls(),
    }
}

//! Listening inference engine
//!
//! Consumes typed events from the marker parser plus a one-second tick and
//! maintains the player model: current/next track slots, player state, mount
//! gating and per-track scrobble accounting. Emits at most one
//! [`PlayerEvent::TrackListened`] verdict per logical playback.
//!
//! All mutable fields live behind one mutex, held for the duration of every
//! state change, stop, destroy and tick; the status server reads snapshots
//! under the same mutex.

mod state;

pub use state::PlayerState;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::content::Content;
use crate::error::{Error, Result};
use crate::events::{LogEvent, PlayerEvent};
use crate::resolver::Resolver;

/// URIs containing this substring are UI notification sounds and must never
/// scrobble.
pub const BEEP_IGNORE: &str = "WM_BEEP";

const DEFAULT_TICK: Duration = Duration::from_secs(1);
const DEFAULT_LISTEN_PERCENT: u32 = 50;

/// One of the engine's two track slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    /// Filesystem-like content URI; empty means the slot is unused.
    pub content_uri: String,
    /// Whole seconds spent executing this track.
    pub playing_for: u32,
    /// Opaque track id token supplied by the log.
    pub track_id: String,
}

impl Track {
    fn clear(&mut self) {
        self.content_uri.clear();
        self.playing_for = 0;
        self.track_id.clear();
    }
}

/// Mutable engine fields, all behind the one engine mutex.
#[derive(Debug, Default)]
struct PlayerModel {
    state: PlayerState,
    state_before: PlayerState,
    current: Track,
    next: Track,
    /// When true, the next content-URI event belongs to the prepared track.
    preparing: bool,
    current_content: Content,
    /// Seconds of playback required for a listened verdict, derived from the
    /// resolved duration.
    minimum_listen_duration: u32,
}

/// Point-in-time copy of the engine's public fields, taken under the engine
/// mutex so readers never observe a torn update.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub state: PlayerState,
    pub current: Track,
    pub next: Track,
    pub preparing: bool,
    pub content: Content,
}

/// Tracks audio player state by consuming log events.
pub struct AudioPlayer {
    model: Mutex<PlayerModel>,
    events_tx: mpsc::Sender<LogEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<LogEvent>>>,
    emitter: mpsc::Sender<PlayerEvent>,
    resolver: Arc<dyn Resolver>,
    clock: Arc<dyn Clock>,
    tick_period: Duration,
    /// listened threshold = duration / divider
    divider: u32,
}

impl AudioPlayer {
    pub fn new(resolver: Arc<dyn Resolver>, emitter: mpsc::Sender<PlayerEvent>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(1);

        Self {
            model: Mutex::new(PlayerModel::default()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            emitter,
            resolver,
            clock: Arc::new(SystemClock),
            tick_period: DEFAULT_TICK,
            divider: 100 / DEFAULT_LISTEN_PERCENT,
        }
    }

    /// Set the listened threshold as a percentage of track duration.
    /// Out-of-range values snap back to the default of 50.
    pub fn with_listen_percent(mut self, percent: u32) -> Self {
        let percent = if percent == 0 || percent > 100 {
            DEFAULT_LISTEN_PERCENT
        } else {
            percent
        };
        self.divider = 100 / percent;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tick_period(mut self, period: Duration) -> Self {
        self.tick_period = period;
        self
    }

    pub fn with_state(mut self, state: PlayerState) -> Self {
        self.model.get_mut().state = state;
        self
    }

    pub fn with_current_track(mut self, uri: &str, playing_for: u32) -> Self {
        let model = self.model.get_mut();
        model.current.content_uri = uri.to_string();
        model.current.playing_for = playing_for;
        self
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.model.get_mut().current_content = content;
        self
    }

    /// Sender half of the engine's event queue, for parser subscription.
    pub fn consumer(&self) -> mpsc::Sender<LogEvent> {
        self.events_tx.clone()
    }

    /// Copy of the engine's readable fields, taken under the engine mutex.
    pub async fn snapshot(&self) -> PlayerSnapshot {
        let model = self.model.lock().await;
        PlayerSnapshot {
            state: model.state,
            current: model.current.clone(),
            next: model.next.clone(),
            preparing: model.preparing,
            content: model.current_content.clone(),
        }
    }

    /// Run the engine loop: multiplex the event queue, the tick and the stop
    /// signal until stopped. Errors are reported on `errors` and never end
    /// the loop.
    pub async fn consume(&self, mut stop: mpsc::Receiver<()>, errors: mpsc::Sender<Error>) {
        let mut events = match self.events_rx.lock().await.take() {
            Some(rx) => rx,
            None => {
                debug!("consume already running, refusing second loop");
                return;
            }
        };

        let mut ticker = interval_at(Instant::now() + self.tick_period, self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    debug!(event = ?event, "player event in");
                    if let Err(e) = self.handle_event(event).await {
                        let _ = errors.send(e).await;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        let _ = errors.send(e).await;
                    }
                }
                _ = stop.recv() => break,
            }
        }
    }

    /// Dispatch one parsed event onto the model.
    pub async fn handle_event(&self, event: LogEvent) -> Result<()> {
        match event {
            LogEvent::PlayerStateChange { before, after } => {
                self.set_state(PlayerState::from_omx(&before), PlayerState::from_omx(&after))
                    .await
            }
            LogEvent::StorageUnmounting => {
                let previous = self.model.lock().await.state_before;
                let res = self.set_state(previous, PlayerState::StorageUnmounted).await;
                self.stop().await;
                res
            }
            LogEvent::StorageMounted => {
                let previous = self.model.lock().await.state_before;
                self.set_state(previous, PlayerState::StorageMounted).await
            }
            LogEvent::ContentUri(uri) => {
                self.set_content_uri(uri).await;
                Ok(())
            }
            LogEvent::EndOfStream => {
                self.stop().await;
                Ok(())
            }
            LogEvent::Preparing => {
                self.model.lock().await.preparing = true;
                Ok(())
            }
            LogEvent::TrackDestroyed(id) => {
                self.destroy_track(&id).await;
                Ok(())
            }
            LogEvent::TrackCreated(id) => {
                self.create_track(id).await;
                Ok(())
            }
        }
    }

    /// Apply a `before -> after` transition.
    ///
    /// Mount states cut through unconditionally; while unmounted only the
    /// transition back to mounted is accepted; transitions whose `before`
    /// does not match the current state are replayed duplicates from a
    /// second log component and are silently ignored.
    pub async fn set_state(&self, before: PlayerState, after: PlayerState) -> Result<()> {
        let mut model = self.model.lock().await;

        if model.state == PlayerState::StorageUnmounted && after != PlayerState::StorageMounted {
            return Err(Error::StorageUnmounted);
        }

        if after.is_storage() {
            model.state_before = model.state;
            model.state = after;
            return Ok(());
        }

        if model.state == PlayerState::Start {
            if after == PlayerState::Loaded {
                model.preparing = false;
            }
            model.state_before = after;
            model.state = after;
            return Ok(());
        }

        if model.state != before && !model.state.is_storage() {
            return Ok(());
        }

        if after == PlayerState::Loaded {
            model.preparing = false;
        }

        model.state_before = model.state;
        model.state = after;

        Ok(())
    }

    /// Route an announced content URI to the proper slot.
    ///
    /// While preparing with a live current track the URI belongs to the
    /// prepared track; otherwise it is the first track or an explicit change
    /// after the prior track was cleared.
    pub async fn set_content_uri(&self, uri: String) {
        let mut model = self.model.lock().await;

        if model.preparing && !model.current.content_uri.is_empty() {
            model.next.content_uri = uri;
            model.preparing = false;
            return;
        }

        model.current.content_uri = uri;
        model.current.playing_for = 0;
    }

    /// Reset per-playback accounting and pull the prepared track in.
    ///
    /// Deliberately emits nothing: the listened verdict has already fired
    /// during executing ticks, and skipped verdicts originate only from
    /// track destruction. A looped track that is seeked past its threshold
    /// therefore produces neither event.
    pub async fn stop(&self) {
        let mut model = self.model.lock().await;

        model.current.playing_for = 0;
        model.current_content.rating_emitted = false;
        model.current_content.started_at = 0;
        model.current_content.attempted = false;

        if !model.next.content_uri.is_empty() {
            model.current.content_uri = model.next.content_uri.clone();
        }
    }

    /// Create events fire right before playback starts, so the id belongs to
    /// the current track.
    pub async fn create_track(&self, id: String) {
        self.model.lock().await.current.track_id = id;
    }

    /// Handle destruction of the track object named by `id`.
    ///
    /// A populated playback that was cut short after more than two seconds
    /// without a verdict yields its one skipped verdict here; then the
    /// descriptor and any slot owning the id are reset.
    pub async fn destroy_track(&self, id: &str) {
        let mut model = self.model.lock().await;
        debug!(track = id, "destroyed track");

        if !model.current_content.rating_emitted
            && model.current_content.is_valid()
            && model.current.playing_for > 2
        {
            let content = model.current_content.clone();
            let _ = self.emitter.send(PlayerEvent::TrackListened(content)).await;
            info!(uri = %model.current.content_uri, "sent to scrobbler as skipped");
        }

        model.current_content = Content::default();

        if model.current.track_id == id {
            model.current.clear();
        }

        if model.next.track_id == id {
            model.next.clear();
        }
    }

    /// One-second tick: lazy metadata resolution, start-timestamp latch,
    /// playback accounting and the listened-threshold verdict.
    ///
    /// Tracks changing faster than the tick period only have their last
    /// incarnation recorded.
    pub async fn tick(&self) -> Result<()> {
        let mut model = self.model.lock().await;

        if !model.current_content.attempted && !model.current.content_uri.is_empty() {
            debug!(uri = %model.current.content_uri, "resolving");

            match self.resolve(&model.current.content_uri).await {
                Ok(content) => {
                    model.current_content = content;
                    model.current_content.attempted = true;
                    model.current_content.rating_emitted = false;
                    model.minimum_listen_duration = model.current_content.duration / self.divider;
                }
                Err(e) => {
                    model.current_content = Content {
                        attempted: true,
                        ..Content::default()
                    };
                    model.minimum_listen_duration = 0;
                    return Err(e);
                }
            }
        }

        debug!(
            uri = %model.current.content_uri,
            title = %model.current_content.title,
            elapsed = model.current.playing_for,
            state = %model.state,
            min = model.minimum_listen_duration,
            "status"
        );

        if model.state != PlayerState::Executing {
            return Ok(());
        }

        if model.current_content.started_at == 0 {
            model.current_content.started_at = self.clock.now_unix();
        }

        model.current.playing_for += 1;

        if !model.current_content.is_valid() {
            debug!(uri = %model.current.content_uri, "track not valid, not rating");
            return Ok(());
        }

        if model.current.playing_for >= model.minimum_listen_duration
            && !model.current_content.rating_emitted
        {
            model.current_content.rating_emitted = true;
            let content = model.current_content.clone();
            let _ = self.emitter.send(PlayerEvent::TrackListened(content)).await;

            info!(
                title = %model.current_content.title,
                elapsed = model.current.playing_for,
                "sent to scrobbler"
            );
        }

        Ok(())
    }

    /// Resolve a URI through the configured resolver, shielding it from
    /// empty URIs and notification beeps.
    async fn resolve(&self, uri: &str) -> Result<Content> {
        if uri.is_empty() {
            debug!("empty uri");
            return Ok(Content::default());
        }

        if uri.contains(BEEP_IGNORE) {
            debug!("ignoring beep");
            return Ok(Content::default());
        }

        self.resolver.resolve(uri).await
    }
}

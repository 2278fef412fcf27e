//! Queue & player state machine.
//!
//! # Design
//! - Local play intent and the server's "something is playing" report are tracked
//!   separately; together they decide whether this tab or another consumer drives the
//!   single server-side stream.
//! - Transitions return [`PlayerEffect`]s for the wasm controller, which owns the audio
//!   element; the view model is derived on demand with [`QueuePlayer::view`].

use serde::Deserialize;
use serde_json::Value;

/// HTML rendering of the queue.
pub const QUEUE_LIST_PATH: &str = "/queue/list";
/// Cover of the current track.
pub const QUEUE_COVER_PATH: &str = "/queue/cover";
/// Accepts the full queue ordering as `ids[]`.
pub const QUEUE_UPDATE_PATH: &str = "/queue/update";
/// Empties the queue.
pub const QUEUE_CLEAR_PATH: &str = "/queue/clear";
/// Shuffles the queue.
pub const QUEUE_SHUFFLE_PATH: &str = "/queue/shuffle";
/// Audio stream of the queue.
pub const STREAM_PATH: &str = "/play/stream";
/// Emitted once the bus is open so the server pushes the current state.
pub const QUEUE_OPEN_EVENT: &str = "queue.open";

/// Track descriptor pushed by the server.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackInfo {
    /// Artist name.
    pub artist: Option<String>,
    /// Album title.
    pub album: Option<String>,
    /// Track title.
    pub title: String,
    /// Duration in seconds.
    pub duration: f64,
}

impl TrackInfo {
    /// `Artist - Title`, or just the title.
    #[must_use]
    pub fn label(&self) -> String {
        match self.artist.as_deref().filter(|artist| !artist.is_empty()) {
            Some(artist) => format!("{artist} - {}", self.title),
            None => self.title.clone(),
        }
    }
}

/// Progress report pushed by the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Progress {
    /// Seconds streamed so far.
    pub elapsed: f64,
    /// Seconds the client has buffered ahead of playback.
    pub ahead: f64,
}

/// Player states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// Nothing queued or playing.
    Idle,
    /// This tab pulls the stream.
    LocallyPlaying,
    /// Another consumer pulls the stream.
    ExternallyPlaying,
    /// Playback ended.
    Stopped,
}

/// Inputs of the state machine.
#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// `queue.current_track`.
    CurrentTrack(Option<TrackInfo>),
    /// `queue.start` with the started track.
    Start(Option<TrackInfo>),
    /// `queue.progress` / `queue.current_progress`.
    Progress(Progress),
    /// `queue.end`.
    End,
    /// `queue.reset`.
    Reset,
    /// `queue.next.none`.
    NextNone,
    /// `queue.update`.
    Update,
    /// Local play button.
    PlayPressed,
    /// Local pause button.
    PausePressed,
}

impl PlayerEvent {
    /// Decode a bus event; `None` for names the player does not handle.
    #[must_use]
    pub fn from_bus(event: &str, args: &[Value]) -> Option<Self> {
        let track = || args.first().and_then(parse_track);
        match event {
            "queue.current_track" => Some(Self::CurrentTrack(track())),
            "queue.start" => Some(Self::Start(track())),
            "queue.progress" | "queue.current_progress" => Some(Self::Progress(
                args.first()
                    .and_then(|value| Progress::deserialize(value).ok())
                    .unwrap_or_default(),
            )),
            "queue.end" => Some(Self::End),
            "queue.reset" => Some(Self::Reset),
            "queue.next.none" => Some(Self::NextNone),
            "queue.update" => Some(Self::Update),
            _ => None,
        }
    }
}

fn parse_track(value: &Value) -> Option<TrackInfo> {
    if value.is_null() {
        return None;
    }
    TrackInfo::deserialize(value).ok()
}

/// Bus events consumed by the player.
pub const PLAYER_EVENTS: [&str; 8] = [
    "queue.current_track",
    "queue.current_progress",
    "queue.start",
    "queue.progress",
    "queue.end",
    "queue.reset",
    "queue.next.none",
    "queue.update",
];

/// Work for the controller owning the audio element and queue list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEffect {
    /// Point the audio element at this stream URL and start playback.
    LoadSource(String),
    /// Drop the audio source to release the upstream stream.
    UnloadSource,
    /// Re-render the queue list.
    RefreshQueue,
}

/// Derived UI state.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerView {
    /// Play button visible.
    pub play_visible: bool,
    /// Pause button visible.
    pub pause_visible: bool,
    /// Transport buttons usable.
    pub controls_enabled: bool,
    /// Current track label.
    pub title: Option<String>,
    /// `m:ss` of the audible position.
    pub elapsed_label: String,
    /// `m:ss` of the track duration.
    pub duration_label: String,
    /// Played fraction of the track (0..=1).
    pub played_fraction: f64,
    /// Buffered-ahead fraction of the track (0..=1).
    pub buffered_fraction: f64,
}

/// Queue & player state.
#[derive(Clone, Debug)]
pub struct QueuePlayer {
    state: PlayerState,
    track: Option<TrackInfo>,
    progress: Progress,
    local_intent: bool,
    server_playing: bool,
    source_loaded: bool,
    stream_path: String,
}

impl QueuePlayer {
    /// Idle player streaming from `stream_path`.
    #[must_use]
    pub fn new(stream_path: impl Into<String>) -> Self {
        Self {
            state: PlayerState::Idle,
            track: None,
            progress: Progress::default(),
            local_intent: false,
            server_playing: false,
            source_loaded: false,
            stream_path: stream_path.into(),
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> PlayerState {
        self.state
    }

    /// Current track, if known.
    #[must_use]
    pub const fn track(&self) -> Option<&TrackInfo> {
        self.track.as_ref()
    }

    /// Apply one event. `nonce` cache-busts a freshly loaded stream URL.
    pub fn apply(&mut self, event: PlayerEvent, nonce: u32) -> Vec<PlayerEffect> {
        match event {
            PlayerEvent::CurrentTrack(track) => {
                self.track = track;
                Vec::new()
            }
            PlayerEvent::Start(track) => {
                if track.is_some() {
                    self.track = track;
                }
                self.server_playing = true;
                self.progress = Progress::default();
                self.state = if self.local_intent {
                    PlayerState::LocallyPlaying
                } else {
                    PlayerState::ExternallyPlaying
                };
                vec![PlayerEffect::RefreshQueue]
            }
            PlayerEvent::Progress(progress) => {
                self.progress = progress;
                if !self.server_playing {
                    self.server_playing = true;
                    if self.state != PlayerState::LocallyPlaying {
                        self.state = PlayerState::ExternallyPlaying;
                    }
                }
                Vec::new()
            }
            PlayerEvent::End => {
                self.server_playing = false;
                self.local_intent = false;
                self.state = PlayerState::Stopped;
                let mut effects = self.release_source();
                effects.push(PlayerEffect::RefreshQueue);
                effects
            }
            PlayerEvent::Reset | PlayerEvent::NextNone => {
                let mut effects = self.release_source();
                self.state = PlayerState::Idle;
                self.track = None;
                self.progress = Progress::default();
                self.local_intent = false;
                self.server_playing = false;
                effects.push(PlayerEffect::RefreshQueue);
                effects
            }
            PlayerEvent::Update => vec![PlayerEffect::RefreshQueue],
            PlayerEvent::PlayPressed => self.press_play(nonce),
            PlayerEvent::PausePressed => {
                self.local_intent = false;
                if self.state == PlayerState::LocallyPlaying {
                    self.state = PlayerState::Stopped;
                }
                self.release_source()
            }
        }
    }

    fn press_play(&mut self, nonce: u32) -> Vec<PlayerEffect> {
        if self.state == PlayerState::ExternallyPlaying {
            return Vec::new();
        }
        self.local_intent = true;
        self.state = PlayerState::LocallyPlaying;
        if self.source_loaded {
            return Vec::new();
        }
        self.source_loaded = true;
        vec![PlayerEffect::LoadSource(format!(
            "{}?{nonce}",
            self.stream_path
        ))]
    }

    fn release_source(&mut self) -> Vec<PlayerEffect> {
        if self.source_loaded {
            self.source_loaded = false;
            vec![PlayerEffect::UnloadSource]
        } else {
            Vec::new()
        }
    }

    /// Derive the UI state.
    #[must_use]
    pub fn view(&self) -> PlayerView {
        let duration = self.track.as_ref().map_or(0.0, |track| track.duration);
        let audible = (self.progress.elapsed - self.progress.ahead).max(0.0);
        let playing = self.state == PlayerState::LocallyPlaying;
        PlayerView {
            play_visible: !playing,
            pause_visible: playing,
            controls_enabled: self.state != PlayerState::ExternallyPlaying,
            title: self.track.as_ref().map(TrackInfo::label),
            elapsed_label: format_seconds(audible),
            duration_label: format_seconds(duration),
            played_fraction: fraction(audible, duration),
            buffered_fraction: fraction(self.progress.ahead, duration),
        }
    }
}

const fn fraction(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 || !part.is_finite() {
        return 0.0;
    }
    (part / whole).clamp(0.0, 1.0)
}

/// Form body posting a full queue ordering to [`QUEUE_UPDATE_PATH`].
#[must_use]
pub fn queue_order_body<S: AsRef<str>>(ids: &[S]) -> String {
    ids.iter()
        .map(|id| format!("ids%5B%5D={}", urlencoding::encode(id.as_ref())))
        .collect::<Vec<_>>()
        .join("&")
}

/// Format seconds as `m:ss` (or `h:mm:ss` past an hour).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_seconds(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track() -> TrackInfo {
        TrackInfo {
            artist: Some("Nick Drake".into()),
            album: Some("Pink Moon".into()),
            title: "Place To Be".into(),
            duration: 163.0,
        }
    }

    #[test]
    fn bus_events_are_decoded() {
        let start = PlayerEvent::from_bus(
            "queue.start",
            &[json!({"title": "Road", "duration": 120}), json!("agentA")],
        );
        assert_eq!(
            start,
            Some(PlayerEvent::Start(Some(TrackInfo {
                title: "Road".into(),
                duration: 120.0,
                ..TrackInfo::default()
            })))
        );
        assert_eq!(
            PlayerEvent::from_bus("queue.current_track", &[Value::Null]),
            Some(PlayerEvent::CurrentTrack(None))
        );
        assert_eq!(
            PlayerEvent::from_bus("queue.progress", &[json!({"elapsed": 30, "ahead": 5})]),
            Some(PlayerEvent::Progress(Progress {
                elapsed: 30.0,
                ahead: 5.0
            }))
        );
        assert_eq!(
            PlayerEvent::from_bus("queue.end", &[json!({"title": "Road"}), json!("agentA")]),
            Some(PlayerEvent::End)
        );
        assert_eq!(PlayerEvent::from_bus("covers.album.update", &[]), None);
    }

    #[test]
    fn play_loads_source_once_per_session() {
        let mut player = QueuePlayer::new("/play/stream");
        assert_eq!(
            player.apply(PlayerEvent::PlayPressed, 42),
            vec![PlayerEffect::LoadSource("/play/stream?42".into())]
        );
        assert!(player.apply(PlayerEvent::PlayPressed, 43).is_empty());
        assert_eq!(player.state(), PlayerState::LocallyPlaying);
        assert_eq!(
            player.apply(PlayerEvent::PausePressed, 0),
            vec![PlayerEffect::UnloadSource]
        );
        assert_eq!(
            player.apply(PlayerEvent::PlayPressed, 44),
            vec![PlayerEffect::LoadSource("/play/stream?44".into())]
        );
    }

    #[test]
    fn other_consumer_disables_controls() {
        let mut player = QueuePlayer::new("/play/stream");
        player.apply(
            PlayerEvent::Start(Some(track())),
            0,
        );
        assert_eq!(player.state(), PlayerState::ExternallyPlaying);
        assert!(!player.view().controls_enabled);
        assert!(player.apply(PlayerEvent::PlayPressed, 1).is_empty());
    }

    #[test]
    fn local_start_keeps_controls() {
        let mut player = QueuePlayer::new("/play/stream");
        player.apply(PlayerEvent::PlayPressed, 1);
        player.apply(
            PlayerEvent::Start(Some(track())),
            0,
        );
        let view = player.view();
        assert_eq!(player.state(), PlayerState::LocallyPlaying);
        assert!(view.controls_enabled);
        assert!(view.pause_visible);
        assert!(!view.play_visible);
        assert_eq!(view.title.as_deref(), Some("Nick Drake - Place To Be"));
    }

    #[test]
    fn progress_subtracts_read_ahead() {
        let mut player = QueuePlayer::new("/play/stream");
        player.apply(PlayerEvent::CurrentTrack(Some(track())), 0);
        player.apply(
            PlayerEvent::Progress(Progress {
                elapsed: 70.0,
                ahead: 10.0,
            }),
            0,
        );
        let view = player.view();
        assert_eq!(view.elapsed_label, "1:00");
        assert_eq!(view.duration_label, "2:43");
        assert!((view.played_fraction - 60.0 / 163.0).abs() < 1e-9);
        assert!((view.buffered_fraction - 10.0 / 163.0).abs() < 1e-9);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut player = QueuePlayer::new("/play/stream");
        player.apply(PlayerEvent::PlayPressed, 1);
        let effects = player.apply(PlayerEvent::NextNone, 0);
        assert_eq!(
            effects,
            vec![PlayerEffect::UnloadSource, PlayerEffect::RefreshQueue]
        );
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(player.track().is_none());
    }

    #[test]
    fn queue_order_keeps_every_id_in_order() {
        assert_eq!(
            queue_order_body(&["b2", "a 1"]),
            "ids%5B%5D=b2&ids%5B%5D=a%201"
        );
        assert_eq!(queue_order_body::<&str>(&[]), "");
    }

    #[test]
    fn seconds_formatting() {
        assert_eq!(format_seconds(0.0), "0:00");
        assert_eq!(format_seconds(59.9), "0:59");
        assert_eq!(format_seconds(3_725.0), "1:02:05");
        assert_eq!(format_seconds(f64::NAN), "0:00");
    }
}

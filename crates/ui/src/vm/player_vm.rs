use dioxus::prelude::Key;
use lesson_core::model::{
    Bookmark, BookmarkId, LessonTarget, MediaCommand, MediaFault, MediaFaultKind, PlayerSettings,
    format_timestamp,
};
use serde::Deserialize;
use services::{BookmarkCall, BookmarkChange, PlayerSnapshot, ProgressTracker, TrackerError};

/// Rates offered by the `<` / `>` shortcuts and the rate button.
pub const PLAYBACK_RATES: [f64; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

/// Event posted by the `<video>` bridge script.
///
/// Unknown durations (`NaN`, `Infinity`) arrive as `null`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaSignal {
    LoadedMetadata {
        duration: Option<f64>,
    },
    TimeUpdate {
        current_time: f64,
    },
    Play,
    Pause,
    Seeked,
    Ended,
    Error {
        code: u16,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerIntent {
    Media(MediaSignal),
    TogglePlay,
    SeekTo(f64),
    SeekBy(f64),
    SeekToPercent(u8),
    SetVolume(f64),
    ChangeVolume(f64),
    ToggleMute,
    RateUp,
    RateDown,
    AddBookmark { title: Option<String> },
    RemoveBookmark(BookmarkId),
    JumpToBookmark(BookmarkId),
    RetryMedia,
    /// The store accepted a bookmark change started by an earlier intent.
    BookmarkSettled(BookmarkChange),
    /// A bookmark change was rejected; carries the notice to show.
    BookmarkFailed(String),
}

impl PlayerIntent {
    #[must_use]
    pub fn is_bookmark_action(&self) -> bool {
        matches!(
            self,
            Self::AddBookmark { .. }
                | Self::RemoveBookmark(_)
                | Self::BookmarkSettled(_)
                | Self::BookmarkFailed(_)
        )
    }
}

/// Map a key press to a player intent.
#[must_use]
pub fn shortcut_for(key: &Key, settings: &PlayerSettings) -> Option<PlayerIntent> {
    let step = settings.seek_step_secs();
    let volume = settings.volume_step();
    match key {
        Key::ArrowLeft => Some(PlayerIntent::SeekBy(-step)),
        Key::ArrowRight => Some(PlayerIntent::SeekBy(step)),
        Key::ArrowUp => Some(PlayerIntent::ChangeVolume(volume)),
        Key::ArrowDown => Some(PlayerIntent::ChangeVolume(-volume)),
        Key::Character(value) => match value.as_str() {
            " " | "k" | "K" => Some(PlayerIntent::TogglePlay),
            "j" | "J" => Some(PlayerIntent::SeekBy(-step)),
            "l" | "L" => Some(PlayerIntent::SeekBy(step)),
            "m" | "M" => Some(PlayerIntent::ToggleMute),
            "b" | "B" => Some(PlayerIntent::AddBookmark { title: None }),
            "<" => Some(PlayerIntent::RateDown),
            ">" => Some(PlayerIntent::RateUp),
            other => digit_percent(other).map(PlayerIntent::SeekToPercent),
        },
        _ => None,
    }
}

fn digit_percent(value: &str) -> Option<u8> {
    let mut chars = value.chars();
    let digit = chars.next()?.to_digit(10)?;
    if chars.next().is_some() {
        return None;
    }
    u8::try_from(digit * 10).ok()
}

/// Next rate in [`PLAYBACK_RATES`] above (`faster`) or below the current one.
/// Stays at the end of the list when there is nothing further.
#[must_use]
pub fn next_rate(current: f64, faster: bool) -> f64 {
    const EPS: f64 = 1e-6;
    if faster {
        PLAYBACK_RATES
            .iter()
            .copied()
            .find(|rate| *rate > current + EPS)
            .unwrap_or(PLAYBACK_RATES[PLAYBACK_RATES.len() - 1])
    } else {
        PLAYBACK_RATES
            .iter()
            .rev()
            .copied()
            .find(|rate| *rate < current - EPS)
            .unwrap_or(PLAYBACK_RATES[0])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SeekMarker {
    pub id: BookmarkId,
    pub title: String,
    pub label: String,
    /// Horizontal position on the seek bar, in percent.
    pub offset_percent: f64,
}

/// Markers for the seek bar in chronological order. Empty until the duration is known.
#[must_use]
pub fn seek_markers(bookmarks: &[Bookmark], duration_seconds: f64) -> Vec<SeekMarker> {
    if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
        return Vec::new();
    }
    let mut markers: Vec<SeekMarker> = bookmarks
        .iter()
        .map(|bookmark| SeekMarker {
            id: bookmark.id(),
            title: bookmark.title().to_string(),
            label: bookmark.timestamp_label(),
            offset_percent: (100.0 * bookmark.time_seconds() / duration_seconds).clamp(0.0, 100.0),
        })
        .collect();
    markers.sort_by(|a, b| a.offset_percent.total_cmp(&b.offset_percent));
    markers
}

/// Idle tracking for auto-hiding the player controls.
///
/// Every activity bumps the generation; a hide request only applies if no
/// activity happened since it was scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlsTimer {
    generation: u64,
    hidden: bool,
}

impl ControlsTimer {
    /// Show the controls and return the generation to pass to [`Self::expire`].
    pub fn touch(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.hidden = false;
        self.generation
    }

    pub fn expire(&mut self, generation: u64, playing: bool) {
        if generation == self.generation && playing {
            self.hidden = true;
        }
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

/// Controls stay visible while paused, idle or faulted.
#[must_use]
pub fn controls_visible(timer: &ControlsTimer, snapshot: &PlayerSnapshot) -> bool {
    !timer.is_hidden() || !snapshot.is_playing || snapshot.fault.is_some()
}

/// Display strings derived from a tracker snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerDisplayVm {
    pub status: &'static str,
    pub time_label: String,
    pub percentage: u8,
    pub play_label: &'static str,
    pub mute_label: &'static str,
    pub volume_percent: u8,
    pub rate_label: String,
    pub completed: bool,
    pub markers: Vec<SeekMarker>,
    pub fault_message: Option<String>,
}

impl From<&PlayerSnapshot> for PlayerDisplayVm {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(snapshot: &PlayerSnapshot) -> Self {
        let fault_message = snapshot.fault.as_ref().map(|fault| match fault.detail() {
            Some(detail) => format!("{} ({detail})", fault.message()),
            None => fault.message().to_string(),
        });
        Self {
            status: snapshot.state.label(),
            time_label: format!(
                "{} / {}",
                format_timestamp(snapshot.current_time_seconds),
                format_timestamp(snapshot.duration_seconds)
            ),
            percentage: snapshot.percentage,
            play_label: if snapshot.is_playing { "Pause" } else { "Play" },
            mute_label: if snapshot.muted { "Unmute" } else { "Mute" },
            volume_percent: (snapshot.volume.clamp(0.0, 1.0) * 100.0).round() as u8,
            rate_label: format!("{}x", snapshot.playback_rate),
            completed: snapshot.completed,
            markers: seek_markers(&snapshot.bookmarks, snapshot.duration_seconds),
            fault_message,
        }
    }
}

/// What the view has to do after an intent.
///
/// A `bookmark_call` must be run off the event loop with
/// [`PlayerVm::settle_bookmark`] and its result dispatched back.
#[derive(Default)]
pub struct PlayerOutcome {
    pub commands: Vec<MediaCommand>,
    pub notice: Option<String>,
    pub bookmark_call: Option<BookmarkCall>,
}

fn bookmark_notice(err: &TrackerError, removing: bool) -> String {
    let message = match (err.is_unauthorized(), removing) {
        (true, true) => "You can only remove your own bookmarks.",
        (true, false) => "You are not allowed to bookmark this lesson.",
        (false, true) => "Bookmark could not be removed. Please try again.",
        (false, false) => "Bookmark could not be saved. Please try again.",
    };
    message.to_string()
}

/// Owns the lesson tracker inside the player view.
pub struct PlayerVm {
    tracker: ProgressTracker,
}

impl PlayerVm {
    #[must_use]
    pub fn new(tracker: ProgressTracker) -> Self {
        Self { tracker }
    }

    pub async fn load(&mut self, target: &LessonTarget) {
        self.tracker
            .initialize(target.lesson_id, target.course_id, target.start_time_seconds)
            .await;
    }

    #[must_use]
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.tracker.snapshot()
    }

    pub async fn shutdown(self) {
        self.tracker.shutdown().await;
    }

    /// Run a bookmark store call and turn its result into the intent that
    /// applies it.
    pub async fn settle_bookmark(call: BookmarkCall) -> PlayerIntent {
        let removing = call.is_delete();
        match call.run().await {
            Ok(change) => PlayerIntent::BookmarkSettled(change),
            Err(err) => PlayerIntent::BookmarkFailed(bookmark_notice(&err, removing)),
        }
    }

    pub fn dispatch(&mut self, intent: PlayerIntent) -> PlayerOutcome {
        let tracker = &mut self.tracker;
        let mut outcome = PlayerOutcome::default();
        match intent {
            PlayerIntent::Media(signal) => match signal {
                MediaSignal::LoadedMetadata { duration } => {
                    outcome.commands = tracker.on_metadata_loaded(duration);
                }
                MediaSignal::TimeUpdate { current_time } => tracker.on_time_update(current_time),
                MediaSignal::Play => tracker.on_play(),
                MediaSignal::Pause => tracker.on_pause(),
                MediaSignal::Seeked => tracker.on_seeked(),
                MediaSignal::Ended => tracker.on_ended(),
                MediaSignal::Error { code, message } => {
                    tracker.on_media_error(MediaFault::new(MediaFaultKind::from_code(code), message));
                }
            },
            PlayerIntent::TogglePlay => outcome.commands.push(tracker.toggle_playback()),
            PlayerIntent::SeekTo(seconds) => outcome.commands.push(tracker.seek(seconds)),
            PlayerIntent::SeekBy(delta) => outcome.commands.push(tracker.seek_by(delta)),
            PlayerIntent::SeekToPercent(percent) => {
                outcome.commands.push(tracker.seek_to_percent(percent));
            }
            PlayerIntent::SetVolume(volume) => outcome.commands.push(tracker.set_volume(volume)),
            PlayerIntent::ChangeVolume(delta) => {
                outcome.commands.push(tracker.change_volume(delta));
            }
            PlayerIntent::ToggleMute => outcome.commands.push(tracker.toggle_mute()),
            PlayerIntent::RateUp => {
                let rate = next_rate(tracker.session().playback_rate(), true);
                outcome.commands.push(tracker.set_playback_rate(rate));
            }
            PlayerIntent::RateDown => {
                let rate = next_rate(tracker.session().playback_rate(), false);
                outcome.commands.push(tracker.set_playback_rate(rate));
            }
            PlayerIntent::AddBookmark { title } => {
                let at = tracker.session().current_time_seconds();
                match tracker.begin_add_bookmark(at, title) {
                    Ok(call) => outcome.bookmark_call = Some(call.into()),
                    Err(err) => outcome.notice = Some(bookmark_notice(&err, false)),
                }
            }
            PlayerIntent::RemoveBookmark(id) => match tracker.begin_remove_bookmark(id) {
                Ok(call) => outcome.bookmark_call = Some(call.into()),
                Err(err) => outcome.notice = Some(bookmark_notice(&err, true)),
            },
            PlayerIntent::BookmarkSettled(change) => tracker.apply_bookmark_change(change),
            PlayerIntent::BookmarkFailed(notice) => outcome.notice = Some(notice),
            PlayerIntent::JumpToBookmark(id) => {
                if let Ok(command) = tracker.jump_to_bookmark(id) {
                    outcome.commands.push(command);
                }
            }
            PlayerIntent::RetryMedia => outcome.commands.extend(tracker.retry_media()),
        }
        outcome
    }
}

use std::sync::Arc;

use lesson_core::Clock;
use lesson_core::model::{
    Bookmark, BookmarkId, CourseId, LessonId, MediaCommand, MediaFault, NewBookmark,
    PlaybackSession, PlayerSettings, ProgressRecord, UserId, clamp_position,
};
use storage::repository::ProgressStore;

use super::bookmarks::{BookmarkChange, CreateBookmark, DeleteBookmark};
use super::persist::ProgressWriter;
use super::state::{Activity, TrackerState};
use crate::error::TrackerError;

/// Position jumps larger than this between two time updates are seeks, not watching.
const MAX_WATCH_DELTA_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LessonKey {
    lesson_id: LessonId,
    course_id: CourseId,
}

/// Read-only copy of the tracker state for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub state: TrackerState,
    pub lesson_id: Option<LessonId>,
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    pub percentage: u8,
    pub is_playing: bool,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub completed: bool,
    pub total_watch_time_seconds: f64,
    pub bookmarks: Vec<Bookmark>,
    pub fault: Option<MediaFault>,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        let session = PlaybackSession::new();
        Self {
            state: TrackerState::Uninitialized,
            lesson_id: None,
            current_time_seconds: session.current_time_seconds(),
            duration_seconds: session.duration_seconds(),
            percentage: session.percentage(),
            is_playing: session.is_playing(),
            volume: session.volume(),
            muted: session.muted(),
            playback_rate: session.playback_rate(),
            completed: false,
            total_watch_time_seconds: 0.0,
            bookmarks: Vec::new(),
            fault: None,
        }
    }
}

/// Tracks playback of one lesson for one user and persists it.
///
/// Media element events come in through the `on_*` methods. User actions that
/// must move the media element return a [`MediaCommand`] for the view to apply.
/// Position writes are throttled by `throttle_interval_secs`, debounced by
/// `debounce_ms`, and go through a single ordered queue; the end-of-lesson
/// write bypasses both.
///
/// Remote failures while loading or persisting progress are logged and never
/// interrupt playback. Bookmark failures are logged and returned.
pub struct ProgressTracker {
    store: Arc<dyn ProgressStore>,
    user_id: UserId,
    settings: PlayerSettings,
    clock: Clock,
    lesson: Option<LessonKey>,
    state: TrackerState,
    session: PlaybackSession,
    bookmarks: Vec<Bookmark>,
    watch_time_seconds: f64,
    completed: bool,
    resume_from: Option<f64>,
    start_baseline: f64,
    play_on_load: bool,
    resume_playing: bool,
    fault: Option<MediaFault>,
    writer: Option<ProgressWriter>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        store: Arc<dyn ProgressStore>,
        user_id: UserId,
        settings: PlayerSettings,
        clock: Clock,
    ) -> Self {
        let play_on_load = settings.autoplay();
        Self {
            store,
            user_id,
            settings,
            clock,
            lesson: None,
            state: TrackerState::Uninitialized,
            session: PlaybackSession::new(),
            bookmarks: Vec::new(),
            watch_time_seconds: 0.0,
            completed: false,
            resume_from: None,
            start_baseline: 0.0,
            play_on_load,
            resume_playing: false,
            fault: None,
            writer: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TrackerState {
        self.state
    }

    #[must_use]
    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    #[must_use]
    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Bookmarks of the current lesson, ascending by time.
    #[must_use]
    pub fn bookmarks(&self) -> &[Bookmark] {
        &self.bookmarks
    }

    #[must_use]
    pub fn fault(&self) -> Option<&MediaFault> {
        self.fault.as_ref()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn total_watch_time_seconds(&self) -> f64 {
        self.watch_time_seconds
    }

    /// Position the tracker will seek to once the duration is known.
    #[must_use]
    pub fn pending_resume(&self) -> Option<f64> {
        self.resume_from
    }

    #[must_use]
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            lesson_id: self.lesson.map(|lesson| lesson.lesson_id),
            current_time_seconds: self.session.current_time_seconds(),
            duration_seconds: self.session.duration_seconds(),
            percentage: self.session.percentage(),
            is_playing: self.session.is_playing(),
            volume: self.session.volume(),
            muted: self.session.muted(),
            playback_rate: self.session.playback_rate(),
            completed: self.completed,
            total_watch_time_seconds: self.watch_time_seconds,
            bookmarks: self.bookmarks.clone(),
            fault: self.fault.clone(),
        }
    }

    /// Load saved progress and bookmarks, then become ready.
    ///
    /// With a saved record the session resumes at `start_time_seconds`, or at
    /// the saved position when no start time is given. Without one it starts at
    /// zero. Load failures are logged and the session starts fresh.
    #[tracing::instrument(level = "debug", skip(self), fields(user_id = %self.user_id))]
    pub async fn initialize(
        &mut self,
        lesson_id: LessonId,
        course_id: CourseId,
        start_time_seconds: Option<f64>,
    ) {
        self.writer = None;
        self.state = TrackerState::Loading;
        self.lesson = Some(LessonKey {
            lesson_id,
            course_id,
        });
        self.session = PlaybackSession::new();
        self.bookmarks.clear();
        self.watch_time_seconds = 0.0;
        self.completed = false;
        self.resume_from = None;
        self.play_on_load = self.settings.autoplay();
        self.resume_playing = false;
        self.fault = None;

        match self.store.load_progress(self.user_id, lesson_id).await {
            Ok(Some(record)) => {
                let start = start_time_seconds.unwrap_or(record.current_time_seconds);
                self.resume_from = Some(start).filter(|s| s.is_finite() && *s > 0.0);
                self.completed = record.completed;
                self.watch_time_seconds = record.total_watch_time_seconds.max(0.0);
                tracing::info!(
                    lesson_id = %lesson_id,
                    resume_from = self.resume_from.unwrap_or(0.0),
                    completed = record.completed,
                    "loaded saved progress"
                );
            }
            Ok(None) => tracing::debug!(lesson_id = %lesson_id, "no saved progress"),
            Err(err) => {
                tracing::warn!(
                    lesson_id = %lesson_id,
                    error = %err,
                    "failed to load saved progress; starting fresh"
                );
            }
        }
        self.start_baseline = self.resume_from.unwrap_or(0.0);
        self.session.set_last_persisted_time(self.start_baseline);

        match self.store.load_bookmarks(self.user_id, lesson_id).await {
            Ok(mut bookmarks) => {
                bookmarks.sort_by(|a, b| a.time_seconds().total_cmp(&b.time_seconds()));
                self.bookmarks = bookmarks;
            }
            Err(err) => {
                tracing::warn!(lesson_id = %lesson_id, error = %err, "failed to load bookmarks");
            }
        }

        self.writer = Some(ProgressWriter::new(
            Arc::clone(&self.store),
            self.settings.debounce(),
        ));
        self.state = TrackerState::Ready(Activity::Idle);
    }

    /// Record the media duration. Returns the commands needed to restore the
    /// resume position, presentation state and autoplay.
    pub fn on_metadata_loaded(&mut self, duration_seconds: Option<f64>) -> Vec<MediaCommand> {
        self.session.set_duration(duration_seconds.unwrap_or(0.0));
        let mut commands = Vec::new();

        if self.session.has_duration() {
            if let Some(resume) = self.resume_from.take() {
                if resume < self.session.duration_seconds() {
                    let seconds = self.session.set_current_time(resume);
                    commands.push(MediaCommand::Seek { seconds });
                }
            }
        }
        if self.session.muted() || self.session.volume() < 1.0 {
            commands.push(self.volume_command());
        }
        if (self.session.playback_rate() - 1.0).abs() > f64::EPSILON {
            commands.push(MediaCommand::SetRate {
                rate: self.session.playback_rate(),
            });
        }
        if std::mem::take(&mut self.play_on_load) {
            commands.push(MediaCommand::Play);
        }
        commands
    }

    pub fn on_time_update(&mut self, seconds: f64) {
        let previous = self.session.current_time_seconds();
        let current = self.session.set_current_time(seconds);
        if self.session.is_playing() && !self.state.is_seeking() {
            let delta = current - previous;
            if delta > 0.0 && delta <= MAX_WATCH_DELTA_SECS {
                self.watch_time_seconds += delta;
            }
        }
        self.persist_if_due();
    }

    /// Persist completion right away. Any write still in flight finishes
    /// first; nothing older can be stored after this one.
    pub fn on_ended(&mut self) {
        self.session.mark_finished();
        self.completed = true;
        if self.state.is_ready() {
            self.state = TrackerState::Completed;
        }
        let Some(record) = self.record() else {
            tracing::warn!("playback ended before a lesson was loaded");
            return;
        };
        tracing::info!(lesson_id = %record.lesson_id, "lesson completed");
        if let Some(writer) = self.writer.as_mut() {
            writer.persist_now(record);
        }
        self.session
            .set_last_persisted_time(self.session.current_time_seconds());
    }

    pub fn on_play(&mut self) {
        self.session.set_playing(true);
        if self.state.is_ready() {
            self.state = TrackerState::Ready(Activity::Playing);
        }
    }

    pub fn on_pause(&mut self) {
        self.session.set_playing(false);
        if let TrackerState::Ready(activity) = self.state {
            if activity != Activity::Seeking {
                self.state = TrackerState::Ready(Activity::Paused);
            }
        }
    }

    pub fn on_seeked(&mut self) {
        if self.state.is_seeking() {
            self.state = TrackerState::Ready(if self.session.is_playing() {
                Activity::Playing
            } else {
                Activity::Paused
            });
        }
    }

    /// Move to `target_seconds`, clamped into `[0, duration]`.
    ///
    /// The visible position changes immediately; no write is forced.
    pub fn seek(&mut self, target_seconds: f64) -> MediaCommand {
        let seconds = self.session.set_current_time(target_seconds);
        if seconds < self.session.last_persisted_time_seconds() {
            self.session.set_last_persisted_time(seconds);
        }
        if self.state.is_ready() {
            self.state = TrackerState::Ready(Activity::Seeking);
        }
        if let (Some(record), Some(writer)) = (self.record(), self.writer.as_ref()) {
            writer.stage(record);
        }
        MediaCommand::Seek { seconds }
    }

    pub fn seek_by(&mut self, delta_seconds: f64) -> MediaCommand {
        self.seek(self.session.current_time_seconds() + delta_seconds)
    }

    /// Seek to a share of the duration, `percent` in `0..=100`.
    pub fn seek_to_percent(&mut self, percent: u8) -> MediaCommand {
        let fraction = f64::from(percent.min(100)) / 100.0;
        self.seek(self.session.duration_seconds() * fraction)
    }

    #[must_use]
    pub fn toggle_playback(&self) -> MediaCommand {
        if self.session.is_playing() {
            MediaCommand::Pause
        } else {
            MediaCommand::Play
        }
    }

    pub fn set_volume(&mut self, volume: f64) -> MediaCommand {
        self.session.set_volume(volume);
        self.volume_command()
    }

    pub fn change_volume(&mut self, delta: f64) -> MediaCommand {
        self.set_volume(self.session.volume() + delta)
    }

    pub fn toggle_mute(&mut self) -> MediaCommand {
        self.session.toggle_mute();
        self.volume_command()
    }

    pub fn set_playback_rate(&mut self, rate: f64) -> MediaCommand {
        let rate = self.session.set_playback_rate(rate);
        MediaCommand::SetRate { rate }
    }

    /// Create a bookmark at `at_seconds` (clamped to the lesson) and insert it
    /// in time order. Without a title the `M:SS` timestamp is used.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::NotInitialized` before `initialize`, a bookmark
    /// validation error, or the storage error; the local list is unchanged on error.
    pub async fn add_bookmark(
        &mut self,
        at_seconds: f64,
        title: Option<String>,
    ) -> Result<Bookmark, TrackerError> {
        let created = self.begin_add_bookmark(at_seconds, title)?.run().await?;
        self.apply_bookmark_change(BookmarkChange::Created(created.clone()));
        Ok(created)
    }

    /// Delete a bookmark of this lesson. Ownership is checked by the store.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::BookmarkNotFound` for ids not in the local list and
    /// the storage error when the delete is rejected; the bookmark stays listed.
    pub async fn remove_bookmark(&mut self, bookmark_id: BookmarkId) -> Result<(), TrackerError> {
        let removed = self.begin_remove_bookmark(bookmark_id)?.run().await?;
        self.apply_bookmark_change(BookmarkChange::Removed(removed));
        Ok(())
    }

    /// Validate a new bookmark and return the store call that creates it.
    ///
    /// The call does not borrow the tracker, so the caller can run it off the
    /// event loop and hand the result to [`Self::apply_bookmark_change`].
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::NotInitialized` before `initialize` or a bookmark
    /// validation error.
    pub fn begin_add_bookmark(
        &self,
        at_seconds: f64,
        title: Option<String>,
    ) -> Result<CreateBookmark, TrackerError> {
        let lesson = self.lesson.ok_or(TrackerError::NotInitialized)?;
        let seconds = clamp_position(at_seconds, self.session.duration_seconds());
        let draft = NewBookmark::new(
            self.user_id,
            lesson.lesson_id,
            seconds,
            title,
            self.clock.now(),
        )?;
        Ok(CreateBookmark {
            store: Arc::clone(&self.store),
            draft,
        })
    }

    /// # Errors
    ///
    /// Returns `TrackerError::BookmarkNotFound` for ids not in the local list.
    pub fn begin_remove_bookmark(
        &self,
        bookmark_id: BookmarkId,
    ) -> Result<DeleteBookmark, TrackerError> {
        if !self.bookmarks.iter().any(|b| b.id() == bookmark_id) {
            return Err(TrackerError::BookmarkNotFound(bookmark_id));
        }
        Ok(DeleteBookmark {
            store: Arc::clone(&self.store),
            user_id: self.user_id,
            bookmark_id,
        })
    }

    /// Apply a bookmark change the store accepted. Bookmarks of another lesson
    /// and ids no longer listed are ignored.
    pub fn apply_bookmark_change(&mut self, change: BookmarkChange) {
        match change {
            BookmarkChange::Created(bookmark) => {
                let current = self.lesson.map(|lesson| lesson.lesson_id);
                if current != Some(bookmark.lesson_id()) {
                    tracing::debug!(bookmark_id = %bookmark.id(), "bookmark for another lesson ignored");
                    return;
                }
                let index = self
                    .bookmarks
                    .partition_point(|b| b.time_seconds() <= bookmark.time_seconds());
                self.bookmarks.insert(index, bookmark);
            }
            BookmarkChange::Removed(bookmark_id) => {
                self.bookmarks.retain(|b| b.id() != bookmark_id);
            }
        }
    }

    /// # Errors
    ///
    /// Returns `TrackerError::BookmarkNotFound` if the id is not listed.
    pub fn jump_to_bookmark(&mut self, bookmark_id: BookmarkId) -> Result<MediaCommand, TrackerError> {
        let seconds = self
            .bookmarks
            .iter()
            .find(|b| b.id() == bookmark_id)
            .map(Bookmark::time_seconds)
            .ok_or(TrackerError::BookmarkNotFound(bookmark_id))?;
        Ok(self.seek(seconds))
    }

    pub fn on_media_error(&mut self, fault: MediaFault) {
        tracing::warn!(kind = ?fault.kind(), detail = fault.detail().unwrap_or(""), "media error");
        self.resume_playing = self.session.is_playing();
        self.session.set_playing(false);
        if let TrackerState::Ready(Activity::Playing) = self.state {
            self.state = TrackerState::Ready(Activity::Paused);
        }
        self.fault = Some(fault);
    }

    /// Clear the current fault and ask the view to reload the source. The
    /// position is restored (and playback resumed) on the next metadata load.
    pub fn retry_media(&mut self) -> Option<MediaCommand> {
        self.fault.take()?;
        let position = self.session.current_time_seconds();
        self.resume_from = Some(position).filter(|s| *s > 0.0);
        self.play_on_load = self.resume_playing || self.settings.autoplay();
        tracing::info!(resume_from = position, "retrying media");
        Some(MediaCommand::Reload)
    }

    /// Cancel any pending write timer and wait for queued writes to finish.
    ///
    /// Dropping the tracker cancels the timer too, but leaves queued writes to
    /// finish in the background.
    pub async fn shutdown(mut self) {
        if let Some(writer) = self.writer.take() {
            let ack = writer.shutdown().await;
            tracing::debug!(writes = ack.writes, failures = ack.failures, "progress writer drained");
        }
    }

    fn volume_command(&self) -> MediaCommand {
        MediaCommand::SetVolume {
            volume: self.session.volume(),
            muted: self.session.muted(),
        }
    }

    fn record(&self) -> Option<ProgressRecord> {
        let lesson = self.lesson?;
        Some(ProgressRecord {
            current_time_seconds: self.session.current_time_seconds(),
            progress_percentage: self.session.percentage(),
            total_watch_time_seconds: self.watch_time_seconds,
            completed: self.completed,
            ..ProgressRecord::started(
                self.user_id,
                lesson.lesson_id,
                lesson.course_id,
                self.clock.now(),
            )
        })
    }

    fn persist_if_due(&mut self) {
        let Some(record) = self.record() else {
            return;
        };
        let throttle = self.settings.throttle_interval_secs();
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let current = self.session.current_time_seconds();

        if writer.take_failure() {
            // Pull the baseline back far enough that this update qualifies again.
            let baseline = writer
                .last_persisted()
                .unwrap_or(self.start_baseline)
                .min(current - throttle);
            self.session.set_last_persisted_time(baseline);
            tracing::debug!(baseline, "throttle baseline rolled back after failed write");
        }

        writer.stage(record);
        if !self.session.has_duration() {
            return;
        }
        if current - self.session.last_persisted_time_seconds() >= throttle {
            if writer.schedule() {
                tracing::debug!(seconds = current, "progress write scheduled");
            }
            self.session.set_last_persisted_time(current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::time::fixed_clock;
    use storage::repository::InMemoryProgressStore;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(
            Arc::new(InMemoryProgressStore::new()),
            UserId::random(),
            PlayerSettings::default(),
            fixed_clock(),
        )
    }

    #[test]
    fn seek_clamps_into_duration() {
        let mut tracker = tracker();
        tracker.on_metadata_loaded(Some(120.0));

        for (target, expected) in [(0.0, 0.0), (42.5, 42.5), (120.0, 120.0), (500.0, 120.0), (-3.0, 0.0)] {
            assert_eq!(tracker.seek(target), MediaCommand::Seek { seconds: expected });
            assert_eq!(tracker.session().current_time_seconds(), expected);
        }
    }

    #[test]
    fn percentage_is_zero_until_duration_is_known() {
        let mut tracker = tracker();
        tracker.on_time_update(30.0);
        assert_eq!(tracker.snapshot().percentage, 0);

        tracker.on_metadata_loaded(Some(0.0));
        tracker.on_time_update(30.0);
        assert_eq!(tracker.snapshot().percentage, 0);

        tracker.on_metadata_loaded(Some(60.0));
        tracker.on_time_update(30.0);
        assert_eq!(tracker.snapshot().percentage, 50);
    }

    #[test]
    fn watch_time_ignores_jumps_and_paused_updates() {
        let mut tracker = tracker();
        tracker.on_metadata_loaded(Some(600.0));
        tracker.on_play();
        tracker.on_time_update(1.0);
        tracker.on_time_update(2.0);
        tracker.on_time_update(200.0);
        tracker.on_time_update(201.0);
        tracker.on_pause();
        tracker.on_time_update(202.0);

        assert!((tracker.total_watch_time_seconds() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn presentation_commands_follow_session() {
        let mut tracker = tracker();
        assert_eq!(
            tracker.set_volume(1.7),
            MediaCommand::SetVolume {
                volume: 1.0,
                muted: false
            }
        );
        assert_eq!(
            tracker.toggle_mute(),
            MediaCommand::SetVolume {
                volume: 1.0,
                muted: true
            }
        );
        assert_eq!(
            tracker.set_playback_rate(9.0),
            MediaCommand::SetRate { rate: 4.0 }
        );
        assert_eq!(tracker.toggle_playback(), MediaCommand::Play);
        tracker.on_play();
        assert_eq!(tracker.toggle_playback(), MediaCommand::Pause);
    }

    #[test]
    fn media_fault_retry_reloads_and_resumes() {
        let mut tracker = tracker();
        tracker.on_metadata_loaded(Some(300.0));
        tracker.on_play();
        tracker.on_time_update(75.0);

        let fault = MediaFault::new(lesson_core::model::MediaFaultKind::Network, None);
        tracker.on_media_error(fault.clone());
        assert_eq!(tracker.fault(), Some(&fault));
        assert!(!tracker.session().is_playing());

        assert_eq!(tracker.retry_media(), Some(MediaCommand::Reload));
        assert_eq!(tracker.retry_media(), None);
        assert_eq!(
            tracker.on_metadata_loaded(Some(300.0)),
            vec![MediaCommand::Seek { seconds: 75.0 }, MediaCommand::Play]
        );
    }

    #[test]
    fn seek_state_returns_to_previous_activity() {
        let mut tracker = tracker();
        tracker.state = TrackerState::Ready(Activity::Idle);
        tracker.on_metadata_loaded(Some(100.0));
        tracker.on_play();
        tracker.seek(50.0);
        assert_eq!(tracker.state(), TrackerState::Ready(Activity::Seeking));
        tracker.on_seeked();
        assert_eq!(tracker.state(), TrackerState::Ready(Activity::Playing));

        tracker.on_pause();
        tracker.seek(10.0);
        tracker.on_seeked();
        assert_eq!(tracker.state(), TrackerState::Ready(Activity::Paused));
    }

    #[tokio::test]
    async fn bookmarks_need_an_initialized_lesson() {
        let mut tracker = tracker();
        let err = tracker.add_bookmark(10.0, None).await.unwrap_err();
        assert!(matches!(err, TrackerError::NotInitialized));
    }

    #[tokio::test]
    async fn bookmark_calls_settle_while_playback_moves_on() {
        let mut tracker = tracker();
        tracker
            .initialize(LessonId::random(), CourseId::random(), None)
            .await;
        tracker.on_metadata_loaded(Some(300.0));
        tracker.on_time_update(40.0);

        let first = tracker.begin_add_bookmark(40.0, None).unwrap();
        tracker.seek(120.0);
        let second = tracker.begin_add_bookmark(120.0, Some("Traits".into())).unwrap();

        let second = second.run().await.unwrap();
        let first = first.run().await.unwrap();
        tracker.apply_bookmark_change(BookmarkChange::Created(second.clone()));
        tracker.apply_bookmark_change(BookmarkChange::Created(first.clone()));
        assert_eq!(tracker.session().current_time_seconds(), 120.0);
        let titles: Vec<&str> = tracker.bookmarks().iter().map(Bookmark::title).collect();
        assert_eq!(titles, vec!["0:40", "Traits"]);

        let removed = tracker.begin_remove_bookmark(first.id()).unwrap().run().await.unwrap();
        tracker.apply_bookmark_change(BookmarkChange::Removed(removed));
        tracker.apply_bookmark_change(BookmarkChange::Removed(removed));
        assert_eq!(tracker.bookmarks(), &[second]);
    }
}

use serde::{Deserialize, Serialize};

/// Slowest playback rate the player accepts.
pub const MIN_PLAYBACK_RATE: f64 = 0.25;
/// Fastest playback rate the player accepts.
pub const MAX_PLAYBACK_RATE: f64 = 4.0;

/// Clamp a position into `[0, duration]`.
///
/// Non-finite input collapses to `0.0`, and so does any position while the
/// duration is still unknown (`0.0`).
#[must_use]
pub fn clamp_position(seconds: f64, duration: f64) -> f64 {
    let duration = sanitize_duration(duration);
    if !seconds.is_finite() {
        return 0.0;
    }
    seconds.clamp(0.0, duration)
}

/// Whole-number percentage of `seconds` within `duration`, clamped to `[0, 100]`.
///
/// Returns `0` while the duration is unknown so callers never divide by zero.
#[must_use]
pub fn percentage_of(seconds: f64, duration: f64) -> u8 {
    let duration = sanitize_duration(duration);
    if duration <= 0.0 || !seconds.is_finite() {
        return 0;
    }
    let ratio = (100.0 * seconds / duration).round().clamp(0.0, 100.0);
    // Clamped to [0, 100] above.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = ratio as u8;
    pct
}

fn sanitize_duration(duration: f64) -> f64 {
    if duration.is_finite() && duration > 0.0 {
        duration
    } else {
        0.0
    }
}

/// Ephemeral playback state owned by a single lesson view.
///
/// Every position write goes through [`PlaybackSession::set_current_time`],
/// which keeps `0 <= current_time_seconds <= duration_seconds` and recomputes
/// the percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    current_time_seconds: f64,
    duration_seconds: f64,
    percentage: u8,
    last_persisted_time_seconds: f64,
    is_playing: bool,
    volume: f64,
    muted: bool,
    playback_rate: f64,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_time_seconds: 0.0,
            duration_seconds: 0.0,
            percentage: 0,
            last_persisted_time_seconds: 0.0,
            is_playing: false,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
        }
    }
}

impl PlaybackSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current_time_seconds(&self) -> f64 {
        self.current_time_seconds
    }

    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Rounded completion percentage in `[0, 100]`.
    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    /// Position the throttle measures progress against.
    #[must_use]
    pub fn last_persisted_time_seconds(&self) -> f64 {
        self.last_persisted_time_seconds
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    #[must_use]
    pub fn volume(&self) -> f64 {
        self.volume
    }

    #[must_use]
    pub fn muted(&self) -> bool {
        self.muted
    }

    #[must_use]
    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    #[must_use]
    pub fn has_duration(&self) -> bool {
        self.duration_seconds > 0.0
    }

    /// Set the media duration. Unknown, negative or non-finite values become `0.0`.
    ///
    /// The current position is re-clamped against the new duration.
    pub fn set_duration(&mut self, seconds: f64) {
        self.duration_seconds = sanitize_duration(seconds);
        self.set_current_time(self.current_time_seconds);
    }

    /// Set the current position, clamped into `[0, duration]`. Returns the stored value.
    pub fn set_current_time(&mut self, seconds: f64) -> f64 {
        self.current_time_seconds = clamp_position(seconds, self.duration_seconds);
        self.percentage = percentage_of(self.current_time_seconds, self.duration_seconds);
        self.current_time_seconds
    }

    /// Force the end-of-lesson state regardless of the known duration.
    pub fn mark_finished(&mut self) {
        self.current_time_seconds = self.duration_seconds;
        self.percentage = 100;
        self.is_playing = false;
    }

    pub fn set_last_persisted_time(&mut self, seconds: f64) {
        if seconds.is_finite() {
            self.last_persisted_time_seconds = seconds.max(0.0);
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.is_playing = playing;
    }

    /// Set the volume, clamped into `[0, 1]`. Non-finite input is ignored.
    pub fn set_volume(&mut self, volume: f64) -> f64 {
        if volume.is_finite() {
            self.volume = volume.clamp(0.0, 1.0);
        }
        self.volume
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// Set the playback rate. Non-positive or non-finite rates are ignored and
    /// the rest are clamped into the supported range.
    pub fn set_playback_rate(&mut self, rate: f64) -> f64 {
        if rate.is_finite() && rate > 0.0 {
            self.playback_rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        }
        self.playback_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_zero_without_duration() {
        assert_eq!(percentage_of(42.0, 0.0), 0);
        assert_eq!(percentage_of(42.0, f64::NAN), 0);
        assert_eq!(percentage_of(42.0, f64::INFINITY), 0);
    }

    #[test]
    fn percentage_rounds_and_clamps() {
        assert_eq!(percentage_of(1.0, 3.0), 33);
        assert_eq!(percentage_of(2.0, 3.0), 67);
        assert_eq!(percentage_of(900.0, 600.0), 100);
        assert_eq!(percentage_of(-5.0, 600.0), 0);
    }

    #[test]
    fn current_time_is_clamped_to_duration() {
        let mut session = PlaybackSession::new();
        session.set_duration(600.0);
        assert_eq!(session.set_current_time(-3.0), 0.0);
        assert_eq!(session.set_current_time(601.0), 600.0);
        assert_eq!(session.percentage(), 100);
        assert_eq!(session.set_current_time(f64::NAN), 0.0);
    }

    #[test]
    fn every_position_in_range_is_kept_exactly() {
        let mut session = PlaybackSession::new();
        session.set_duration(120.0);
        for step in 0..=480 {
            let t = f64::from(step) * 0.25;
            assert_eq!(session.set_current_time(t), t);
            assert!(session.percentage() <= 100);
        }
    }

    #[test]
    fn shrinking_duration_reclamps_position() {
        let mut session = PlaybackSession::new();
        session.set_duration(600.0);
        session.set_current_time(500.0);
        session.set_duration(300.0);
        assert_eq!(session.current_time_seconds(), 300.0);
    }

    #[test]
    fn unknown_duration_pins_position_to_zero() {
        let mut session = PlaybackSession::new();
        assert_eq!(session.set_current_time(12.0), 0.0);
        assert_eq!(session.percentage(), 0);
    }

    #[test]
    fn presentation_state_is_bounded() {
        let mut session = PlaybackSession::new();
        assert_eq!(session.set_volume(1.5), 1.0);
        assert_eq!(session.set_volume(-0.5), 0.0);
        assert_eq!(session.set_volume(f64::NAN), 0.0);
        assert_eq!(session.set_playback_rate(0.0), 1.0);
        assert_eq!(session.set_playback_rate(10.0), MAX_PLAYBACK_RATE);
        assert!(session.toggle_mute());
        assert!(!session.toggle_mute());
    }

    #[test]
    fn mark_finished_reports_full_percentage_even_without_duration() {
        let mut session = PlaybackSession::new();
        session.set_playing(true);
        session.mark_finished();
        assert_eq!(session.percentage(), 100);
        assert!(!session.is_playing());
    }
}

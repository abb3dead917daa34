use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_THROTTLE_INTERVAL_SECS: f64 = 30.0;
pub const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
pub const DEFAULT_CONTROLS_HIDE_AFTER_MS: u64 = 3_000;
pub const DEFAULT_SEEK_STEP_SECS: f64 = 10.0;
pub const DEFAULT_VOLUME_STEP: f64 = 0.1;

/// Tunables for progress persistence and player controls.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSettings {
    throttle_interval_secs: f64,
    debounce_ms: u64,
    controls_hide_after_ms: u64,
    seek_step_secs: f64,
    volume_step: f64,
    autoplay: bool,
}

/// Unvalidated settings, usually assembled from env vars or flags.
#[derive(Clone, Debug, Default)]
pub struct PlayerSettingsDraft {
    pub throttle_interval_secs: Option<f64>,
    pub debounce_ms: Option<u64>,
    pub controls_hide_after_ms: Option<u64>,
    pub seek_step_secs: Option<f64>,
    pub volume_step: Option<f64>,
    pub autoplay: Option<bool>,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("throttle interval must be a positive number of seconds (got {0})")]
    InvalidThrottleInterval(f64),
    #[error("debounce must be at least 1ms")]
    InvalidDebounce,
    #[error("controls hide delay must be at least 1ms")]
    InvalidControlsHideDelay,
    #[error("seek step must be a positive number of seconds (got {0})")]
    InvalidSeekStep(f64),
    #[error("volume step must be within (0, 1] (got {0})")]
    InvalidVolumeStep(f64),
}

impl PlayerSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft, filling unset fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` for zero, negative or non-finite values.
    pub fn validate(self) -> Result<PlayerSettings, SettingsError> {
        let throttle_interval_secs = self
            .throttle_interval_secs
            .unwrap_or(DEFAULT_THROTTLE_INTERVAL_SECS);
        if !throttle_interval_secs.is_finite() || throttle_interval_secs <= 0.0 {
            return Err(SettingsError::InvalidThrottleInterval(throttle_interval_secs));
        }

        let debounce_ms = self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS);
        if debounce_ms == 0 {
            return Err(SettingsError::InvalidDebounce);
        }

        let controls_hide_after_ms = self
            .controls_hide_after_ms
            .unwrap_or(DEFAULT_CONTROLS_HIDE_AFTER_MS);
        if controls_hide_after_ms == 0 {
            return Err(SettingsError::InvalidControlsHideDelay);
        }

        let seek_step_secs = self.seek_step_secs.unwrap_or(DEFAULT_SEEK_STEP_SECS);
        if !seek_step_secs.is_finite() || seek_step_secs <= 0.0 {
            return Err(SettingsError::InvalidSeekStep(seek_step_secs));
        }

        let volume_step = self.volume_step.unwrap_or(DEFAULT_VOLUME_STEP);
        if !volume_step.is_finite() || volume_step <= 0.0 || volume_step > 1.0 {
            return Err(SettingsError::InvalidVolumeStep(volume_step));
        }

        Ok(PlayerSettings {
            throttle_interval_secs,
            debounce_ms,
            controls_hide_after_ms,
            seek_step_secs,
            volume_step,
            autoplay: self.autoplay.unwrap_or(false),
        })
    }
}

impl PlayerSettings {
    /// Minimum forward progress before a throttled write is scheduled.
    #[must_use]
    pub fn throttle_interval_secs(&self) -> f64 {
        self.throttle_interval_secs
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn controls_hide_after(&self) -> Duration {
        Duration::from_millis(self.controls_hide_after_ms)
    }

    #[must_use]
    pub fn seek_step_secs(&self) -> f64 {
        self.seek_step_secs
    }

    #[must_use]
    pub fn volume_step(&self) -> f64 {
        self.volume_step
    }

    #[must_use]
    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    #[must_use]
    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            throttle_interval_secs: DEFAULT_THROTTLE_INTERVAL_SECS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            controls_hide_after_ms: DEFAULT_CONTROLS_HIDE_AFTER_MS,
            seek_step_secs: DEFAULT_SEEK_STEP_SECS,
            volume_step: DEFAULT_VOLUME_STEP,
            autoplay: false,
        }
    }
}

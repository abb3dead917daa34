/// What the media element is doing while the tracker is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activity {
    #[default]
    Idle,
    Playing,
    Paused,
    Seeking,
}

/// Lifecycle of a lesson view's tracker.
///
/// `Completed` is entered from `Ready` when playback ends. Playing or seeking
/// again moves back to `Ready`; the completed flag itself never resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerState {
    #[default]
    Uninitialized,
    Loading,
    Ready(Activity),
    Completed,
}

impl TrackerState {
    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready(_) | Self::Completed)
    }

    #[must_use]
    pub fn is_seeking(self) -> bool {
        matches!(self, Self::Ready(Activity::Seeking))
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "idle",
            Self::Loading => "loading",
            Self::Ready(Activity::Idle) => "ready",
            Self::Ready(Activity::Playing) => "playing",
            Self::Ready(Activity::Paused) => "paused",
            Self::Ready(Activity::Seeking) => "seeking",
            Self::Completed => "completed",
        }
    }
}

mod player_vm;
mod time_fmt;

pub use player_vm::{
    ControlsTimer, MediaSignal, PLAYBACK_RATES, PlayerDisplayVm, PlayerIntent, PlayerOutcome,
    PlayerVm, SeekMarker, controls_visible, next_rate, seek_markers, shortcut_for,
};
pub use time_fmt::{format_datetime, format_watch_time};

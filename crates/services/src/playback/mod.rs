//! Lesson playback tracking: in-memory session state, throttled progress
//! persistence and bookmarks.

mod bookmarks;
mod persist;
mod state;
mod tracker;

pub use bookmarks::{BookmarkCall, BookmarkChange, CreateBookmark, DeleteBookmark};
pub use state::{Activity, TrackerState};
pub use tracker::{PlayerSnapshot, ProgressTracker};

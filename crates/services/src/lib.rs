#![forbid(unsafe_code)]

pub mod app_services;
pub mod course_progress;
pub mod error;
pub mod playback;

pub use lesson_core::Clock;

pub use app_services::AppServices;
pub use course_progress::{CourseProgress, CourseProgressService};
pub use error::{AppServicesError, CourseProgressError, TrackerError};
pub use playback::{
    Activity, BookmarkCall, BookmarkChange, PlayerSnapshot, ProgressTracker, TrackerState,
};

mod bookmark;
mod ids;
mod lesson;
mod media;
mod playback;
mod progress;
mod settings;

pub use bookmark::{Bookmark, BookmarkError, NewBookmark, format_timestamp};
pub use ids::{BookmarkId, CourseId, LessonId, ParseIdError, UserId};
pub use lesson::{LessonSource, LessonSourceError, LessonTarget};
pub use media::{MediaCommand, MediaFault, MediaFaultKind};
pub use playback::{PlaybackSession, clamp_position, percentage_of};
pub use progress::ProgressRecord;
pub use settings::{PlayerSettings, PlayerSettingsDraft, SettingsError};

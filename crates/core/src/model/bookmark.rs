use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{BookmarkId, LessonId, UserId};

/// Longest title accepted for a bookmark, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum BookmarkError {
    #[error("bookmark time must be a finite, non-negative number of seconds (got {0})")]
    InvalidTime(f64),

    #[error("bookmark title is too long ({len} chars, max {max})")]
    TitleTooLong { len: usize, max: usize },
}

/// Format a playback position as `M:SS` (minutes are not wrapped into hours).
///
/// ```
/// use lesson_core::model::format_timestamp;
/// assert_eq!(format_timestamp(125.0), "2:05");
/// assert_eq!(format_timestamp(3725.9), "62:05");
/// ```
#[must_use]
pub fn format_timestamp(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        // Positive and finite; saturates for absurd values.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let whole = seconds.floor() as u64;
        whole
    } else {
        0
    };
    format!("{}:{:02}", whole / 60, whole % 60)
}

/// Request to create a bookmark; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBookmark {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub time_seconds: f64,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl NewBookmark {
    /// Build a bookmark request, deriving the title from the time when none is given.
    ///
    /// Blank titles count as missing.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkError` if the time is negative/non-finite or the title is too long.
    pub fn new(
        user_id: UserId,
        lesson_id: LessonId,
        time_seconds: f64,
        title: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, BookmarkError> {
        if !time_seconds.is_finite() || time_seconds < 0.0 {
            return Err(BookmarkError::InvalidTime(time_seconds));
        }
        let title = title
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format_timestamp(time_seconds));
        let len = title.chars().count();
        if len > MAX_TITLE_CHARS {
            return Err(BookmarkError::TitleTooLong {
                len,
                max: MAX_TITLE_CHARS,
            });
        }
        Ok(Self {
            user_id,
            lesson_id,
            time_seconds,
            title,
            created_at,
        })
    }

    /// Attach a store-assigned id.
    #[must_use]
    pub fn into_bookmark(self, id: BookmarkId) -> Bookmark {
        Bookmark {
            id,
            user_id: self.user_id,
            lesson_id: self.lesson_id,
            time_seconds: self.time_seconds,
            title: self.title,
            created_at: self.created_at,
        }
    }
}

/// A named timestamp a user left inside a lesson video. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    id: BookmarkId,
    user_id: UserId,
    lesson_id: LessonId,
    time_seconds: f64,
    title: String,
    created_at: DateTime<Utc>,
}

impl Bookmark {
    /// Rehydrate a bookmark from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `BookmarkError::InvalidTime` for negative or non-finite times.
    pub fn from_persisted(
        id: BookmarkId,
        user_id: UserId,
        lesson_id: LessonId,
        time_seconds: f64,
        title: String,
        created_at: DateTime<Utc>,
    ) -> Result<Self, BookmarkError> {
        if !time_seconds.is_finite() || time_seconds < 0.0 {
            return Err(BookmarkError::InvalidTime(time_seconds));
        }
        Ok(Self {
            id,
            user_id,
            lesson_id,
            time_seconds,
            title,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> BookmarkId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn time_seconds(&self) -> f64 {
        self.time_seconds
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// `M:SS` label of the bookmark position.
    #[must_use]
    pub fn timestamp_label(&self) -> String {
        format_timestamp(self.time_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft(time: f64, title: Option<&str>) -> Result<NewBookmark, BookmarkError> {
        NewBookmark::new(
            UserId::random(),
            LessonId::random(),
            time,
            title.map(str::to_string),
            fixed_now(),
        )
    }

    #[test]
    fn formats_minutes_and_padded_seconds() {
        assert_eq!(format_timestamp(0.0), "0:00");
        assert_eq!(format_timestamp(9.99), "0:09");
        assert_eq!(format_timestamp(60.0), "1:00");
        assert_eq!(format_timestamp(125.0), "2:05");
        assert_eq!(format_timestamp(-4.0), "0:00");
        assert_eq!(format_timestamp(f64::NAN), "0:00");
    }

    #[test]
    fn missing_title_defaults_to_timestamp() {
        assert_eq!(draft(125.0, None).unwrap().title, "2:05");
    }

    #[test]
    fn blank_title_defaults_to_timestamp() {
        assert_eq!(draft(61.0, Some("   ")).unwrap().title, "1:01");
    }

    #[test]
    fn explicit_title_is_trimmed() {
        assert_eq!(draft(5.0, Some("  Intro ")).unwrap().title, "Intro");
    }

    #[test]
    fn rejects_negative_time() {
        assert_eq!(draft(-1.0, None), Err(BookmarkError::InvalidTime(-1.0)));
    }

    #[test]
    fn rejects_overlong_title() {
        let long = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(matches!(
            draft(1.0, Some(&long)),
            Err(BookmarkError::TitleTooLong { .. })
        ));
    }

    #[test]
    fn into_bookmark_keeps_fields() {
        let id = BookmarkId::random();
        let bookmark = draft(30.0, Some("Setup")).unwrap().into_bookmark(id);
        assert_eq!(bookmark.id(), id);
        assert_eq!(bookmark.title(), "Setup");
        assert_eq!(bookmark.timestamp_label(), "0:30");
    }
}

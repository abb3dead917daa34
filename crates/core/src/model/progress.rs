use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CourseId, LessonId, UserId};

/// Persisted playback position for one user and one lesson.
///
/// Stores treat `(user_id, lesson_id)` as the identity and replace the record
/// on every write, except for `completed`, which never goes back to `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub course_id: CourseId,
    pub current_time_seconds: f64,
    pub progress_percentage: u8,
    pub total_watch_time_seconds: f64,
    pub completed: bool,
    pub last_accessed_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Fresh record for a lesson that has never been played.
    #[must_use]
    pub fn started(
        user_id: UserId,
        lesson_id: LessonId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            lesson_id,
            course_id,
            current_time_seconds: 0.0,
            progress_percentage: 0,
            total_watch_time_seconds: 0.0,
            completed: false,
            last_accessed_at: now,
        }
    }

    /// Compound identity used for upserts.
    #[must_use]
    pub fn key(&self) -> (UserId, LessonId) {
        (self.user_id, self.lesson_id)
    }

    /// Apply `incoming` on top of `self` with upsert semantics.
    ///
    /// Every field is replaced; `completed` stays `true` once set.
    #[must_use]
    pub fn merged_with(&self, incoming: &ProgressRecord) -> ProgressRecord {
        ProgressRecord {
            completed: self.completed || incoming.completed,
            ..incoming.clone()
        }
    }
}

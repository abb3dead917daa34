use std::sync::Arc;

use chrono::{DateTime, Utc};
use lesson_core::model::{CourseId, LessonId, ProgressRecord, UserId};
use storage::repository::ProgressStore;

use crate::error::CourseProgressError;

/// Aggregate progress of one learner across a course.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseProgress {
    pub course_id: CourseId,
    pub lessons_started: usize,
    pub lessons_completed: usize,
    pub total_watch_time_seconds: f64,
    pub last_accessed: Option<DateTime<Utc>>,
    /// Most recently accessed first.
    pub lessons: Vec<ProgressRecord>,
}

impl CourseProgress {
    #[must_use]
    pub fn from_records(course_id: CourseId, mut lessons: Vec<ProgressRecord>) -> Self {
        lessons.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        Self {
            course_id,
            lessons_started: lessons.len(),
            lessons_completed: lessons.iter().filter(|r| r.completed).count(),
            total_watch_time_seconds: lessons.iter().map(|r| r.total_watch_time_seconds).sum(),
            last_accessed: lessons.first().map(|r| r.last_accessed_at),
            lessons,
        }
    }

    /// Lesson the learner should continue with: the most recent unfinished one.
    #[must_use]
    pub fn continue_with(&self) -> Option<&ProgressRecord> {
        self.lessons.iter().find(|r| !r.completed)
    }

    /// Completed share of a course with `total_lessons` lessons, in percent.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn completion_percent(&self, total_lessons: usize) -> u8 {
        if total_lessons == 0 {
            return 0;
        }
        let ratio = self.lessons_completed.min(total_lessons) as f64 / total_lessons as f64;
        (ratio * 100.0).round() as u8
    }
}

/// Read-side queries over saved lesson progress.
pub struct CourseProgressService {
    store: Arc<dyn ProgressStore>,
}

impl CourseProgressService {
    #[must_use]
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `CourseProgressError::Storage` if progress cannot be listed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn summary(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, CourseProgressError> {
        let records = self.store.list_course_progress(user_id, course_id).await?;
        Ok(CourseProgress::from_records(course_id, records))
    }

    /// Start position for reopening a lesson.
    ///
    /// `None` without saved progress. A finished lesson starts over at zero.
    ///
    /// # Errors
    ///
    /// Returns `CourseProgressError::Storage` if progress cannot be loaded.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn resume_position(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<f64>, CourseProgressError> {
        let record = self.store.load_progress(user_id, lesson_id).await?;
        Ok(record.map(|r| {
            if r.progress_percentage >= 100 {
                0.0
            } else {
                r.current_time_seconds
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lesson_core::time::fixed_now;
    use storage::repository::InMemoryProgressStore;

    fn record(user: UserId, course: CourseId, hours_ago: i64, completed: bool) -> ProgressRecord {
        ProgressRecord {
            current_time_seconds: 120.0,
            progress_percentage: if completed { 100 } else { 20 },
            total_watch_time_seconds: 100.0,
            completed,
            last_accessed_at: fixed_now() - Duration::hours(hours_ago),
            ..ProgressRecord::started(user, LessonId::random(), course, fixed_now())
        }
    }

    #[tokio::test]
    async fn summary_counts_lessons_and_watch_time() {
        let store = Arc::new(InMemoryProgressStore::new());
        let (user, course) = (UserId::random(), CourseId::random());
        let recent = record(user, course, 1, false);
        for r in [record(user, course, 5, true), recent.clone(), record(user, course, 3, true)] {
            store.upsert_progress(&r).await.unwrap();
        }
        store
            .upsert_progress(&record(user, CourseId::random(), 0, false))
            .await
            .unwrap();

        let service = CourseProgressService::new(store);
        let summary = service.summary(user, course).await.unwrap();

        assert_eq!(summary.lessons_started, 3);
        assert_eq!(summary.lessons_completed, 2);
        assert!((summary.total_watch_time_seconds - 300.0).abs() < 1e-9);
        assert_eq!(summary.last_accessed, Some(recent.last_accessed_at));
        assert_eq!(summary.continue_with().map(|r| r.lesson_id), Some(recent.lesson_id));
        assert_eq!(summary.completion_percent(4), 50);
        assert_eq!(summary.completion_percent(0), 0);
    }

    #[tokio::test]
    async fn resume_position_restarts_finished_lessons() {
        let store = Arc::new(InMemoryProgressStore::new());
        let user = UserId::random();
        let course = CourseId::random();
        let unfinished = record(user, course, 0, false);
        let finished = record(user, course, 0, true);
        store.upsert_progress(&unfinished).await.unwrap();
        store.upsert_progress(&finished).await.unwrap();

        let service = CourseProgressService::new(store);
        assert_eq!(
            service.resume_position(user, unfinished.lesson_id).await.unwrap(),
            Some(120.0)
        );
        assert_eq!(
            service.resume_position(user, finished.lesson_id).await.unwrap(),
            Some(0.0)
        );
        assert_eq!(
            service.resume_position(user, LessonId::random()).await.unwrap(),
            None
        );
    }
}

use lesson_core::model::{
    Bookmark, BookmarkId, CourseId, LessonId, NewBookmark, ProgressRecord, UserId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{map_bookmark_row, map_progress_row, parse_id, ser};
use crate::repository::{ProgressStore, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait::async_trait]
impl ProgressStore for SqliteRepository {
    async fn load_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, lesson_id, course_id, current_time_seconds, progress_percentage,
                   total_watch_time_seconds, completed, last_accessed_at
            FROM lesson_progress
            WHERE user_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(lesson_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO lesson_progress (
                user_id, lesson_id, course_id, current_time_seconds, progress_percentage,
                total_watch_time_seconds, completed, last_accessed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                course_id = excluded.course_id,
                current_time_seconds = excluded.current_time_seconds,
                progress_percentage = excluded.progress_percentage,
                total_watch_time_seconds = excluded.total_watch_time_seconds,
                completed = MAX(lesson_progress.completed, excluded.completed),
                last_accessed_at = excluded.last_accessed_at
            ",
        )
        .bind(record.user_id.to_string())
        .bind(record.lesson_id.to_string())
        .bind(record.course_id.to_string())
        .bind(record.current_time_seconds.max(0.0))
        .bind(i64::from(record.progress_percentage.min(100)))
        .bind(record.total_watch_time_seconds.max(0.0))
        .bind(i64::from(record.completed))
        .bind(record.last_accessed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, lesson_id, course_id, current_time_seconds, progress_percentage,
                   total_watch_time_seconds, completed, last_accessed_at
            FROM lesson_progress
            WHERE user_id = ?1 AND course_id = ?2
            ORDER BY last_accessed_at DESC
            ",
        )
        .bind(user_id.to_string())
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn load_bookmarks(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, lesson_id, time_seconds, title, created_at
            FROM lesson_bookmarks
            WHERE user_id = ?1 AND lesson_id = ?2
            ORDER BY time_seconds ASC, created_at ASC
            ",
        )
        .bind(user_id.to_string())
        .bind(lesson_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_bookmark_row).collect()
    }

    async fn create_bookmark(&self, bookmark: NewBookmark) -> Result<Bookmark, StorageError> {
        let created = bookmark.into_bookmark(BookmarkId::random());

        sqlx::query(
            r"
            INSERT INTO lesson_bookmarks (id, user_id, lesson_id, time_seconds, title, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(created.id().to_string())
        .bind(created.user_id().to_string())
        .bind(created.lesson_id().to_string())
        .bind(created.time_seconds())
        .bind(created.title())
        .bind(created.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;

        Ok(created)
    }

    async fn delete_bookmark(
        &self,
        bookmark_id: BookmarkId,
        user_id: UserId,
    ) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let owner = sqlx::query("SELECT user_id FROM lesson_bookmarks WHERE id = ?1")
            .bind(bookmark_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(conn)?;
        let Some(owner) = owner else {
            return Err(StorageError::NotFound);
        };
        let owner: String = owner.try_get("user_id").map_err(ser)?;
        if parse_id::<UserId>("user_id", &owner)? != user_id {
            return Err(StorageError::Unauthorized);
        }

        sqlx::query("DELETE FROM lesson_bookmarks WHERE id = ?1 AND user_id = ?2")
            .bind(bookmark_id.to_string())
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}

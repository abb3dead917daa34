use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the schema migrations for lesson progress and bookmarks.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: progress + bookmarks.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_progress (
                    user_id TEXT NOT NULL,
                    lesson_id TEXT NOT NULL,
                    course_id TEXT NOT NULL,
                    current_time_seconds REAL NOT NULL CHECK (current_time_seconds >= 0),
                    progress_percentage INTEGER NOT NULL
                        CHECK (progress_percentage BETWEEN 0 AND 100),
                    total_watch_time_seconds REAL NOT NULL CHECK (total_watch_time_seconds >= 0),
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    last_accessed_at TEXT NOT NULL,
                    PRIMARY KEY (user_id, lesson_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS lesson_bookmarks (
                    id TEXT PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    lesson_id TEXT NOT NULL,
                    time_seconds REAL NOT NULL CHECK (time_seconds >= 0),
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_lesson_progress_user_course
                    ON lesson_progress (user_id, course_id, last_accessed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_lesson_bookmarks_user_lesson_time
                    ON lesson_bookmarks (user_id, lesson_id, time_seconds);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}

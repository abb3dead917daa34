use std::str::FromStr;

use chrono::{DateTime, Utc};
use lesson_core::model::{Bookmark, BookmarkId, CourseId, LessonId, ProgressRecord, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn parse_id<T>(field: &'static str, raw: &str) -> Result<T, StorageError>
where
    T: FromStr,
{
    raw.parse::<T>()
        .map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
}

pub(crate) fn percentage_from_i64(v: i64) -> Result<u8, StorageError> {
    u8::try_from(v)
        .ok()
        .filter(|pct| *pct <= 100)
        .ok_or_else(|| StorageError::Serialization(format!("invalid progress_percentage: {v}")))
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let lesson_id: String = row.try_get("lesson_id").map_err(ser)?;
    let course_id: String = row.try_get("course_id").map_err(ser)?;
    let pct: i64 = row.try_get("progress_percentage").map_err(ser)?;
    let completed: i64 = row.try_get("completed").map_err(ser)?;
    let last_accessed_at: DateTime<Utc> = row.try_get("last_accessed_at").map_err(ser)?;

    Ok(ProgressRecord {
        user_id: parse_id::<UserId>("user_id", &user_id)?,
        lesson_id: parse_id::<LessonId>("lesson_id", &lesson_id)?,
        course_id: parse_id::<CourseId>("course_id", &course_id)?,
        current_time_seconds: row.try_get("current_time_seconds").map_err(ser)?,
        progress_percentage: percentage_from_i64(pct)?,
        total_watch_time_seconds: row.try_get("total_watch_time_seconds").map_err(ser)?,
        completed: completed != 0,
        last_accessed_at,
    })
}

pub(crate) fn map_bookmark_row(row: &SqliteRow) -> Result<Bookmark, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let lesson_id: String = row.try_get("lesson_id").map_err(ser)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;

    Bookmark::from_persisted(
        parse_id::<BookmarkId>("bookmark id", &id)?,
        parse_id::<UserId>("user_id", &user_id)?,
        parse_id::<LessonId>("lesson_id", &lesson_id)?,
        row.try_get("time_seconds").map_err(ser)?,
        row.try_get("title").map_err(ser)?,
        created_at,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rejects_out_of_range() {
        assert_eq!(percentage_from_i64(100).unwrap(), 100);
        assert!(percentage_from_i64(101).is_err());
        assert!(percentage_from_i64(-1).is_err());
    }

    #[test]
    fn parse_id_reports_field() {
        let err = parse_id::<LessonId>("lesson_id", "nope").unwrap_err();
        assert_eq!(err.to_string(), "serialization error: invalid lesson_id: nope");
    }
}

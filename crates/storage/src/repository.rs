use async_trait::async_trait;
use lesson_core::model::{
    Bookmark, BookmarkId, CourseId, LessonId, NewBookmark, ProgressRecord, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("not authorized to modify this record")]
    Unauthorized,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persistence contract for lesson progress and bookmarks.
///
/// Implementations own authorization: `delete_bookmark` must refuse to remove
/// a bookmark that belongs to a different user.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch the saved progress for a user's lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Create or replace the progress record keyed by `(user_id, lesson_id)`.
    ///
    /// `completed` is never cleared by an upsert.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// All progress records of a user within one course, most recently accessed first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn list_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Bookmarks of a user's lesson, ordered by `time_seconds` ascending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn load_bookmarks(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError>;

    /// Persist a new bookmark and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the bookmark cannot be stored.
    async fn create_bookmark(&self, bookmark: NewBookmark) -> Result<Bookmark, StorageError>;

    /// Delete a bookmark owned by `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if it does not exist and
    /// `StorageError::Unauthorized` if another user owns it.
    async fn delete_bookmark(
        &self,
        bookmark_id: BookmarkId,
        user_id: UserId,
    ) -> Result<(), StorageError>;
}

fn sort_by_time(bookmarks: &mut [Bookmark]) {
    bookmarks.sort_by(|a, b| a.time_seconds().total_cmp(&b.time_seconds()));
}

/// Simple in-memory store for tests and prototyping.
///
/// Upserts are replayed explicitly through a map keyed by `(user, lesson)`.
#[derive(Clone, Default)]
pub struct InMemoryProgressStore {
    progress: Arc<Mutex<HashMap<(UserId, LessonId), ProgressRecord>>>,
    bookmarks: Arc<Mutex<HashMap<BookmarkId, Bookmark>>>,
}

impl InMemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn load_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id, lesson_id)).cloned())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let merged = match guard.get(&record.key()) {
            Some(existing) => existing.merged_with(record),
            None => record.clone(),
        };
        guard.insert(record.key(), merged);
        Ok(())
    }

    async fn list_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut records: Vec<ProgressRecord> = guard
            .values()
            .filter(|record| record.user_id == user_id && record.course_id == course_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.last_accessed_at.cmp(&a.last_accessed_at));
        Ok(records)
    }

    async fn load_bookmarks(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError> {
        let guard = self
            .bookmarks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<Bookmark> = guard
            .values()
            .filter(|b| b.user_id() == user_id && b.lesson_id() == lesson_id)
            .cloned()
            .collect();
        sort_by_time(&mut found);
        Ok(found)
    }

    async fn create_bookmark(&self, bookmark: NewBookmark) -> Result<Bookmark, StorageError> {
        let mut guard = self
            .bookmarks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let created = bookmark.into_bookmark(BookmarkId::random());
        guard.insert(created.id(), created.clone());
        Ok(created)
    }

    async fn delete_bookmark(
        &self,
        bookmark_id: BookmarkId,
        user_id: UserId,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .bookmarks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        match guard.get(&bookmark_id) {
            None => Err(StorageError::NotFound),
            Some(existing) if existing.user_id() != user_id => Err(StorageError::Unauthorized),
            Some(_) => {
                guard.remove(&bookmark_id);
                Ok(())
            }
        }
    }
}

/// Holds the active store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            progress: Arc::new(InMemoryProgressStore::new()),
        }
    }
}

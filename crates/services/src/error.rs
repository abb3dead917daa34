//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::model::{BookmarkError, BookmarkId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors returned to callers of `ProgressTracker`.
///
/// Progress loads and writes never surface here; they are logged and retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TrackerError {
    #[error("tracker has not been initialized with a lesson")]
    NotInitialized,
    #[error("bookmark {0} is not part of this lesson")]
    BookmarkNotFound(BookmarkId),
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TrackerError {
    /// The store refused the change because the record belongs to someone else.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Unauthorized))
    }
}

/// Errors emitted by `CourseProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseProgressError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

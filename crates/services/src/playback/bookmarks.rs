//! Bookmark store calls that run without borrowing the tracker.

use std::sync::Arc;

use lesson_core::model::{Bookmark, BookmarkId, NewBookmark, UserId};
use storage::repository::ProgressStore;

use crate::error::TrackerError;

/// A bookmark change accepted by the store, ready for
/// [`ProgressTracker::apply_bookmark_change`](super::ProgressTracker::apply_bookmark_change).
#[derive(Debug, Clone, PartialEq)]
pub enum BookmarkChange {
    Created(Bookmark),
    Removed(BookmarkId),
}

pub struct CreateBookmark {
    pub(super) store: Arc<dyn ProgressStore>,
    pub(super) draft: NewBookmark,
}

impl CreateBookmark {
    /// # Errors
    ///
    /// Returns the storage error when the store rejects the bookmark.
    pub async fn run(self) -> Result<Bookmark, TrackerError> {
        let lesson_id = self.draft.lesson_id;
        let seconds = self.draft.time_seconds;
        self.store.create_bookmark(self.draft).await.map_err(|err| {
            tracing::warn!(lesson_id = %lesson_id, seconds, error = %err, "failed to create bookmark");
            TrackerError::from(err)
        })
    }
}

pub struct DeleteBookmark {
    pub(super) store: Arc<dyn ProgressStore>,
    pub(super) user_id: UserId,
    pub(super) bookmark_id: BookmarkId,
}

impl DeleteBookmark {
    /// # Errors
    ///
    /// Returns the storage error when the delete is rejected.
    pub async fn run(self) -> Result<BookmarkId, TrackerError> {
        let bookmark_id = self.bookmark_id;
        self.store
            .delete_bookmark(bookmark_id, self.user_id)
            .await
            .map_err(|err| {
                tracing::warn!(bookmark_id = %bookmark_id, error = %err, "failed to delete bookmark");
                TrackerError::from(err)
            })?;
        Ok(bookmark_id)
    }
}

/// Either bookmark call, for callers that queue them together.
pub enum BookmarkCall {
    Create(CreateBookmark),
    Delete(DeleteBookmark),
}

impl BookmarkCall {
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }

    /// # Errors
    ///
    /// Returns the storage error of the underlying call.
    pub async fn run(self) -> Result<BookmarkChange, TrackerError> {
        match self {
            Self::Create(call) => call.run().await.map(BookmarkChange::Created),
            Self::Delete(call) => call.run().await.map(BookmarkChange::Removed),
        }
    }
}

impl From<CreateBookmark> for BookmarkCall {
    fn from(call: CreateBookmark) -> Self {
        Self::Create(call)
    }
}

impl From<DeleteBookmark> for BookmarkCall {
    fn from(call: DeleteBookmark) -> Self {
        Self::Delete(call)
    }
}

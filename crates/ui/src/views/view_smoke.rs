use std::sync::Arc;

use lesson_core::model::{
    Bookmark, BookmarkId, CourseId, LessonId, NewBookmark, ProgressRecord, UserId,
};
use lesson_core::time::fixed_now;
use storage::repository::{ProgressStore, Storage, StorageError};

use super::test_harness::{
    ViewKind, lesson_target, setup_view_harness, setup_view_harness_with_storage,
};
use crate::vm::{MediaSignal, PlayerIntent};

#[tokio::test(flavor = "current_thread")]
async fn lesson_view_smoke_renders_player() {
    let mut harness = setup_view_harness(ViewKind::Lesson);
    harness.rebuild();
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("Borrowing in depth"), "missing title in {html}");
    assert!(html.contains("lesson-video"), "missing video element in {html}");
    assert!(
        html.contains("https://cdn.example.com/lessons/borrowing.mp4"),
        "missing source in {html}"
    );
    assert!(html.contains("No bookmarks yet."), "missing empty bookmarks in {html}");
    assert!(html.contains("Play"), "missing play button in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn lesson_view_renders_progress_bookmarks_and_completion() {
    let mut harness = setup_view_harness(ViewKind::Lesson);
    harness.rebuild();
    harness.settle().await;

    let handles = harness.handles().clone();
    handles.send(PlayerIntent::Media(MediaSignal::LoadedMetadata {
        duration: Some(200.0),
    }));
    handles.send(PlayerIntent::Media(MediaSignal::TimeUpdate { current_time: 50.0 }));
    handles.send(PlayerIntent::AddBookmark {
        title: Some("Lifetimes".to_string()),
    });
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("0:50 / 3:20"), "missing time label in {html}");
    assert!(html.contains("Lifetimes"), "missing bookmark in {html}");
    assert!(html.contains("seek-marker"), "missing seek marker in {html}");
    assert_eq!(handles.snapshot().percentage, 25);

    handles.send(PlayerIntent::Media(MediaSignal::Ended));
    harness.settle().await;
    let html = harness.render();
    assert!(html.contains("Completed"), "missing completed badge in {html}");
    assert!(handles.snapshot().completed);
}

#[tokio::test(flavor = "current_thread")]
async fn lesson_view_shows_media_fault_with_retry() {
    let mut harness = setup_view_harness(ViewKind::Lesson);
    harness.rebuild();
    harness.settle().await;

    let handles = harness.handles().clone();
    handles.send(PlayerIntent::Media(MediaSignal::Error {
        code: 2,
        message: None,
    }));
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("network error"), "missing fault message in {html}");
    assert!(html.contains("Retry"), "missing retry in {html}");

    handles.send(PlayerIntent::RetryMedia);
    harness.settle().await;
    let html = harness.render();
    assert!(!html.contains("network error"), "fault still shown in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn progress_view_smoke_renders_summary() {
    let storage = Storage::in_memory();
    let user_id = UserId::random();
    let lesson = lesson_target();
    let record = ProgressRecord {
        current_time_seconds: 125.0,
        progress_percentage: 40,
        total_watch_time_seconds: 300.0,
        ..ProgressRecord::started(user_id, lesson.lesson_id, lesson.course_id, fixed_now())
    };
    storage
        .progress
        .upsert_progress(&record)
        .await
        .expect("seed progress");

    let mut harness =
        setup_view_harness_with_storage(ViewKind::Progress, &storage, user_id, lesson);
    harness.rebuild();
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("Course progress"), "missing title in {html}");
    assert!(html.contains("Lessons started: 1"), "missing started count in {html}");
    assert!(html.contains("Lessons completed: 0"), "missing completed count in {html}");
    assert!(html.contains("Watch time: 5m"), "missing watch time in {html}");
    assert!(html.contains("Resume at 2:05"), "missing resume link in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn progress_view_smoke_renders_empty_state() {
    let mut harness = setup_view_harness(ViewKind::Progress);
    harness.rebuild();
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("No lessons started yet."), "missing empty state in {html}");
    assert!(!html.contains("Resume at"), "unexpected resume link in {html}");
}

struct FailingStore;

#[async_trait::async_trait]
impl ProgressStore for FailingStore {
    async fn load_progress(
        &self,
        _user_id: UserId,
        _lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        Err(StorageError::Connection("fail".to_string()))
    }

    async fn upsert_progress(&self, _record: &ProgressRecord) -> Result<(), StorageError> {
        Err(StorageError::Connection("fail".to_string()))
    }

    async fn list_course_progress(
        &self,
        _user_id: UserId,
        _course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        Err(StorageError::Connection("fail".to_string()))
    }

    async fn load_bookmarks(
        &self,
        _user_id: UserId,
        _lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError> {
        Err(StorageError::Connection("fail".to_string()))
    }

    async fn create_bookmark(&self, _bookmark: NewBookmark) -> Result<Bookmark, StorageError> {
        Err(StorageError::Connection("fail".to_string()))
    }

    async fn delete_bookmark(
        &self,
        _bookmark_id: BookmarkId,
        _user_id: UserId,
    ) -> Result<(), StorageError> {
        Err(StorageError::Connection("fail".to_string()))
    }
}

fn failing_storage() -> Storage {
    Storage {
        progress: Arc::new(FailingStore),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn progress_view_smoke_renders_error_state() {
    let mut harness = setup_view_harness_with_storage(
        ViewKind::Progress,
        &failing_storage(),
        UserId::random(),
        lesson_target(),
    );
    harness.rebuild();
    harness.settle().await;

    let html = harness.render();
    assert!(html.contains("Something went wrong"), "missing error in {html}");
    assert!(html.contains("Retry"), "missing retry in {html}");
}

#[tokio::test(flavor = "current_thread")]
async fn lesson_view_keeps_list_and_shows_notice_when_bookmark_fails() {
    let mut harness = setup_view_harness_with_storage(
        ViewKind::Lesson,
        &failing_storage(),
        UserId::random(),
        lesson_target(),
    );
    harness.rebuild();
    harness.settle().await;

    let handles = harness.handles().clone();
    handles.send(PlayerIntent::Media(MediaSignal::LoadedMetadata {
        duration: Some(60.0),
    }));
    handles.send(PlayerIntent::AddBookmark { title: None });
    harness.settle().await;

    let html = harness.render();
    assert!(
        html.contains("Bookmark could not be saved"),
        "missing bookmark notice in {html}"
    );
    assert!(html.contains("No bookmarks yet."), "bookmark list changed in {html}");
}

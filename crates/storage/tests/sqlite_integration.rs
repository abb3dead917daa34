use chrono::Duration;
use lesson_core::model::{
    Bookmark, CourseId, LessonId, NewBookmark, ProgressRecord, UserId,
};
use lesson_core::time::fixed_now;
use storage::repository::{ProgressStore, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn record(user: UserId, lesson: LessonId, course: CourseId, t: f64) -> ProgressRecord {
    ProgressRecord {
        current_time_seconds: t,
        progress_percentage: 10,
        total_watch_time_seconds: t,
        ..ProgressRecord::started(user, lesson, course, fixed_now())
    }
}

#[tokio::test]
async fn sqlite_upsert_replaces_record_for_same_user_and_lesson() {
    let repo = connect("memdb_progress_upsert").await;
    let (user, lesson, course) = (UserId::random(), LessonId::random(), CourseId::random());

    repo.upsert_progress(&record(user, lesson, course, 30.0))
        .await
        .unwrap();
    repo.upsert_progress(&record(user, lesson, course, 90.0))
        .await
        .unwrap();

    let loaded = repo.load_progress(user, lesson).await.unwrap().expect("row");
    assert_eq!(loaded.current_time_seconds, 90.0);
    assert_eq!(loaded.course_id, course);
    assert_eq!(loaded.last_accessed_at, fixed_now());
    assert!(!loaded.completed);
}

#[tokio::test]
async fn sqlite_completed_flag_is_monotonic() {
    let repo = connect("memdb_progress_completed").await;
    let (user, lesson, course) = (UserId::random(), LessonId::random(), CourseId::random());

    let finished = ProgressRecord {
        progress_percentage: 100,
        completed: true,
        ..record(user, lesson, course, 600.0)
    };
    repo.upsert_progress(&finished).await.unwrap();
    repo.upsert_progress(&record(user, lesson, course, 20.0))
        .await
        .unwrap();

    let loaded = repo.load_progress(user, lesson).await.unwrap().expect("row");
    assert!(loaded.completed);
    assert_eq!(loaded.current_time_seconds, 20.0);
}

#[tokio::test]
async fn sqlite_missing_progress_is_none() {
    let repo = connect("memdb_progress_missing").await;
    let loaded = repo
        .load_progress(UserId::random(), LessonId::random())
        .await
        .unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn sqlite_lists_course_progress_most_recent_first() {
    let repo = connect("memdb_course_progress").await;
    let (user, course) = (UserId::random(), CourseId::random());
    let older = LessonId::random();
    let newer = LessonId::random();

    repo.upsert_progress(&ProgressRecord {
        last_accessed_at: fixed_now() - Duration::hours(2),
        ..record(user, older, course, 10.0)
    })
    .await
    .unwrap();
    repo.upsert_progress(&record(user, newer, course, 20.0))
        .await
        .unwrap();
    repo.upsert_progress(&record(user, LessonId::random(), CourseId::random(), 5.0))
        .await
        .unwrap();

    let listed = repo.list_course_progress(user, course).await.unwrap();
    let lessons: Vec<LessonId> = listed.iter().map(|r| r.lesson_id).collect();
    assert_eq!(lessons, vec![newer, older]);
}

#[tokio::test]
async fn sqlite_bookmarks_roundtrip_sorted() {
    let repo = connect("memdb_bookmarks_sorted").await;
    let (user, lesson) = (UserId::random(), LessonId::random());

    for (t, title) in [(200.0, None), (5.0, Some("Intro")), (125.0, None)] {
        let draft =
            NewBookmark::new(user, lesson, t, title.map(str::to_string), fixed_now()).unwrap();
        repo.create_bookmark(draft).await.unwrap();
    }

    let loaded = repo.load_bookmarks(user, lesson).await.unwrap();
    let titles: Vec<&str> = loaded.iter().map(Bookmark::title).collect();
    assert_eq!(titles, vec!["Intro", "2:05", "3:20"]);
}

#[tokio::test]
async fn sqlite_delete_bookmark_enforces_ownership() {
    let repo = connect("memdb_bookmarks_owner").await;
    let (owner, lesson) = (UserId::random(), LessonId::random());
    let draft = NewBookmark::new(owner, lesson, 42.0, None, fixed_now()).unwrap();
    let bookmark = repo.create_bookmark(draft).await.unwrap();

    let err = repo
        .delete_bookmark(bookmark.id(), UserId::random())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unauthorized));
    assert_eq!(repo.load_bookmarks(owner, lesson).await.unwrap().len(), 1);

    repo.delete_bookmark(bookmark.id(), owner).await.unwrap();
    assert!(repo.load_bookmarks(owner, lesson).await.unwrap().is_empty());

    let err = repo.delete_bookmark(bookmark.id(), owner).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_migrate_is_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}

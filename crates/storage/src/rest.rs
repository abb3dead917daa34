use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{
    Bookmark, BookmarkId, CourseId, LessonId, NewBookmark, ProgressRecord, UserId,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::repository::{ProgressStore, Storage, StorageError};

const PROGRESS_TABLE: &str = "lesson_progress";
const BOOKMARK_TABLE: &str = "lesson_bookmarks";

/// Connection settings for a hosted database exposed over a REST interface.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl RestConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
            timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// `ProgressStore` speaking to `{base}/rest/v1/<table>` with equality filters
/// (`column=eq.value`) in the query string.
///
/// Row-level security on the server decides ownership; a filtered delete that
/// matches nothing is reported as `NotFound`.
#[derive(Clone)]
pub struct RestProgressStore {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BookmarkRow {
    id: BookmarkId,
    user_id: UserId,
    lesson_id: LessonId,
    time_seconds: f64,
    title: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct NewBookmarkRow<'a> {
    user_id: UserId,
    lesson_id: LessonId,
    time_seconds: f64,
    title: &'a str,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookmarkRow> for Bookmark {
    type Error = StorageError;

    fn try_from(row: BookmarkRow) -> Result<Self, Self::Error> {
        Bookmark::from_persisted(
            row.id,
            row.user_id,
            row.lesson_id,
            row.time_seconds,
            row.title,
            row.created_at,
        )
        .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

pub(crate) fn status_error(status: StatusCode, body: &str) -> StorageError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized,
        StatusCode::NOT_FOUND => StorageError::NotFound,
        StatusCode::CONFLICT => StorageError::Conflict,
        other => StorageError::Connection(format!("unexpected status {other}: {body}")),
    }
}

fn transport(e: reqwest::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

impl RestProgressStore {
    /// Build a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(transport)?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        tracing::debug!(%base_url, "creating rest progress store");
        Ok(Self {
            client,
            base_url,
            api_key: config.api_key,
            access_token: config.access_token,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        req.header("apikey", &self.api_key).bearer_auth(bearer)
    }

    async fn checked(resp: Response) -> Result<Response, StorageError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(%status, body, "rest request rejected");
        Err(status_error(status, &body))
    }

    async fn fetch_rows<T>(&self, req: RequestBuilder) -> Result<Vec<T>, StorageError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let resp = self.authorized(req).send().await.map_err(transport)?;
        let resp = Self::checked(resp).await?;
        let body = resp.text().await.map_err(transport)?;
        serde_json::from_str(&body).map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl ProgressStore for RestProgressStore {
    async fn load_progress(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let req = self.client.get(self.table_url(PROGRESS_TABLE)).query(&[
            ("user_id", eq(user_id)),
            ("lesson_id", eq(lesson_id)),
            ("limit", "1".to_string()),
        ]);
        let rows: Vec<ProgressRecord> = self.fetch_rows(req).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let req = self
            .client
            .post(self.table_url(PROGRESS_TABLE))
            .query(&[("on_conflict", "user_id,lesson_id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(record);
        let resp = self.authorized(req).send().await.map_err(transport)?;
        Self::checked(resp).await?;
        Ok(())
    }

    async fn list_course_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let req = self.client.get(self.table_url(PROGRESS_TABLE)).query(&[
            ("user_id", eq(user_id)),
            ("course_id", eq(course_id)),
            ("order", "last_accessed_at.desc".to_string()),
        ]);
        self.fetch_rows(req).await
    }

    async fn load_bookmarks(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
    ) -> Result<Vec<Bookmark>, StorageError> {
        let req = self.client.get(self.table_url(BOOKMARK_TABLE)).query(&[
            ("user_id", eq(user_id)),
            ("lesson_id", eq(lesson_id)),
            ("order", "time_seconds.asc".to_string()),
        ]);
        let rows: Vec<BookmarkRow> = self.fetch_rows(req).await?;
        rows.into_iter().map(Bookmark::try_from).collect()
    }

    async fn create_bookmark(&self, bookmark: NewBookmark) -> Result<Bookmark, StorageError> {
        let row = NewBookmarkRow {
            user_id: bookmark.user_id,
            lesson_id: bookmark.lesson_id,
            time_seconds: bookmark.time_seconds,
            title: &bookmark.title,
            created_at: bookmark.created_at,
        };
        let req = self
            .client
            .post(self.table_url(BOOKMARK_TABLE))
            .header("Prefer", "return=representation")
            .json(&row);
        let rows: Vec<BookmarkRow> = self.fetch_rows(req).await?;
        let created = rows.into_iter().next().ok_or_else(|| {
            StorageError::Serialization("insert returned no representation".into())
        })?;
        Bookmark::try_from(created)
    }

    async fn delete_bookmark(
        &self,
        bookmark_id: BookmarkId,
        user_id: UserId,
    ) -> Result<(), StorageError> {
        let req = self
            .client
            .delete(self.table_url(BOOKMARK_TABLE))
            .query(&[("id", eq(bookmark_id)), ("user_id", eq(user_id))])
            .header("Prefer", "return=representation");
        let rows: Vec<BookmarkRow> = self.fetch_rows(req).await?;
        if rows.is_empty() {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

impl Storage {
    /// Build a `Storage` backed by a hosted REST database.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the HTTP client cannot be built.
    pub fn rest(config: RestConfig) -> Result<Self, StorageError> {
        let progress: Arc<dyn ProgressStore> = Arc::new(RestProgressStore::new(config)?);
        Ok(Self { progress })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_storage_errors() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            StorageError::Unauthorized
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, ""),
            StorageError::Unauthorized
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, ""),
            StorageError::NotFound
        ));
        assert!(matches!(
            status_error(StatusCode::CONFLICT, ""),
            StorageError::Conflict
        ));
        let err = status_error(StatusCode::BAD_GATEWAY, "upstream");
        assert!(err.to_string().contains("upstream"));
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let store = RestProgressStore::new(RestConfig::new("https://db.example.com/", "anon"))
            .expect("client");
        assert_eq!(
            store.table_url(PROGRESS_TABLE),
            "https://db.example.com/rest/v1/lesson_progress"
        );
    }
}

use thiserror::Error;
use url::Url;

use crate::model::{CourseId, LessonId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonSourceError {
    #[error("media source is empty")]
    Empty,
    #[error("media source is not a valid URL: {0}")]
    InvalidUrl(String),
    #[error("unsupported media source scheme: {0}")]
    UnsupportedScheme(String),
}

/// Playable URL supplied by the embedding page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSource(Url);

impl LessonSource {
    /// Parse a media URL. Bare filesystem paths become `file://` URLs.
    ///
    /// # Errors
    ///
    /// Returns `LessonSourceError` for empty input, unparsable URLs, or schemes
    /// other than `http`, `https` and `file`.
    pub fn parse(raw: &str) -> Result<Self, LessonSourceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LessonSourceError::Empty);
        }
        let url = match Url::parse(trimmed) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let path = std::path::Path::new(trimmed);
                let absolute = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    std::env::current_dir()
                        .unwrap_or_else(|_| std::path::PathBuf::from("/"))
                        .join(path)
                };
                Url::from_file_path(&absolute)
                    .map_err(|()| LessonSourceError::InvalidUrl(trimmed.to_string()))?
            }
            Err(_) => return Err(LessonSourceError::InvalidUrl(trimmed.to_string())),
        };
        match url.scheme() {
            "http" | "https" | "file" => Ok(Self(url)),
            other => Err(LessonSourceError::UnsupportedScheme(other.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Everything a lesson view needs to mount a player.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonTarget {
    pub lesson_id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub source: LessonSource,
    /// Explicit resume position; `None` means "use the saved progress".
    pub start_time_seconds: Option<f64>,
}

use std::sync::Arc;

use lesson_core::model::{PlayerSettings, UserId};
use storage::repository::{ProgressStore, Storage};
use storage::rest::RestConfig;

use crate::Clock;
use crate::course_progress::CourseProgressService;
use crate::error::AppServicesError;
use crate::playback::ProgressTracker;

/// Assembles app-facing services for one signed-in learner.
#[derive(Clone)]
pub struct AppServices {
    user_id: UserId,
    clock: Clock,
    settings: PlayerSettings,
    progress_store: Arc<dyn ProgressStore>,
    course_progress: Arc<CourseProgressService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, user_id: UserId, settings: PlayerSettings, clock: Clock) -> Self {
        let progress_store = Arc::clone(&storage.progress);
        let course_progress = Arc::new(CourseProgressService::new(Arc::clone(&progress_store)));
        Self {
            user_id,
            clock,
            settings,
            progress_store,
            course_progress,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        user_id: UserId,
        settings: PlayerSettings,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, user_id, settings, clock))
    }

    /// Build services backed by a hosted REST database.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the HTTP client cannot be built.
    pub fn new_rest(
        config: RestConfig,
        user_id: UserId,
        settings: PlayerSettings,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::rest(config)?;
        Ok(Self::new(&storage, user_id, settings, clock))
    }

    #[must_use]
    pub fn in_memory(user_id: UserId, settings: PlayerSettings, clock: Clock) -> Self {
        Self::new(&Storage::in_memory(), user_id, settings, clock)
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    #[must_use]
    pub fn progress_store(&self) -> Arc<dyn ProgressStore> {
        Arc::clone(&self.progress_store)
    }

    #[must_use]
    pub fn course_progress(&self) -> Arc<CourseProgressService> {
        Arc::clone(&self.course_progress)
    }

    /// A fresh tracker for one lesson view.
    #[must_use]
    pub fn tracker(&self) -> ProgressTracker {
        ProgressTracker::new(
            Arc::clone(&self.progress_store),
            self.user_id,
            self.settings.clone(),
            self.clock,
        )
    }
}

use std::sync::Arc;

use lesson_core::model::{LessonTarget, PlayerSettings, UserId};
use services::{CourseProgressService, ProgressTracker};

pub trait UiApp: Send + Sync {
    fn user_id(&self) -> UserId;
    fn lesson(&self) -> LessonTarget;
    fn settings(&self) -> PlayerSettings;

    /// A fresh tracker for one mounted lesson view.
    fn tracker(&self) -> ProgressTracker;
    fn course_progress(&self) -> Arc<CourseProgressService>;
}

#[derive(Clone)]
pub struct AppContext {
    app: Arc<dyn UiApp>,
    user_id: UserId,
    lesson: LessonTarget,
    settings: PlayerSettings,
    course_progress: Arc<CourseProgressService>,
}

impl AppContext {
    #[must_use]
    pub fn new(app: &Arc<dyn UiApp>) -> Self {
        Self {
            app: Arc::clone(app),
            user_id: app.user_id(),
            lesson: app.lesson(),
            settings: app.settings(),
            course_progress: app.course_progress(),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lesson(&self) -> &LessonTarget {
        &self.lesson
    }

    #[must_use]
    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    #[must_use]
    pub fn tracker(&self) -> ProgressTracker {
        self.app.tracker()
    }

    #[must_use]
    pub fn course_progress(&self) -> Arc<CourseProgressService> {
        Arc::clone(&self.course_progress)
    }
}

// This context is provided by the application composition root (e.g. `crates/app`).

/// Build an `AppContext` from a UI-facing app implementation.
#[must_use]
pub fn build_app_context(app: &Arc<dyn UiApp>) -> AppContext {
    AppContext::new(app)
}

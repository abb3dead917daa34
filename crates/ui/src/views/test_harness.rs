use std::sync::Arc;

use dioxus::core::NoOpMutations;
use dioxus::prelude::*;
use dioxus_router::{Routable, Router};
use lesson_core::model::{
    CourseId, LessonId, LessonSource, LessonTarget, PlayerSettings, UserId,
};
use lesson_core::time::fixed_clock;
use services::{AppServices, CourseProgressService, ProgressTracker};
use storage::repository::Storage;

use crate::context::{UiApp, build_app_context};
use crate::views::lesson::LessonTestHandles;
use crate::views::{LessonView, ProgressView};

struct TestApp {
    services: AppServices,
    lesson: LessonTarget,
}

impl UiApp for TestApp {
    fn user_id(&self) -> UserId {
        self.services.user_id()
    }

    fn lesson(&self) -> LessonTarget {
        self.lesson.clone()
    }

    fn settings(&self) -> PlayerSettings {
        self.services.settings().clone()
    }

    fn tracker(&self) -> ProgressTracker {
        self.services.tracker()
    }

    fn course_progress(&self) -> Arc<CourseProgressService> {
        self.services.course_progress()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Lesson,
    Progress,
}

#[derive(Props, Clone)]
struct ViewHarnessProps {
    app: Arc<TestApp>,
    view: ViewKind,
    lesson_handles: Option<LessonTestHandles>,
}

impl PartialEq for ViewHarnessProps {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

#[component]
fn ViewRouterHarness(props: ViewHarnessProps) -> Element {
    let app: Arc<dyn UiApp> = props.app.clone();
    use_context_provider(|| build_app_context(&app));
    use_context_provider(|| props.view);
    if let Some(handles) = props.lesson_handles.clone() {
        use_context_provider(|| handles);
    }
    rsx! { Router::<TestRoute> {} }
}

#[derive(Clone, Routable, PartialEq)]
#[rustfmt::skip]
enum TestRoute {
    #[route("/")]
    Root {},
}

#[component]
fn Root() -> Element {
    let view = use_context::<ViewKind>();
    match view {
        ViewKind::Lesson => rsx! { LessonView {} },
        ViewKind::Progress => rsx! { ProgressView {} },
    }
}

pub struct ViewHarness {
    pub dom: VirtualDom,
    pub lesson_handles: Option<LessonTestHandles>,
}

impl ViewHarness {
    pub fn rebuild(&mut self) {
        self.dom.rebuild_in_place();
        drive_dom(&mut self.dom);
    }

    pub async fn drive_async(&mut self) {
        let _ = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            self.dom.wait_for_work(),
        )
        .await;
        self.dom.render_immediate(&mut NoOpMutations);
        self.dom.process_events();
    }

    /// Drive pending tasks a few rounds so resources and the player coroutine settle.
    pub async fn settle(&mut self) {
        for _ in 0..5 {
            self.drive_async().await;
        }
    }

    pub fn render(&self) -> String {
        dioxus_ssr::render(&self.dom)
    }

    pub fn handles(&self) -> &LessonTestHandles {
        self.lesson_handles
            .as_ref()
            .expect("lesson handles available for the lesson view")
    }
}

pub fn drive_dom(dom: &mut VirtualDom) {
    dom.process_events();
    dom.render_immediate(&mut NoOpMutations);
    dom.process_events();
}

pub fn lesson_target() -> LessonTarget {
    LessonTarget {
        lesson_id: LessonId::random(),
        course_id: CourseId::random(),
        title: "Borrowing in depth".to_string(),
        source: LessonSource::parse("https://cdn.example.com/lessons/borrowing.mp4")
            .expect("valid source"),
        start_time_seconds: None,
    }
}

pub fn setup_view_harness(view: ViewKind) -> ViewHarness {
    setup_view_harness_with_storage(view, &Storage::in_memory(), UserId::random(), lesson_target())
}

pub fn setup_view_harness_with_storage(
    view: ViewKind,
    storage: &Storage,
    user_id: UserId,
    lesson: LessonTarget,
) -> ViewHarness {
    let services = AppServices::new(storage, user_id, PlayerSettings::default(), fixed_clock());
    let lesson_handles = match view {
        ViewKind::Lesson => Some(LessonTestHandles::default()),
        ViewKind::Progress => None,
    };
    let app = Arc::new(TestApp { services, lesson });

    let dom = VirtualDom::new_with_props(
        ViewRouterHarness,
        ViewHarnessProps {
            app,
            view,
            lesson_handles: lesson_handles.clone(),
        },
    );

    ViewHarness {
        dom,
        lesson_handles,
    }
}

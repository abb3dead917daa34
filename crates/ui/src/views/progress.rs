use dioxus::prelude::*;
use dioxus_router::Link;
use lesson_core::model::format_timestamp;

use crate::context::AppContext;
use crate::routes::Route;
use crate::views::{ViewError, ViewState, view_state_from_resource};
use crate::vm::{format_datetime, format_watch_time};

#[derive(Clone, Debug, PartialEq)]
struct ProgressData {
    lessons_started: usize,
    lessons_completed: usize,
    watch_time: String,
    last_accessed: Option<String>,
    /// Resume label for the configured lesson, if it has unfinished progress.
    resume_at: Option<String>,
}

#[component]
pub fn ProgressView() -> Element {
    let ctx = use_context::<AppContext>();
    let course_progress = ctx.course_progress();
    let user_id = ctx.user_id();
    let lesson_id = ctx.lesson().lesson_id;
    let course_id = ctx.lesson().course_id;

    let mut resource = use_resource(move || {
        let course_progress = course_progress.clone();
        async move {
            let summary = course_progress
                .summary(user_id, course_id)
                .await
                .map_err(|_| ViewError::Unknown)?;
            let resume_at = summary
                .lessons
                .iter()
                .find(|record| record.lesson_id == lesson_id && !record.completed)
                .map(|record| format_timestamp(record.current_time_seconds));
            Ok::<_, ViewError>(ProgressData {
                lessons_started: summary.lessons_started,
                lessons_completed: summary.lessons_completed,
                watch_time: format_watch_time(summary.total_watch_time_seconds),
                last_accessed: summary.last_accessed.map(format_datetime),
                resume_at,
            })
        }
    });

    let state = view_state_from_resource(&resource);

    rsx! {
        div { class: "page",
            h2 { "Course progress" }

            match state {
                ViewState::Idle => rsx! {
                    p { "Idle" }
                },
                ViewState::Loading => rsx! {
                    p { "Loading..." }
                },
                ViewState::Ready(data) => rsx! {
                    if data.lessons_started == 0 {
                        p { "No lessons started yet." }
                    } else {
                        ul { class: "progress-stats",
                            li { "Lessons started: {data.lessons_started}" }
                            li { "Lessons completed: {data.lessons_completed}" }
                            li { "Watch time: {data.watch_time}" }
                            if let Some(at) = data.last_accessed {
                                li { "Last watched: {at}" }
                            }
                        }
                    }
                    if let Some(at) = data.resume_at {
                        Link { class: "btn btn-primary", to: Route::Lesson {}, "Resume at {at}" }
                    }
                },
                ViewState::Error(err) => rsx! {
                    p { "{err.message()}" }
                    button { class: "btn", onclick: move |_| resource.restart(), "Retry" }
                },
            }
        }
    }
}

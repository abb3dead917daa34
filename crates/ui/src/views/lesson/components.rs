use dioxus::prelude::*;
use lesson_core::model::Bookmark;

use crate::vm::{PLAYBACK_RATES, PlayerDisplayVm, PlayerIntent, SeekMarker};

#[component]
pub(super) fn SeekBar(
    current: f64,
    duration: f64,
    markers: Vec<SeekMarker>,
    on_intent: EventHandler<PlayerIntent>,
) -> Element {
    let max = if duration > 0.0 { duration } else { 0.0 };
    rsx! {
        div { class: "seek-bar",
            input {
                id: "player-seek",
                r#type: "range",
                min: "0",
                max: "{max}",
                step: "0.1",
                value: "{current}",
                disabled: max <= 0.0,
                oninput: move |evt: FormEvent| {
                    if let Ok(seconds) = evt.value().parse::<f64>() {
                        on_intent.call(PlayerIntent::SeekTo(seconds));
                    }
                },
            }
            div { class: "seek-markers",
                for marker in markers {
                    button {
                        key: "{marker.id}",
                        class: "seek-marker",
                        style: "left: {marker.offset_percent}%",
                        title: "{marker.title} ({marker.label})",
                        onclick: move |_| on_intent.call(PlayerIntent::JumpToBookmark(marker.id)),
                    }
                }
            }
        }
    }
}

#[component]
pub(super) fn ControlBar(display: PlayerDisplayVm, on_intent: EventHandler<PlayerIntent>) -> Element {
    let volume = f64::from(display.volume_percent) / 100.0;
    let slowest = PLAYBACK_RATES[0];
    rsx! {
        div { class: "control-row",
            button {
                id: "player-toggle",
                class: "btn btn-primary",
                onclick: move |_| on_intent.call(PlayerIntent::TogglePlay),
                "{display.play_label}"
            }
            span { class: "player-time", "{display.time_label}" }
            button {
                id: "player-mute",
                class: "btn",
                onclick: move |_| on_intent.call(PlayerIntent::ToggleMute),
                "{display.mute_label}"
            }
            input {
                id: "player-volume",
                r#type: "range",
                min: "0",
                max: "1",
                step: "0.05",
                value: "{volume}",
                "aria-label": "Volume",
                oninput: move |evt: FormEvent| {
                    if let Ok(volume) = evt.value().parse::<f64>() {
                        on_intent.call(PlayerIntent::SetVolume(volume));
                    }
                },
            }
            div { class: "rate-control",
                button {
                    class: "btn btn-small",
                    title: "Slower (min {slowest}x)",
                    onclick: move |_| on_intent.call(PlayerIntent::RateDown),
                    "-"
                }
                span { class: "player-rate", "{display.rate_label}" }
                button {
                    class: "btn btn-small",
                    title: "Faster",
                    onclick: move |_| on_intent.call(PlayerIntent::RateUp),
                    "+"
                }
            }
            span { class: "player-status", "{display.status}" }
        }
    }
}

#[component]
pub(super) fn FaultBanner(message: String, on_retry: EventHandler<()>) -> Element {
    rsx! {
        div { class: "player-fault", role: "alert",
            p { "{message}" }
            button {
                id: "player-retry",
                class: "btn btn-primary",
                onclick: move |_| on_retry.call(()),
                "Retry"
            }
        }
    }
}

#[component]
pub(super) fn BookmarkPanel(
    bookmarks: Vec<Bookmark>,
    notice: Option<String>,
    on_intent: EventHandler<PlayerIntent>,
) -> Element {
    let mut title = use_signal(String::new);
    let mut submit = move || {
        let value = title.peek().trim().to_string();
        let value = (!value.is_empty()).then_some(value);
        on_intent.call(PlayerIntent::AddBookmark { title: value });
        title.set(String::new());
    };

    rsx! {
        section { class: "bookmarks",
            h3 { "Bookmarks" }
            div { class: "bookmark-form",
                input {
                    id: "bookmark-title",
                    r#type: "text",
                    placeholder: "Title (optional)",
                    value: "{title}",
                    oninput: move |evt: FormEvent| title.set(evt.value()),
                    onkeydown: move |evt: KeyboardEvent| {
                        evt.stop_propagation();
                        if evt.data.key() == Key::Enter {
                            evt.prevent_default();
                            submit();
                        }
                    },
                }
                button {
                    id: "bookmark-add",
                    class: "btn",
                    onclick: move |_| submit(),
                    "Add bookmark"
                }
            }
            if let Some(message) = notice {
                p { class: "notice", role: "status", "{message}" }
            }
            if bookmarks.is_empty() {
                p { class: "muted", "No bookmarks yet." }
            } else {
                ul { class: "bookmark-list",
                    for bookmark in bookmarks {
                        BookmarkRow { key: "{bookmark.id()}", bookmark, on_intent }
                    }
                }
            }
        }
    }
}

#[component]
fn BookmarkRow(bookmark: Bookmark, on_intent: EventHandler<PlayerIntent>) -> Element {
    let id = bookmark.id();
    rsx! {
        li { class: "bookmark",
            button {
                class: "bookmark-jump",
                onclick: move |_| on_intent.call(PlayerIntent::JumpToBookmark(id)),
                span { class: "bookmark-time", "{bookmark.timestamp_label()}" }
                span { class: "bookmark-title", "{bookmark.title()}" }
            }
            button {
                class: "btn btn-small bookmark-remove",
                onclick: move |_| on_intent.call(PlayerIntent::RemoveBookmark(id)),
                "Remove"
            }
        }
    }
}

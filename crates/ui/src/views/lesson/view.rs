use dioxus::document::eval;
use dioxus::prelude::*;
use futures::StreamExt;
use futures::channel::mpsc;

use services::PlayerSnapshot;

use super::components::{BookmarkPanel, ControlBar, FaultBanner, SeekBar};
use super::scripts::media_bridge_script;
use crate::context::AppContext;
use crate::vm::{
    ControlsTimer, MediaSignal, PlayerDisplayVm, PlayerIntent, PlayerVm, controls_visible,
    shortcut_for,
};

#[cfg(test)]
use std::cell::RefCell;
#[cfg(test)]
use std::rc::Rc;

const VIDEO_ID: &str = "lesson-video";

#[component]
pub fn LessonView() -> Element {
    let ctx = use_context::<AppContext>();
    let lesson = ctx.lesson().clone();
    let settings = ctx.settings().clone();
    let hide_after = settings.controls_hide_after();

    let snapshot = use_signal(PlayerSnapshot::default);
    let notice = use_signal(|| None::<String>);
    let mut controls = use_signal(ControlsTimer::default);

    let touch_controls = use_callback(move |()| {
        let generation = controls.write().touch();
        spawn(async move {
            tokio::time::sleep(hide_after).await;
            let playing = snapshot.peek().is_playing;
            controls.write().expire(generation, playing);
        });
    });

    let player = {
        let ctx = ctx.clone();
        let lesson = lesson.clone();
        use_coroutine(move |mut rx: UnboundedReceiver<PlayerIntent>| {
            let tracker = ctx.tracker();
            let lesson = lesson.clone();
            let mut snapshot = snapshot;
            let mut notice = notice;
            async move {
                let mut vm = PlayerVm::new(tracker);
                vm.load(&lesson).await;
                snapshot.set(vm.snapshot());

                let mut media = eval(&media_bridge_script(VIDEO_ID));
                let mut media_open = true;
                // Bookmark store calls run on their own tasks and report back here.
                let (settled_tx, mut settled_rx) = mpsc::unbounded::<PlayerIntent>();
                loop {
                    let intent = tokio::select! {
                        signal = media.recv::<MediaSignal>(), if media_open => match signal {
                            Ok(signal) => PlayerIntent::Media(signal),
                            Err(err) => {
                                tracing::debug!(error = ?err, "media bridge closed");
                                media_open = false;
                                continue;
                            }
                        },
                        next = rx.next() => match next {
                            Some(intent) => intent,
                            None => break,
                        },
                        Some(settled) = settled_rx.next() => settled,
                    };

                    let started = intent == PlayerIntent::Media(MediaSignal::Play);
                    let bookmark_action = intent.is_bookmark_action();
                    let outcome = vm.dispatch(intent);
                    if let Some(call) = outcome.bookmark_call {
                        let settled = settled_tx.clone();
                        tokio::spawn(async move {
                            let intent = PlayerVm::settle_bookmark(call).await;
                            if settled.unbounded_send(intent).is_err() {
                                tracing::debug!("lesson view closed before bookmark call settled");
                            }
                        });
                    }
                    for command in outcome.commands {
                        if let Err(err) = media.send(command) {
                            tracing::debug!(error = ?err, ?command, "media command not delivered");
                        }
                    }
                    if bookmark_action {
                        notice.set(outcome.notice);
                    }
                    snapshot.set(vm.snapshot());
                    if started {
                        touch_controls.call(());
                    }
                }
                vm.shutdown().await;
            }
        })
    };

    #[cfg(test)]
    {
        let mut registered = use_signal(|| false);
        if !registered() {
            registered.set(true);
            if let Some(handles) = try_consume_context::<LessonTestHandles>() {
                handles.register(player, snapshot);
            }
        }
    }

    let on_intent = use_callback(move |intent: PlayerIntent| {
        player.send(intent);
        touch_controls.call(());
    });

    let on_key = move |evt: KeyboardEvent| {
        if let Some(intent) = shortcut_for(&evt.data.key(), &settings) {
            evt.prevent_default();
            on_intent.call(intent);
        } else {
            touch_controls.call(());
        }
    };

    let current = snapshot.read().clone();
    let display = PlayerDisplayVm::from(&current);
    let visible = controls_visible(&controls.read(), &current);
    let controls_class = if visible {
        "player-controls"
    } else {
        "player-controls player-controls--hidden"
    };

    rsx! {
        div {
            id: "lesson-root",
            class: "page page--lesson",
            tabindex: "0",
            onkeydown: on_key,
            onmousemove: move |_| touch_controls.call(()),
            header { class: "lesson-header",
                h2 { "{lesson.title}" }
                span { class: "lesson-percentage", "{display.percentage}%" }
                if display.completed {
                    span { class: "badge badge-complete", "Completed" }
                }
            }
            div { class: "player",
                video {
                    id: VIDEO_ID,
                    class: "player-video",
                    src: "{lesson.source.as_str()}",
                    preload: "metadata",
                    onclick: move |_| on_intent.call(PlayerIntent::TogglePlay),
                }
                if let Some(message) = display.fault_message.clone() {
                    FaultBanner {
                        message,
                        on_retry: move |()| on_intent.call(PlayerIntent::RetryMedia),
                    }
                }
                div { class: "{controls_class}",
                    SeekBar {
                        current: current.current_time_seconds,
                        duration: current.duration_seconds,
                        markers: display.markers.clone(),
                        on_intent,
                    }
                    ControlBar { display: display.clone(), on_intent }
                }
            }
            BookmarkPanel {
                bookmarks: current.bookmarks.clone(),
                notice: notice(),
                on_intent,
            }
        }
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct LessonTestHandles {
    player: Rc<RefCell<Option<Coroutine<PlayerIntent>>>>,
    snapshot: Rc<RefCell<Option<Signal<PlayerSnapshot>>>>,
}

#[cfg(test)]
impl LessonTestHandles {
    pub(crate) fn register(&self, player: Coroutine<PlayerIntent>, snapshot: Signal<PlayerSnapshot>) {
        *self.player.borrow_mut() = Some(player);
        *self.snapshot.borrow_mut() = Some(snapshot);
    }

    pub(crate) fn send(&self, intent: PlayerIntent) {
        (*self.player.borrow())
            .expect("lesson player registered")
            .send(intent);
    }

    pub(crate) fn snapshot(&self) -> PlayerSnapshot {
        (*self.snapshot.borrow())
            .expect("lesson snapshot registered")
            .peek()
            .clone()
    }
}

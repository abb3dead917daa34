/// Long-lived bridge between the `<video>` element and the lesson coroutine.
///
/// Media events are posted with `dioxus.send` as `MediaSignal` JSON; commands
/// arrive through `dioxus.recv` as `MediaCommand` JSON.
pub(super) fn media_bridge_script(video_id: &str) -> String {
    format!(
        r#"
        let video = null;
        for (let attempt = 0; attempt < 100 && !video; attempt++) {{
            video = document.getElementById({video_id:?});
            if (!video) {{
                await new Promise((resolve) => setTimeout(resolve, 20));
            }}
        }}
        if (!video) {{ return; }}

        const finite = (value) => (Number.isFinite(value) ? value : null);
        const post = (payload) => dioxus.send(payload);

        video.addEventListener("loadedmetadata", () =>
            post({{ kind: "loaded_metadata", duration: finite(video.duration) }}));
        video.addEventListener("timeupdate", () =>
            post({{ kind: "time_update", current_time: video.currentTime }}));
        video.addEventListener("play", () => post({{ kind: "play" }}));
        video.addEventListener("pause", () => post({{ kind: "pause" }}));
        video.addEventListener("seeked", () => post({{ kind: "seeked" }}));
        video.addEventListener("ended", () => post({{ kind: "ended" }}));
        video.addEventListener("error", () => {{
            const err = video.error;
            post({{
                kind: "error",
                code: err ? err.code : 0,
                message: err && err.message ? err.message : null,
            }});
        }});

        // Metadata may already be there when the listeners attach.
        if (video.readyState >= 1) {{
            post({{ kind: "loaded_metadata", duration: finite(video.duration) }});
        }}

        while (true) {{
            const command = await dioxus.recv();
            if (!document.body.contains(video)) {{ return; }}
            switch (command.kind) {{
                case "seek":
                    video.currentTime = command.seconds;
                    break;
                case "play":
                    video.play().catch(() => {{}});
                    break;
                case "pause":
                    video.pause();
                    break;
                case "set_volume":
                    video.volume = command.volume;
                    video.muted = command.muted;
                    break;
                case "set_rate":
                    video.playbackRate = command.rate;
                    break;
                case "reload":
                    video.load();
                    break;
            }}
        }}
        "#
    )
}

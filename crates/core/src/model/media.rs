use serde::{Deserialize, Serialize};

/// Instruction for the media element hosting the lesson video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaCommand {
    Seek { seconds: f64 },
    Play,
    Pause,
    SetVolume { volume: f64, muted: bool },
    SetRate { rate: f64 },
    /// Reload the source after a fault; playback resumes from the remembered position.
    Reload,
}

/// Error classes reported by an HTML media element (`MediaError.code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaFaultKind {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
    Unknown,
}

impl MediaFaultKind {
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::Aborted,
            2 => Self::Network,
            3 => Self::Decode,
            4 => Self::SourceNotSupported,
            _ => Self::Unknown,
        }
    }
}

/// A media failure that needs the user to retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFault {
    kind: MediaFaultKind,
    detail: Option<String>,
}

impl MediaFault {
    #[must_use]
    pub fn new(kind: MediaFaultKind, detail: Option<String>) -> Self {
        let detail = detail
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Self { kind, detail }
    }

    #[must_use]
    pub fn kind(&self) -> MediaFaultKind {
        self.kind
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Short user-facing explanation.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self.kind {
            MediaFaultKind::Aborted => "Video loading was interrupted.",
            MediaFaultKind::Network => "The video could not be loaded because of a network error.",
            MediaFaultKind::Decode => "The video could not be decoded.",
            MediaFaultKind::SourceNotSupported => "This video format is not supported.",
            MediaFaultKind::Unknown => "The video failed to play.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_media_error_codes() {
        assert_eq!(MediaFaultKind::from_code(2), MediaFaultKind::Network);
        assert_eq!(MediaFaultKind::from_code(4), MediaFaultKind::SourceNotSupported);
        assert_eq!(MediaFaultKind::from_code(0), MediaFaultKind::Unknown);
    }

    #[test]
    fn blank_detail_is_dropped() {
        let fault = MediaFault::new(MediaFaultKind::Decode, Some("  ".into()));
        assert_eq!(fault.detail(), None);
        assert_eq!(fault.message(), "The video could not be decoded.");
    }
}

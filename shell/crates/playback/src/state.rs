use std::fmt;

#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Scrubbing,
    Buffering,
    Ended,
    Errored,
}

impl PlaybackState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Scrubbing => "scrubbing",
            PlaybackState::Buffering => "buffering",
            PlaybackState::Ended => "ended",
            PlaybackState::Errored => "errored",
        }
    }

    /// States in which backend samples may reach the display.
    pub fn relays_position(&self) -> bool {
        matches!(
            self,
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Buffering
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PlaybackState::Ended | PlaybackState::Errored)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A position reading from either the poll path or a pushed backend event.
#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionSample {
    pub current_ms: u64,
    /// 0 when live or unknown
    pub total_ms: u64,
}

impl PositionSample {
    pub fn new(current_ms: u64, total_ms: u64) -> Self {
        Self {
            current_ms,
            total_ms,
        }
    }
}

/// `m:ss` label text, as shown next to the seek slider.
pub fn format_time(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

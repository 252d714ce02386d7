use std::path::PathBuf;

use crate::backend::BackendEvent;
use crate::downloads::{DownloadJob, DownloadKind, JobId};
use crate::errors::{DownloadError, SessionError};
use crate::resolver::{Comment, RequestId};
use crate::source::{SessionId, StreamSource};
use crate::state::{PlaybackState, PositionSample};

/// Which surface is in front.
#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    Browse,
    Play,
}

/// Outward notifications for observers (UI, logging, the binary's console).
#[derive(Debug, Clone)]
pub enum ShellEvent {
    StateChanged {
        session: Option<SessionId>,
        state: PlaybackState,
    },
    /// The slider and both time labels
    PositionChanged {
        sample: PositionSample,
    },
    /// Time label echo while dragging, not a committed seek
    ScrubPreview {
        ms: u64,
    },
    SeekCommitted {
        ms: u64,
    },
    Ended {
        session: SessionId,
    },
    Errored {
        session: SessionId,
        error: SessionError,
    },
    ModeChanged {
        mode: SurfaceMode,
    },
    DownloadStarted {
        job: DownloadJob,
    },
    DownloadFinished {
        job: DownloadJob,
    },
}

/// User input arriving from whatever surface is in front.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    TogglePlayPause,
    SeekRelative(i64),
    SeekAbsolute(u64),
    ScrubBegin,
    ScrubDrag(u64),
    ScrubEnd(u64),
    Back,
    Download(DownloadKind),
    SetVolume(u8),
    ToggleMute,
}

/// Everything that reaches the control thread goes through this queue.
#[derive(Debug)]
pub enum ControlMessage {
    Navigation(String),
    Backend {
        session: SessionId,
        event: BackendEvent,
    },
    Resolved {
        request: RequestId,
        result: Result<StreamSource, SessionError>,
    },
    Comments {
        request: RequestId,
        comments: Vec<Comment>,
    },
    DownloadFinished {
        job_id: JobId,
        result: Result<PathBuf, DownloadError>,
    },
    User(UserAction),
    Shutdown,
}

use crate::backend::PlaybackErrorKind;
use crate::downloads::DownloadKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Resolution failed: {reason}")]
    Resolution { reason: String },
    #[error("Backend init failed: {reason}")]
    BackendInit { reason: String },
    #[error("Playback error: {0}")]
    Playback(PlaybackErrorKind),
}

impl SessionError {
    pub fn resolution(reason: impl Into<String>) -> Self {
        SessionError::Resolution {
            reason: reason.into(),
        }
    }

    pub fn backend_init(reason: impl Into<String>) -> Self {
        SessionError::BackendInit {
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DownloadError {
    #[error("Converter not found: {path}")]
    MissingConverter { path: String },
    #[error("Download already running: {kind} {url}")]
    AlreadyRunning { url: String, kind: DownloadKind },
    #[error("Download failed: {message}")]
    Failed { message: String },
}

use std::fmt;

use tokio::sync::mpsc;

use crate::errors::SessionError;
use crate::events::ControlMessage;
use crate::source::{SessionId, StreamTracks};

#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackErrorKind {
    Format,
    Network,
    AccessDenied,
    Other,
}

impl fmt::Display for PlaybackErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Events a media backend pushes from its own threads.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Playback actually began after a load
    Ready,
    EndReached,
    Error(PlaybackErrorKind),
    PositionChanged(u64),
    Buffering(bool),
}

/// Handle a backend uses to report events for one session.
///
/// Sending only enqueues a [`ControlMessage`]; the event body runs later on the
/// control thread. Safe to clone into any backend thread.
#[derive(Clone, Debug)]
pub struct BackendEventSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl BackendEventSink {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<ControlMessage>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Returns false once the control loop is gone.
    pub fn send(&self, event: BackendEvent) -> bool {
        self.tx
            .send(ControlMessage::Backend {
                session: self.session,
                event,
            })
            .is_ok()
    }

    pub fn ready(&self) -> bool {
        self.send(BackendEvent::Ready)
    }

    pub fn end_reached(&self) -> bool {
        self.send(BackendEvent::EndReached)
    }

    pub fn error(&self, kind: PlaybackErrorKind) -> bool {
        self.send(BackendEvent::Error(kind))
    }

    pub fn position(&self, ms: u64) -> bool {
        self.send(BackendEvent::PositionChanged(ms))
    }

    pub fn buffering(&self, active: bool) -> bool {
        self.send(BackendEvent::Buffering(active))
    }
}

/// The native playback surface.
///
/// Every call must return promptly: the controller calls these on the control
/// thread. Getters report the backend's latest known values.
pub trait MediaBackend: Send {
    /// Loads a combined stream, or a video stream with an auxiliary audio track.
    fn load(&mut self, tracks: &StreamTracks) -> Result<(), SessionError>;
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn time_ms(&self) -> Option<u64>;
    fn length_ms(&self) -> Option<u64>;
    fn set_time_ms(&mut self, ms: u64);
    fn is_playing(&self) -> bool;
    /// Selected audio track, `None` when no track is active
    fn audio_track(&self) -> Option<i64>;
    fn audio_tracks(&self) -> Vec<i64>;
    fn set_audio_track(&mut self, track: i64);
    fn set_volume(&mut self, volume: u8);
    fn set_muted(&mut self, muted: bool);
    fn subscribe(&mut self, sink: BackendEventSink);
    fn unsubscribe(&mut self);
}

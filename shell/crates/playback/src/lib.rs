pub mod backend;
pub mod controller;
pub mod downloads;
pub mod errors;
pub mod events;
pub mod resolver;
pub mod router;
pub mod runtime;
pub mod source;
pub mod state;
pub mod sync;

#[cfg(test)]
mod testing;

pub use backend::{BackendEvent, BackendEventSink, MediaBackend, PlaybackErrorKind};
pub use controller::{PlaybackController, Terminal};
pub use downloads::{
    DownloadAffordance, DownloadBackend, DownloadJob, DownloadJobManager, DownloadKind,
    DownloadStatus, JobId,
};
pub use errors::{DownloadError, SessionError};
pub use events::{ControlMessage, ShellEvent, SurfaceMode, UserAction};
pub use resolver::{Comment, RequestId, ResolveDispatcher, Resolver, SpawnResolver, VideoInfo};
pub use router::{NavigationRouter, NavigationTarget, RequestKind};
pub use runtime::ControlLoop;
pub use source::{SessionId, StreamSource, StreamTracks};
pub use state::{PlaybackState, PositionSample};
pub use sync::SyncConfig;

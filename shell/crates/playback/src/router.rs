use tokio::sync::broadcast;
use url::Url;

use crate::backend::MediaBackend;
use crate::controller::{PlaybackController, Terminal};
use crate::downloads::DownloadJobManager;
use crate::errors::SessionError;
use crate::events::{ShellEvent, SurfaceMode, UserAction};
use crate::resolver::{Comment, RequestId, ResolveDispatcher};
use crate::source::{SessionId, StreamSource};

/// Decides whether the browse surface drops an outgoing request.
pub type RequestFilter = fn(&str, RequestKind) -> bool;

/// The embedded browser.
pub trait BrowseSurface: Send {
    fn navigate(&mut self, url: &str);
    /// Installs the filter the surface's request interceptor must consult.
    fn set_request_filter(&mut self, filter: RequestFilter);
    fn set_muted(&mut self, muted: bool);
    fn show(&mut self);
    fn hide(&mut self);
}

/// The native player window around the media backend.
pub trait PlaybackSurface: Send {
    fn show(&mut self);
    fn hide(&mut self);
    fn set_video_info(&mut self, source: &StreamSource);
    fn show_comments(&mut self, comments: &[Comment]);
}

/// What a navigation intent points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    /// Ordinary browsing, left to the browse surface
    Passthrough,
    Watch { video_id: String },
    LiveManifest { url: String },
}

impl NavigationTarget {
    pub fn classify(url: &str) -> Self {
        if url.contains("m3u8") {
            return NavigationTarget::LiveManifest {
                url: url.to_string(),
            };
        }
        match watch_video_id(url) {
            Some(video_id) => NavigationTarget::Watch { video_id },
            None => NavigationTarget::Passthrough,
        }
    }

    /// Identity used to suppress re-entrant navigation.
    fn key(&self) -> Option<&str> {
        match self {
            NavigationTarget::Passthrough => None,
            NavigationTarget::Watch { video_id } => Some(video_id),
            NavigationTarget::LiveManifest { url } => Some(url),
        }
    }
}

/// Extracts the id of a `youtube.com/watch?v=` or `youtu.be/` url.
pub fn watch_video_id(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.");
    let id = match host {
        "youtu.be" => parsed
            .path_segments()?
            .next()
            .map(|s| s.to_string()),
        "youtube.com" | "m.youtube.com" if parsed.path() == "/watch" => parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned()),
        _ => None,
    }?;
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Resource kinds the browse surface's request interceptor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Document,
    Media,
    Xhr,
    Script,
    Image,
    Other,
}

/// Whether the browse surface should drop a request: media and xhr loads of a
/// watch page would start the in-page player behind the native one.
pub fn should_block_request(url: &str, kind: RequestKind) -> bool {
    matches!(kind, RequestKind::Media | RequestKind::Xhr) && watch_video_id(url).is_some()
}

struct PendingResolve {
    request: RequestId,
    key: String,
}

/// Switches between browsing and playback.
///
/// Owns the controller and the download manager; lives on the control thread.
pub struct NavigationRouter<B: MediaBackend> {
    controller: PlaybackController<B>,
    downloads: DownloadJobManager,
    browser: Box<dyn BrowseSurface>,
    player: Box<dyn PlaybackSurface>,
    dispatcher: Box<dyn ResolveDispatcher>,
    home_url: String,
    mode: SurfaceMode,
    /// Key of the target currently playing
    active: Option<String>,
    pending: Option<PendingResolve>,
    /// Comment fetch of the active session
    comments_request: Option<RequestId>,
    last_request: u64,
    event_channel: broadcast::Sender<ShellEvent>,
}

impl<B: MediaBackend> NavigationRouter<B> {
    pub fn new(
        controller: PlaybackController<B>,
        downloads: DownloadJobManager,
        mut browser: Box<dyn BrowseSurface>,
        player: Box<dyn PlaybackSurface>,
        dispatcher: Box<dyn ResolveDispatcher>,
        home_url: impl Into<String>,
        event_channel: broadcast::Sender<ShellEvent>,
    ) -> Self {
        browser.set_request_filter(should_block_request);
        Self {
            controller,
            downloads,
            browser,
            player,
            dispatcher,
            home_url: home_url.into(),
            mode: SurfaceMode::Browse,
            active: None,
            pending: None,
            comments_request: None,
            last_request: 0,
            event_channel,
        }
    }

    pub fn controller(&self) -> &PlaybackController<B> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController<B> {
        &mut self.controller
    }

    pub fn downloads(&self) -> &DownloadJobManager {
        &self.downloads
    }

    pub fn downloads_mut(&mut self) -> &mut DownloadJobManager {
        &mut self.downloads
    }

    pub fn mode(&self) -> SurfaceMode {
        self.mode
    }

    fn next_request(&mut self) -> RequestId {
        self.last_request += 1;
        RequestId(self.last_request)
    }

    fn set_mode(&mut self, mode: SurfaceMode) {
        if self.mode != mode {
            self.mode = mode;
            let _ = self.event_channel.send(ShellEvent::ModeChanged { mode });
        }
    }

    /// A navigation intent from the browse surface.
    pub fn on_navigation(&mut self, url: &str) {
        let target = NavigationTarget::classify(url);
        let Some(key) = target.key() else {
            log::debug!("[router]Passing through {}", url);
            return;
        };
        let in_session = self.active.as_deref() == Some(key)
            && self.controller.session_id().is_some()
            && !self.controller.state().is_terminal();
        let in_flight = self.pending.as_ref().is_some_and(|p| p.key == key);
        if in_session || in_flight {
            log::debug!("[router]Ignoring repeated navigation to {}", key);
            return;
        }

        match target {
            NavigationTarget::Watch { video_id } => {
                // keep the in-page player quiet while resolving
                self.browser.set_muted(true);
                self.browser.navigate(&self.home_url);
                let request = self.next_request();
                log::info!("[router]Watch page {} ({})", video_id, request);
                self.dispatcher.resolve(request, &video_id);
                self.pending = Some(PendingResolve {
                    request,
                    key: video_id,
                });
            }
            NavigationTarget::LiveManifest { url } => {
                log::info!("[router]Live manifest {}", url);
                self.pending = None;
                self.browser.set_muted(true);
                self.browser.navigate(&self.home_url);
                let source = StreamSource::live_manifest(&url);
                self.enter_playback(url, source);
            }
            NavigationTarget::Passthrough => {}
        }
    }

    /// Result of a background resolution. Anything but the latest request is stale.
    pub fn on_resolved(&mut self, request: RequestId, result: Result<StreamSource, SessionError>) {
        let key = match self.pending.take() {
            Some(pending) if pending.request == request => pending.key,
            other => {
                self.pending = other;
                log::debug!("[router]Dropped stale result of {}", request);
                return;
            }
        };
        match result {
            Ok(source) => self.enter_playback(key, source),
            Err(e) => {
                log::error!("[router]Could not play {}: {}", key, e);
                self.show_browser();
            }
        }
    }

    fn enter_playback(&mut self, key: String, source: StreamSource) {
        match self.controller.start(source.clone()) {
            Ok(session) => {
                self.active = Some(key);
                self.browser.hide();
                self.player.show();
                self.player.set_video_info(&source);
                self.set_mode(SurfaceMode::Play);
                self.comments_request = None;
                if !source.is_live {
                    let request = self.next_request();
                    log::debug!("[{}]Fetching comments ({})", session, request);
                    self.dispatcher.fetch_comments(request, &source.id);
                    self.comments_request = Some(request);
                }
            }
            Err(e) => {
                log::error!("[router]Could not start {}: {}", key, e);
                self.active = None;
                self.show_browser();
            }
        }
    }

    pub fn on_comments(&mut self, request: RequestId, comments: Vec<Comment>) {
        if self.comments_request != Some(request) || self.mode != SurfaceMode::Play {
            log::debug!("[router]Dropped stale comments of {}", request);
            return;
        }
        self.comments_request = None;
        self.player.show_comments(&comments);
    }

    fn show_browser(&mut self) {
        self.browser.set_muted(false);
        self.browser.show();
    }

    /// Back to browsing, from playback or from a pending resolution.
    pub fn back(&mut self) {
        self.controller.stop();
        self.revert_to_browse();
    }

    fn revert_to_browse(&mut self) {
        self.active = None;
        self.pending = None;
        self.comments_request = None;
        self.player.hide();
        self.show_browser();
        self.browser.navigate(&self.home_url);
        self.set_mode(SurfaceMode::Browse);
    }

    /// Reacts to a terminal outcome of the controller.
    pub fn on_terminal(&mut self, terminal: Terminal) {
        match &terminal {
            Terminal::Ended => log::info!("[router]Playback finished, back to browsing"),
            Terminal::Errored(e) => log::warn!("[router]Playback failed ({}), back to browsing", e),
        }
        self.back();
    }

    pub fn on_backend_event(&mut self, session: SessionId, event: crate::backend::BackendEvent) {
        if let Some(terminal) = self.controller.handle_backend_event(session, event) {
            self.on_terminal(terminal);
        }
    }

    pub fn on_poll_tick(&mut self) {
        if let Some(terminal) = self.controller.on_poll_tick() {
            self.on_terminal(terminal);
        }
    }

    pub fn handle_user(&mut self, action: UserAction) {
        match action {
            UserAction::TogglePlayPause => self.controller.toggle_play_pause(),
            UserAction::SeekRelative(ms) => {
                self.controller.seek_relative(ms);
            }
            UserAction::SeekAbsolute(ms) => {
                self.controller.seek_absolute(ms);
            }
            UserAction::ScrubBegin => {
                self.controller.scrub_begin();
            }
            UserAction::ScrubDrag(ms) => {
                self.controller.scrub_drag(ms);
            }
            UserAction::ScrubEnd(ms) => {
                self.controller.scrub_end(ms);
            }
            UserAction::Back => self.back(),
            UserAction::Download(kind) => {
                let Some(url) = self.controller.source().map(|s| s.page_url.clone()) else {
                    log::warn!("[router]Nothing to download, no video is open");
                    return;
                };
                if let Err(e) = self.downloads.submit(&url, kind) {
                    log::warn!("[router]{}", e);
                }
            }
            UserAction::SetVolume(volume) => self.controller.set_volume(volume),
            UserAction::ToggleMute => {
                self.controller.toggle_mute();
            }
        }
    }
}

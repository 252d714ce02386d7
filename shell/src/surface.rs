use playback::router::{BrowseSurface, PlaybackSurface, RequestFilter};
use playback::state::format_time;
use playback::{
    Comment, DownloadAffordance, DownloadKind, DownloadStatus, RequestKind, ShellEvent,
    StreamSource, SurfaceMode,
};
use tokio::sync::broadcast;

/// Stand-in for the embedded browser: remembers where it is and whether it
/// would be audible.
#[derive(Default)]
pub struct ConsoleBrowser {
    pub location: String,
    pub muted: bool,
    pub visible: bool,
    /// Whether the page's own player is kept from streaming
    pub media_blocked: bool,
    filter: Option<RequestFilter>,
}

impl ConsoleBrowser {
    /// The request interceptor: false when the installed filter drops `url`.
    pub fn allows(&self, url: &str, kind: RequestKind) -> bool {
        let blocked = self.filter.is_some_and(|filter| filter(url, kind));
        if blocked {
            log::debug!("[browse]Blocked {:?} request to {}", kind, url);
        }
        !blocked
    }
}

impl BrowseSurface for ConsoleBrowser {
    fn navigate(&mut self, url: &str) {
        log::debug!("[browse]Navigate to {}", url);
        self.media_blocked = !self.allows(url, RequestKind::Media);
        self.location = url.to_string();
    }

    fn set_request_filter(&mut self, filter: RequestFilter) {
        self.filter = Some(filter);
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn show(&mut self) {
        self.visible = true;
        println!("browsing {}", self.location);
    }

    fn hide(&mut self) {
        self.visible = false;
    }
}

#[derive(Debug, Default)]
pub struct ConsolePlayer {
    pub visible: bool,
}

impl PlaybackSurface for ConsolePlayer {
    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn set_video_info(&mut self, source: &StreamSource) {
        println!("▶ {}", source.title);
        if let Some(line) = source.description.lines().find(|l| !l.trim().is_empty()) {
            println!("  {}", line.trim());
        }
        println!("  {}", source.page_url);
    }

    fn show_comments(&mut self, comments: &[Comment]) {
        println!("  {} comments", comments.len());
        for comment in comments.iter().take(3) {
            println!("  [{}] {}: {}", comment.like_count, comment.author, comment.text);
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleAffordance;

impl DownloadAffordance for ConsoleAffordance {
    fn set_enabled(&mut self, kind: DownloadKind, enabled: bool) {
        log::debug!("[download]{} button {}", kind, if enabled { "enabled" } else { "disabled" });
    }
}

/// One console line for an event, or `None` for events too chatty to print.
pub fn describe(event: &ShellEvent) -> Option<String> {
    match event {
        ShellEvent::StateChanged { state, .. } => Some(format!("state: {}", state)),
        ShellEvent::SeekCommitted { ms } => Some(format!("seek: {}", format_time(*ms))),
        ShellEvent::Ended { session } => Some(format!("{} ended", session)),
        ShellEvent::Errored { session, error } => Some(format!("{} failed: {}", session, error)),
        ShellEvent::ModeChanged { mode } => Some(match mode {
            SurfaceMode::Browse => "back to browsing".to_string(),
            SurfaceMode::Play => "now playing".to_string(),
        }),
        ShellEvent::DownloadStarted { job } => {
            Some(format!("download {} started: {}", job.kind, job.source_url))
        }
        ShellEvent::DownloadFinished { job } => Some(match job.status {
            DownloadStatus::Succeeded => format!(
                "download {} saved: {}",
                job.kind,
                job.output_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
            _ => format!(
                "download {} failed: {}",
                job.kind,
                job.error_message.as_deref().unwrap_or("unknown error")
            ),
        }),
        ShellEvent::PositionChanged { .. } | ShellEvent::ScrubPreview { .. } => None,
    }
}

/// Prints events until the channel closes.
pub async fn print_events(mut events: broadcast::Receiver<ShellEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = describe(&event) {
                    println!("{}", line);
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                log::debug!("[console]Skipped {} events", n);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

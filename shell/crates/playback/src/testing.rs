//! Recording fakes for the external contracts.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::backend::{BackendEventSink, MediaBackend};
use crate::downloads::{DownloadAffordance, DownloadBackend, DownloadKind};
use crate::errors::SessionError;
use crate::events::{ControlMessage, ShellEvent};
use crate::resolver::{Comment, RequestId, ResolveDispatcher};
use crate::router::{BrowseSurface, PlaybackSurface, RequestFilter};
use crate::source::{StreamSource, StreamTracks};

#[derive(Default, Debug)]
pub struct BackendLog {
    pub calls: Vec<String>,
    pub time_ms: Option<u64>,
    pub length_ms: Option<u64>,
    pub playing: bool,
    pub audio_track: Option<i64>,
    pub audio_tracks: Vec<i64>,
    pub sink: Option<BackendEventSink>,
    pub loaded: Option<StreamTracks>,
    pub fail_load: bool,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub log: Arc<Mutex<BackendLog>>,
}

impl FakeBackend {
    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.log.lock().unwrap().calls.clear();
    }

    pub fn set_position(&self, time_ms: u64, length_ms: u64) {
        let mut log = self.log.lock().unwrap();
        log.time_ms = Some(time_ms);
        log.length_ms = Some(length_ms);
    }

    pub fn sink(&self) -> Option<BackendEventSink> {
        self.log.lock().unwrap().sink.clone()
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().calls.push(call);
    }
}

impl MediaBackend for FakeBackend {
    fn load(&mut self, tracks: &StreamTracks) -> Result<(), SessionError> {
        self.record(format!("load {}", tracks.primary()));
        let mut log = self.log.lock().unwrap();
        if log.fail_load {
            return Err(SessionError::backend_init("fake backend refused to load"));
        }
        log.loaded = Some(tracks.clone());
        log.time_ms = Some(0);
        Ok(())
    }

    fn play(&mut self) {
        self.record("play".into());
        self.log.lock().unwrap().playing = true;
    }

    fn pause(&mut self) {
        self.record("pause".into());
        self.log.lock().unwrap().playing = false;
    }

    fn stop(&mut self) {
        self.record("stop".into());
        let mut log = self.log.lock().unwrap();
        log.playing = false;
        log.loaded = None;
    }

    fn time_ms(&self) -> Option<u64> {
        self.log.lock().unwrap().time_ms
    }

    fn length_ms(&self) -> Option<u64> {
        self.log.lock().unwrap().length_ms
    }

    fn set_time_ms(&mut self, ms: u64) {
        self.record(format!("set_time {ms}"));
        self.log.lock().unwrap().time_ms = Some(ms);
    }

    fn is_playing(&self) -> bool {
        self.log.lock().unwrap().playing
    }

    fn audio_track(&self) -> Option<i64> {
        self.log.lock().unwrap().audio_track
    }

    fn audio_tracks(&self) -> Vec<i64> {
        self.log.lock().unwrap().audio_tracks.clone()
    }

    fn set_audio_track(&mut self, track: i64) {
        self.record(format!("set_audio_track {track}"));
        self.log.lock().unwrap().audio_track = Some(track);
    }

    fn set_volume(&mut self, volume: u8) {
        self.record(format!("set_volume {volume}"));
    }

    fn set_muted(&mut self, muted: bool) {
        self.record(format!("set_muted {muted}"));
    }

    fn subscribe(&mut self, sink: BackendEventSink) {
        self.record(format!("subscribe {}", sink.session().0));
        self.log.lock().unwrap().sink = Some(sink);
    }

    fn unsubscribe(&mut self) {
        self.record("unsubscribe".into());
        self.log.lock().unwrap().sink = None;
    }
}

/// Records browse and playback surface calls into one ordered list.
#[derive(Clone, Default)]
pub struct SurfaceLog {
    pub calls: Arc<Mutex<Vec<String>>>,
    request_filter: Arc<Mutex<Option<RequestFilter>>>,
}

impl SurfaceLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn filter(&self) -> Option<RequestFilter> {
        *self.request_filter.lock().unwrap()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub struct FakeBrowser(pub SurfaceLog);

impl BrowseSurface for FakeBrowser {
    fn navigate(&mut self, url: &str) {
        self.0.record(format!("browser.navigate {url}"));
    }

    fn set_request_filter(&mut self, filter: RequestFilter) {
        *self.0.request_filter.lock().unwrap() = Some(filter);
    }

    fn set_muted(&mut self, muted: bool) {
        self.0.record(format!("browser.muted {muted}"));
    }

    fn show(&mut self) {
        self.0.record("browser.show".into());
    }

    fn hide(&mut self) {
        self.0.record("browser.hide".into());
    }
}

pub struct FakePlayerView(pub SurfaceLog);

impl PlaybackSurface for FakePlayerView {
    fn show(&mut self) {
        self.0.record("player.show".into());
    }

    fn hide(&mut self) {
        self.0.record("player.hide".into());
    }

    fn set_video_info(&mut self, source: &StreamSource) {
        self.0.record(format!("player.info {}", source.title));
    }

    fn show_comments(&mut self, comments: &[Comment]) {
        self.0.record(format!("player.comments {}", comments.len()));
    }
}

#[derive(Clone, Default)]
pub struct FakeDispatcher {
    pub resolves: Arc<Mutex<Vec<(RequestId, String)>>>,
    pub comments: Arc<Mutex<Vec<(RequestId, String)>>>,
}

impl ResolveDispatcher for FakeDispatcher {
    fn resolve(&self, request: RequestId, video_id: &str) {
        self.resolves
            .lock()
            .unwrap()
            .push((request, video_id.to_string()));
    }

    fn fetch_comments(&self, request: RequestId, video_id: &str) {
        self.comments
            .lock()
            .unwrap()
            .push((request, video_id.to_string()));
    }
}

/// A download backend whose jobs finish when the test says so.
#[derive(Clone, Default)]
pub struct FakeDownloads {
    pub missing_converter: Arc<Mutex<Vec<DownloadKind>>>,
    pub outcomes: Arc<Mutex<Vec<(DownloadKind, Result<PathBuf, String>)>>>,
    pub started: Arc<Mutex<Vec<(String, DownloadKind)>>>,
}

impl FakeDownloads {
    pub fn outcome(&self, kind: DownloadKind, result: Result<PathBuf, String>) {
        self.outcomes.lock().unwrap().push((kind, result));
    }

    fn take_outcome(&self, kind: DownloadKind) -> Option<Result<PathBuf, String>> {
        let mut outcomes = self.outcomes.lock().unwrap();
        let pos = outcomes.iter().position(|(k, _)| *k == kind)?;
        Some(outcomes.remove(pos).1)
    }
}

#[async_trait]
impl DownloadBackend for FakeDownloads {
    fn check_prerequisites(&self, kind: DownloadKind) -> Result<(), String> {
        if self.missing_converter.lock().unwrap().contains(&kind) {
            return Err("/opt/ffmpeg/bin/ffmpeg".to_string());
        }
        Ok(())
    }

    async fn fetch(&self, url: &str, kind: DownloadKind, output_dir: &Path) -> Result<PathBuf, String> {
        self.started.lock().unwrap().push((url.to_string(), kind));
        let result = loop {
            if let Some(result) = self.take_outcome(kind) {
                break result;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        };
        result.map(|p| output_dir.join(p))
    }
}

#[derive(Clone, Default)]
pub struct FakeAffordance {
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl FakeAffordance {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl DownloadAffordance for FakeAffordance {
    fn set_enabled(&mut self, kind: DownloadKind, enabled: bool) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", kind.as_str(), enabled));
    }
}

pub fn channels() -> (
    mpsc::UnboundedSender<ControlMessage>,
    mpsc::UnboundedReceiver<ControlMessage>,
    broadcast::Sender<ShellEvent>,
    broadcast::Receiver<ShellEvent>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = broadcast::channel(256);
    (tx, rx, event_tx, event_rx)
}

pub fn drain(rx: &mut broadcast::Receiver<ShellEvent>) -> Vec<ShellEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn vod_source(id: &str, total_urls: usize) -> StreamSource {
    let urls = (0..total_urls)
        .map(|i| format!("https://cdn.example/{id}/{i}"))
        .collect();
    StreamSource::new(
        id,
        format!("Video {id}"),
        "description",
        urls,
        false,
        format!("https://www.youtube.com/watch?v={id}"),
    )
}

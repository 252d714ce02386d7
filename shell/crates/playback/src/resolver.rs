use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::mpsc;

use crate::errors::SessionError;
use crate::events::ControlMessage;
use crate::source::StreamSource;

/// Correlates a background resolution or comment fetch with the navigation
/// that asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request {}", self.0)
    }
}

pub const LIVE_TITLE_PREFIX: &str = "🔴 LIVE: ";
pub const DEFAULT_AUTHOR_THUMBNAIL: &str = "https://via.placeholder.com/40";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Comment {
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "zero_if_null")]
    pub like_count: u64,
    #[serde(default)]
    pub author_thumbnail: Option<String>,
}

fn zero_if_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

/// Most liked first, at most `max` of them. Missing thumbnails get a placeholder.
pub fn top_comments(mut comments: Vec<Comment>, max: usize) -> Vec<Comment> {
    comments.sort_by(|a, b| b.like_count.cmp(&a.like_count));
    comments.truncate(max);
    for comment in comments.iter_mut() {
        if comment.author_thumbnail.as_deref().unwrap_or_default().is_empty() {
            comment.author_thumbnail = Some(DEFAULT_AUTHOR_THUMBNAIL.to_string());
        }
    }
    comments
}

/// One entry of a yt-dlp format list.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct FormatInfo {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub format_note: Option<String>,
}

fn has_codec(codec: &Option<String>) -> bool {
    codec.as_deref().is_some_and(|c| c != "none")
}

impl FormatInfo {
    pub fn has_video(&self) -> bool {
        has_codec(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        has_codec(&self.acodec)
    }
}

/// The subset of a yt-dlp info dictionary the shell needs.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_live: Option<bool>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub formats: Vec<FormatInfo>,
    #[serde(default)]
    pub requested_formats: Vec<FormatInfo>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl VideoInfo {
    pub fn is_live(&self) -> bool {
        self.is_live.unwrap_or(false)
    }

    /// Best combined format of a live stream, ranked by height then bitrate.
    fn best_live_url(&self) -> Option<&str> {
        self.formats
            .iter()
            .filter(|f| f.has_video() && f.has_audio() && f.url.is_some())
            .max_by(|a, b| {
                a.height
                    .unwrap_or(0)
                    .cmp(&b.height.unwrap_or(0))
                    .then(a.tbr.unwrap_or(0.0).total_cmp(&b.tbr.unwrap_or(0.0)))
            })
            .and_then(|f| f.url.as_deref())
    }

    /// `[video, audio]` from the requested formats, if both are there.
    fn split_urls(&self) -> Option<Vec<String>> {
        let video = self
            .requested_formats
            .iter()
            .find(|f| f.has_video())
            .and_then(|f| f.url.clone())?;
        let audio = self
            .requested_formats
            .iter()
            .find(|f| !f.has_video() && f.has_audio())
            .and_then(|f| f.url.clone())?;
        Some(vec![video, audio])
    }

    /// Picks the stream urls and builds the source for `page_url`.
    pub fn into_source(self, page_url: &str) -> Result<StreamSource, SessionError> {
        let is_live = self.is_live();
        let stream_urls = if is_live {
            self.best_live_url()
                .or(self.url.as_deref())
                .map(|url| vec![url.to_string()])
        } else {
            self.split_urls()
                .or_else(|| self.url.clone().map(|url| vec![url]))
        };
        let Some(stream_urls) = stream_urls else {
            return Err(SessionError::resolution(format!(
                "no playable format for {}",
                self.id
            )));
        };

        let title = if is_live {
            format!("{}{}", LIVE_TITLE_PREFIX, self.title)
        } else {
            self.title
        };
        Ok(StreamSource::new(
            self.id,
            title,
            self.description.unwrap_or_default(),
            stream_urls,
            is_live,
            page_url,
        ))
    }
}

pub fn watch_page_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// External resolution of a video id. Implementations may block for seconds;
/// they are only ever awaited off the control thread.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, video_id: &str) -> Result<StreamSource, SessionError>;
    /// Best effort; an empty list on failure.
    async fn comments(&self, video_id: &str) -> Vec<Comment>;
}

/// Starts background work for the router without blocking it. Results come
/// back as [`ControlMessage::Resolved`] and [`ControlMessage::Comments`].
pub trait ResolveDispatcher: Send {
    fn resolve(&self, request: RequestId, video_id: &str);
    fn fetch_comments(&self, request: RequestId, video_id: &str);
}

/// Dispatcher that runs a [`Resolver`] on the tokio runtime.
pub struct SpawnResolver<R: Resolver + 'static> {
    resolver: Arc<R>,
    queue: mpsc::UnboundedSender<ControlMessage>,
}

impl<R: Resolver + 'static> SpawnResolver<R> {
    pub fn new(resolver: Arc<R>, queue: mpsc::UnboundedSender<ControlMessage>) -> Self {
        Self { resolver, queue }
    }
}

impl<R: Resolver + 'static> ResolveDispatcher for SpawnResolver<R> {
    fn resolve(&self, request: RequestId, video_id: &str) {
        let resolver = self.resolver.clone();
        let queue = self.queue.clone();
        let video_id = video_id.to_string();
        tokio::spawn(async move {
            log::info!("[{}]Resolving {}", request, video_id);
            let result = resolver.resolve(&video_id).await;
            if let Err(e) = &result {
                log::error!("[{}]Failed to resolve {}: {}", request, video_id, e);
            }
            let _ = queue.send(ControlMessage::Resolved { request, result });
        });
    }

    fn fetch_comments(&self, request: RequestId, video_id: &str) {
        let resolver = self.resolver.clone();
        let queue = self.queue.clone();
        let video_id = video_id.to_string();
        tokio::spawn(async move {
            let comments = resolver.comments(&video_id).await;
            log::debug!("[{}]Fetched {} comments", request, comments.len());
            let _ = queue.send(ControlMessage::Comments { request, comments });
        });
    }
}

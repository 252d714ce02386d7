use crate::errors::SessionError;
use std::fmt;

/// Identifies one playback session of the controller.
///
/// Every backend event is tagged with the session it was produced for, so
/// events that outlive their session can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {}", self.0)
    }
}

/// Immutable description of what to play.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
pub struct StreamSource {
    pub id: String,
    pub title: String,
    pub description: String,
    /// One combined URL, or a `[video, audio]` pair
    pub stream_urls: Vec<String>,
    pub is_live: bool,
    /// The watch page this source was resolved from, used for downloads and sharing
    pub page_url: String,
}

/// The urls of a source as the backend has to load them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTracks {
    Combined(String),
    /// `audio` is loaded as an auxiliary track next to `video`
    Split { video: String, audio: String },
}

impl StreamTracks {
    pub fn primary(&self) -> &str {
        match self {
            StreamTracks::Combined(url) => url,
            StreamTracks::Split { video, .. } => video,
        }
    }

    pub fn auxiliary(&self) -> Option<&str> {
        match self {
            StreamTracks::Combined(_) => None,
            StreamTracks::Split { audio, .. } => Some(audio),
        }
    }

    pub fn is_split(&self) -> bool {
        matches!(self, StreamTracks::Split { .. })
    }
}

impl StreamSource {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        stream_urls: Vec<String>,
        is_live: bool,
        page_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            stream_urls,
            is_live,
            page_url: page_url.into(),
        }
    }

    /// A live source built straight from a manifest url, bypassing the resolver.
    pub fn live_manifest(url: &str) -> Self {
        Self::new(url, "", "", vec![url.to_string()], true, url)
    }

    /// Splits `stream_urls` into the shape the backend loads.
    pub fn tracks(&self) -> Result<StreamTracks, SessionError> {
        match self.stream_urls.as_slice() {
            [] => Err(SessionError::resolution(format!(
                "source {} has no stream urls",
                self.id
            ))),
            [url] => Ok(StreamTracks::Combined(url.clone())),
            [video, audio] => Ok(StreamTracks::Split {
                video: video.clone(),
                audio: audio.clone(),
            }),
            urls => Err(SessionError::resolution(format!(
                "source {} has {} stream urls, expected one or two",
                self.id,
                urls.len()
            ))),
        }
    }
}

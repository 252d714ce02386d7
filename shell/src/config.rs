use std::path::{Path, PathBuf};
use std::time::Duration;

use platform_dirs::AppDirs;
use playback::SyncConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const APP_NAME: &str = "watch-shell";
const CONFIG_FILE: &str = "Conf.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no application directories on this system")]
    NoAppDirs,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Config {
    #[serde(default = "default_home_url")]
    pub home_url: String,
    #[serde(default = "default_video_output")]
    pub video_output: String,
    #[serde(default = "default_audio_output")]
    pub audio_output: String,
    #[serde(default)]
    pub ffmpeg_path: Option<String>,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    #[serde(default = "default_mpv_path")]
    pub mpv_path: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_near_end_margin_ms")]
    pub near_end_margin_ms: u64,
    #[serde(default = "default_track_check_interval_ms")]
    pub track_check_interval_ms: u64,
    #[serde(default = "default_max_comments")]
    pub max_comments: usize,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn app_dirs() -> Option<AppDirs> {
    AppDirs::new(Some(APP_NAME), false)
}

fn data_dir_join(name: &str) -> String {
    app_dirs()
        .map(|dirs| dirs.data_dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
        .to_string_lossy()
        .to_string()
}

fn default_home_url() -> String {
    "https://www.youtube.com".to_string()
}

fn default_video_output() -> String {
    data_dir_join("downloads")
}

fn default_audio_output() -> String {
    data_dir_join("mp3")
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

fn default_mpv_path() -> String {
    "mpv".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_near_end_margin_ms() -> u64 {
    500
}

fn default_track_check_interval_ms() -> u64 {
    5000
}

fn default_max_comments() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            home_url: default_home_url(),
            video_output: default_video_output(),
            audio_output: default_audio_output(),
            ffmpeg_path: None,
            ytdlp_path: default_ytdlp_path(),
            mpv_path: default_mpv_path(),
            poll_interval_ms: default_poll_interval_ms(),
            near_end_margin_ms: default_near_end_margin_ms(),
            track_check_interval_ms: default_track_check_interval_ms(),
            max_comments: default_max_comments(),
            log_level: default_log_level(),
            config_path: PathBuf::new(),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = app_dirs().ok_or(ConfigError::NoAppDirs)?;
        Ok(dirs.config_dir.join(CONFIG_FILE))
    }

    pub fn log_dir() -> Option<PathBuf> {
        app_dirs().map(|dirs| dirs.state_dir)
    }

    /// Loads `path`, or the default location. A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        if let Ok(content) = std::fs::read_to_string(&config_path) {
            let mut config: Config = toml::from_str(&content)?;
            config.config_path = config_path;
            return Ok(config);
        }

        let config = Config {
            config_path,
            ..Config::default()
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let content = toml::to_string(&self)?;
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&self.config_path, content).map_err(|source| ConfigError::Io {
            path: self.config_path.clone(),
            source,
        })
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(10)),
            near_end_margin_ms: self.near_end_margin_ms,
            track_check_interval_ms: self.track_check_interval_ms,
        }
    }

    pub fn output_dir(&self, kind: playback::DownloadKind) -> PathBuf {
        match kind {
            playback::DownloadKind::Video => PathBuf::from(&self.video_output),
            playback::DownloadKind::Audio => PathBuf::from(&self.audio_output),
        }
    }
}

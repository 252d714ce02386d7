use custom_error::custom_error;

use crate::config::ConfigError;

custom_error! {pub ShellError
    ConfigFailed {err: ConfigError} = "Config error: {err}",
    LoggerFailed {err: String} = "Logger init failed: {err}",
    PlayerLaunch {err: String} = "Player launch failed: {err}",
    NotAWatchUrl {url: String} = "Not a watch page url: {url}",
    Resolution {err: playback::SessionError} = "{err}",
    Download {err: String} = "Download failed: {err}",
    Unsupported {what: String} = "Unsupported on this platform: {what}",
    IoError {err: std::io::Error} = "IO error: {err}",
}

impl From<ConfigError> for ShellError {
    fn from(value: ConfigError) -> Self {
        ShellError::ConfigFailed { err: value }
    }
}

impl From<std::io::Error> for ShellError {
    fn from(value: std::io::Error) -> Self {
        ShellError::IoError { err: value }
    }
}

impl From<playback::SessionError> for ShellError {
    fn from(value: playback::SessionError) -> Self {
        ShellError::Resolution { err: value }
    }
}

use playback::{BackendEvent, PlaybackErrorKind};
use serde_json::{json, Value};

/// Properties observed over IPC, by observer id.
const OBSERVED: [(u64, &str); 6] = [
    (1, "time-pos"),
    (2, "duration"),
    (3, "pause"),
    (4, "aid"),
    (5, "track-list"),
    (6, "paused-for-cache"),
];

/// What the player last told us.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlayerStatus {
    pub time_ms: Option<u64>,
    pub length_ms: Option<u64>,
    pub paused: bool,
    pub loaded: bool,
    pub aid: Option<i64>,
    pub audio_tracks: Vec<i64>,
    last_pushed_s: Option<u64>,
}

impl PlayerStatus {
    pub fn reset(&mut self) {
        *self = PlayerStatus::default();
    }

    pub fn is_playing(&self) -> bool {
        self.loaded && !self.paused
    }
}

pub fn encode(command: Value) -> String {
    let mut line = json!({ "command": command }).to_string();
    line.push('\n');
    line
}

pub fn observe_commands() -> Vec<String> {
    OBSERVED
        .iter()
        .map(|(id, name)| encode(json!(["observe_property", id, name])))
        .collect()
}

fn seconds_to_ms(value: &Value) -> Option<u64> {
    value.as_f64().filter(|s| *s >= 0.0).map(|s| (s * 1000.0) as u64)
}

fn classify_file_error(error: &str) -> PlaybackErrorKind {
    let error = error.to_ascii_lowercase();
    if error.contains("403") || error.contains("forbidden") || error.contains("denied") {
        PlaybackErrorKind::AccessDenied
    } else if error.contains("network") || error.contains("timeout") || error.contains("connect") {
        PlaybackErrorKind::Network
    } else if error.contains("format") || error.contains("demux") || error.contains("codec") {
        PlaybackErrorKind::Format
    } else {
        PlaybackErrorKind::Other
    }
}

/// Folds one IPC message into `status`; returns the backend event it implies.
pub fn apply_message(status: &mut PlayerStatus, message: &Value) -> Option<BackendEvent> {
    match message.get("event").and_then(Value::as_str)? {
        "property-change" => {
            let data = message.get("data").unwrap_or(&Value::Null);
            match message.get("name").and_then(Value::as_str)? {
                "time-pos" => {
                    status.time_ms = seconds_to_ms(data);
                    let ms = status.time_ms?;
                    let second = ms / 1000;
                    if status.loaded && status.last_pushed_s != Some(second) {
                        status.last_pushed_s = Some(second);
                        return Some(BackendEvent::PositionChanged(ms));
                    }
                    None
                }
                "duration" => {
                    status.length_ms = seconds_to_ms(data);
                    None
                }
                "pause" => {
                    status.paused = data.as_bool().unwrap_or(false);
                    None
                }
                "aid" => {
                    status.aid = data.as_i64();
                    None
                }
                "track-list" => {
                    status.audio_tracks = data
                        .as_array()
                        .map(|tracks| {
                            tracks
                                .iter()
                                .filter(|t| t.get("type").and_then(Value::as_str) == Some("audio"))
                                .filter_map(|t| t.get("id").and_then(Value::as_i64))
                                .collect()
                        })
                        .unwrap_or_default();
                    None
                }
                "paused-for-cache" => data.as_bool().map(BackendEvent::Buffering),
                _ => None,
            }
        }
        "playback-restart" | "file-loaded" => {
            status.loaded = true;
            Some(BackendEvent::Ready)
        }
        "end-file" => match message.get("reason").and_then(Value::as_str) {
            Some("eof") => {
                status.loaded = false;
                Some(BackendEvent::EndReached)
            }
            Some("error") => {
                status.loaded = false;
                let error = message
                    .get("file_error")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Some(BackendEvent::Error(classify_file_error(error)))
            }
            // stop, quit and redirect are our own doing
            _ => None,
        },
        _ => None,
    }
}

#[cfg(unix)]
pub use ipc::MpvBackend;

#[cfg(unix)]
mod ipc {
    use std::path::PathBuf;
    use std::process::Stdio;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use playback::{BackendEventSink, MediaBackend, SessionError, StreamTracks};
    use serde_json::{json, Value};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
    use tokio::net::UnixStream;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use super::{apply_message, encode, observe_commands, PlayerStatus};
    use crate::errors::ShellError;

    #[derive(Default)]
    struct Shared {
        status: PlayerStatus,
        sink: Option<BackendEventSink>,
    }

    /// mpv driven over its JSON IPC socket. A reader task keeps the status
    /// current and forwards events through the subscribed sink; a writer task
    /// drains queued commands so callers never wait on the socket.
    pub struct MpvBackend {
        _child: tokio::process::Child,
        socket_path: PathBuf,
        commands: mpsc::UnboundedSender<String>,
        reader: JoinHandle<()>,
        shared: Arc<Mutex<Shared>>,
    }

    impl MpvBackend {
        pub async fn launch(mpv_path: &str) -> Result<Self, ShellError> {
            let socket_path =
                std::env::temp_dir().join(format!("watch-shell-mpv-{}.sock", std::process::id()));
            let _ = tokio::fs::remove_file(&socket_path).await;

            let child = tokio::process::Command::new(mpv_path)
                .arg("--idle=yes")
                .arg("--force-window=yes")
                .arg("--keep-open=no")
                .arg("--really-quiet")
                .arg("--title=watch-shell")
                .arg(format!("--input-ipc-server={}", socket_path.display()))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| ShellError::PlayerLaunch {
                    err: format!("{mpv_path}: {e}"),
                })?;

            let mut stream = None;
            for _ in 0..50 {
                match UnixStream::connect(&socket_path).await {
                    Ok(s) => {
                        stream = Some(s);
                        break;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
            let stream = stream.ok_or_else(|| ShellError::PlayerLaunch {
                err: format!("no IPC socket at {}", socket_path.display()),
            })?;
            let (read_half, write_half) = stream.into_split();

            let shared = Arc::new(Mutex::new(Shared::default()));
            let reader = tokio::spawn(read_events(read_half, shared.clone()));
            let (commands, queued) = mpsc::unbounded_channel();
            tokio::spawn(write_commands(write_half, queued));

            let backend = MpvBackend {
                _child: child,
                socket_path,
                commands,
                reader,
                shared,
            };
            for line in observe_commands() {
                backend
                    .queue(line)
                    .map_err(|err| ShellError::PlayerLaunch { err })?;
            }
            log::info!("[mpv]Player ready on {}", backend.socket_path.display());
            Ok(backend)
        }

        fn queue(&self, line: String) -> Result<(), String> {
            self.commands
                .send(line)
                .map_err(|_| "IPC writer stopped".to_string())
        }

        fn send(&self, command: Value) {
            if let Err(e) = self.queue(encode(command)) {
                log::warn!("[mpv]Command dropped: {}", e);
            }
        }

        fn with_status<T>(&self, f: impl FnOnce(&PlayerStatus) -> T) -> Option<T> {
            self.shared.lock().ok().map(|shared| f(&shared.status))
        }
    }

    async fn write_commands(
        mut writer: OwnedWriteHalf,
        mut queued: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(line) = queued.recv().await {
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                log::warn!("[mpv]IPC write failed: {}", e);
                break;
            }
        }
    }

    async fn read_events(reader: OwnedReadHalf, shared: Arc<Mutex<Shared>>) {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    log::warn!("[mpv]IPC read failed: {}", e);
                    break;
                }
            };
            let Ok(message) = serde_json::from_str::<Value>(&line) else {
                log::debug!("[mpv]Unparsed IPC line: {}", line);
                continue;
            };
            if let Some(error) = message.get("error").and_then(Value::as_str) {
                if error != "success" {
                    log::warn!("[mpv]Command failed: {}", error);
                }
            }
            let Ok(mut shared) = shared.lock() else {
                break;
            };
            if let Some(event) = apply_message(&mut shared.status, &message) {
                if let Some(sink) = &shared.sink {
                    sink.send(event);
                }
            }
        }
        log::info!("[mpv]IPC connection closed");
    }

    impl MediaBackend for MpvBackend {
        fn load(&mut self, tracks: &StreamTracks) -> Result<(), SessionError> {
            if let Ok(mut shared) = self.shared.lock() {
                shared.status.reset();
            }
            let audio = match tracks.auxiliary() {
                Some(audio) => json!(["change-list", "audio-files", "set", audio]),
                None => json!(["change-list", "audio-files", "clr", ""]),
            };
            let load = json!(["loadfile", tracks.primary(), "replace"]);
            self.queue(encode(audio))
                .and_then(|_| self.queue(encode(load)))
                .map_err(|e| SessionError::backend_init(format!("mpv {e}")))
        }

        fn play(&mut self) {
            self.send(json!(["set_property", "pause", false]));
        }

        fn pause(&mut self) {
            self.send(json!(["set_property", "pause", true]));
        }

        fn stop(&mut self) {
            self.send(json!(["stop"]));
            if let Ok(mut shared) = self.shared.lock() {
                shared.status.reset();
            }
        }

        fn time_ms(&self) -> Option<u64> {
            self.with_status(|s| s.time_ms).flatten()
        }

        fn length_ms(&self) -> Option<u64> {
            self.with_status(|s| s.length_ms).flatten()
        }

        fn set_time_ms(&mut self, ms: u64) {
            self.send(json!(["seek", ms as f64 / 1000.0, "absolute"]));
        }

        fn is_playing(&self) -> bool {
            self.with_status(PlayerStatus::is_playing).unwrap_or(false)
        }

        fn audio_track(&self) -> Option<i64> {
            self.with_status(|s| s.aid).flatten()
        }

        fn audio_tracks(&self) -> Vec<i64> {
            self.with_status(|s| s.audio_tracks.clone())
                .unwrap_or_default()
        }

        fn set_audio_track(&mut self, track: i64) {
            self.send(json!(["set_property", "aid", track]));
        }

        fn set_volume(&mut self, volume: u8) {
            self.send(json!(["set_property", "volume", volume]));
        }

        fn set_muted(&mut self, muted: bool) {
            self.send(json!(["set_property", "mute", muted]));
        }

        fn subscribe(&mut self, sink: BackendEventSink) {
            if let Ok(mut shared) = self.shared.lock() {
                shared.sink = Some(sink);
            }
        }

        fn unsubscribe(&mut self) {
            if let Ok(mut shared) = self.shared.lock() {
                shared.sink = None;
            }
        }
    }

    impl Drop for MpvBackend {
        fn drop(&mut self) {
            // the writer task flushes this, then ends with the channel
            let _ = self.commands.send(encode(json!(["quit"])));
            self.reader.abort();
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }

}

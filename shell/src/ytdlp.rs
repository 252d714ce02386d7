use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use playback::resolver::{top_comments, watch_page_url};
use playback::{Comment, DownloadBackend, DownloadKind, Resolver, SessionError, StreamSource, VideoInfo};

use crate::config::Config;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x08000000;
#[cfg(target_os = "windows")]
#[allow(unused_imports)]
use std::os::windows::process::CommandExt;

/// Format asked for when resolving a watch page for playback.
pub const PLAYBACK_FORMAT: &str =
    "bestvideo[height<=?1080][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

fn command(program: &str) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    #[cfg(target_os = "windows")]
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Runs a command to completion and returns its stdout, or the last stderr
/// line on failure.
async fn run(mut cmd: tokio::process::Command) -> Result<String, String> {
    let output = cmd.output().await.map_err(|e| e.to_string())?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no output")
            .trim()
            .to_string();
        return Err(format!("{} ({})", reason, output.status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

pub struct YtDlpResolver {
    ytdlp_path: String,
    max_comments: usize,
}

impl YtDlpResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            max_comments: config.max_comments,
        }
    }

    async fn dump_json(&self, args: &[&str], video_id: &str) -> Result<VideoInfo, String> {
        let mut cmd = command(&self.ytdlp_path);
        cmd.args(["--dump-single-json", "--no-warnings"])
            .args(args)
            .arg(watch_page_url(video_id));
        let stdout = run(cmd).await?;
        serde_json::from_str(&stdout).map_err(|e| format!("unexpected yt-dlp output: {e}"))
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, video_id: &str) -> Result<StreamSource, SessionError> {
        let info = self
            .dump_json(&["-f", PLAYBACK_FORMAT], video_id)
            .await
            .map_err(SessionError::resolution)?;
        log::info!(
            "[{}]Resolved \"{}\" (live: {}, {} requested formats)",
            video_id,
            info.title,
            info.is_live(),
            info.requested_formats.len()
        );
        info.into_source(&watch_page_url(video_id))
    }

    async fn comments(&self, video_id: &str) -> Vec<Comment> {
        match self.dump_json(&["--write-comments"], video_id).await {
            Ok(info) => top_comments(info.comments, self.max_comments),
            Err(e) => {
                log::warn!("[{}]Failed to fetch comments: {}", video_id, e);
                Vec::new()
            }
        }
    }
}

/// Looks `program` up on `PATH`.
fn find_on_path(program: &str) -> Option<PathBuf> {
    let mut name = PathBuf::from(program);
    if cfg!(windows) {
        name.set_extension("exe");
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(&name))
        .find(|candidate| candidate.is_file())
}

pub struct YtDlpDownloader {
    ytdlp_path: String,
    ffmpeg_path: Option<String>,
}

impl YtDlpDownloader {
    pub fn new(config: &Config) -> Self {
        Self {
            ytdlp_path: config.ytdlp_path.clone(),
            ffmpeg_path: config.ffmpeg_path.clone(),
        }
    }

    /// The converter to hand to yt-dlp, or the path that was looked for.
    fn ffmpeg(&self) -> Result<PathBuf, String> {
        match &self.ffmpeg_path {
            Some(path) if Path::new(path).is_file() => Ok(PathBuf::from(path)),
            Some(path) => Err(path.clone()),
            None => find_on_path("ffmpeg").ok_or_else(|| "ffmpeg (PATH)".to_string()),
        }
    }

    /// yt-dlp arguments for one download, without the url.
    pub fn download_args(kind: DownloadKind, output_dir: &Path, ffmpeg: &Path) -> Vec<String> {
        let template = output_dir.join("%(title)s.%(ext)s");
        let mut args: Vec<String> = vec![
            "--no-warnings".into(),
            "--no-progress".into(),
            "--ffmpeg-location".into(),
            ffmpeg.to_string_lossy().to_string(),
            "-o".into(),
            template.to_string_lossy().to_string(),
            "--print".into(),
            "after_move:filepath".into(),
        ];
        match kind {
            DownloadKind::Video => args.extend(
                [
                    "-f",
                    "best",
                    "--recode-video",
                    "mp4",
                    "--write-thumbnail",
                    "--keep-video",
                ]
                .map(String::from),
            ),
            DownloadKind::Audio => args.extend(
                [
                    "-f",
                    "bestaudio/best",
                    "--extract-audio",
                    "--audio-format",
                    "mp3",
                    "--audio-quality",
                    "320K",
                ]
                .map(String::from),
            ),
        }
        args
    }
}

#[async_trait]
impl DownloadBackend for YtDlpDownloader {
    fn check_prerequisites(&self, _kind: DownloadKind) -> Result<(), String> {
        self.ffmpeg().map(|_| ())
    }

    async fn fetch(
        &self,
        url: &str,
        kind: DownloadKind,
        output_dir: &Path,
    ) -> Result<PathBuf, String> {
        let ffmpeg = self.ffmpeg().map_err(|path| format!("ffmpeg not found at {path}"))?;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| format!("failed to create {}: {}", output_dir.display(), e))?;

        let mut cmd = command(&self.ytdlp_path);
        cmd.args(Self::download_args(kind, output_dir, &ffmpeg)).arg(url);
        let stdout = run(cmd).await?;
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| "yt-dlp did not report an output file".to_string())
    }
}

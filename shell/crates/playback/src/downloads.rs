use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::errors::DownloadError;
use crate::events::{ControlMessage, ShellEvent};

pub type JobId = String;

/// Finished jobs kept for lookup; older ones are forgotten.
pub const FINISHED_JOB_HISTORY: usize = 50;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    /// Full video, converted to mp4
    Video,
    /// Audio only, extracted to mp3
    Audio,
}

impl DownloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadKind::Video => "video",
            DownloadKind::Audio => "audio",
        }
    }
}

impl fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadJob {
    pub job_id: JobId,
    pub source_url: String,
    pub kind: DownloadKind,
    pub status: DownloadStatus,
    pub output_path: Option<PathBuf>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DownloadJob {
    fn new(source_url: &str, kind: DownloadKind) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            source_url: source_url.to_string(),
            kind,
            status: DownloadStatus::Queued,
            output_path: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            DownloadStatus::Succeeded | DownloadStatus::Failed
        )
    }
}

/// The external downloader.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    /// Checks that the converter a kind needs is present. `Err` carries the
    /// path that was looked up.
    fn check_prerequisites(&self, kind: DownloadKind) -> Result<(), String>;
    /// Downloads `url` into `output_dir` and returns the written file.
    async fn fetch(&self, url: &str, kind: DownloadKind, output_dir: &Path)
        -> Result<PathBuf, String>;
}

/// The per-kind download button.
pub trait DownloadAffordance: Send {
    fn set_enabled(&mut self, kind: DownloadKind, enabled: bool);
}

/// Runs downloads off the control thread and reports them back through the
/// control queue. Jobs of different kinds run independently.
pub struct DownloadJobManager {
    backend: Arc<dyn DownloadBackend>,
    video_dir: PathBuf,
    audio_dir: PathBuf,
    affordance: Box<dyn DownloadAffordance>,
    jobs: HashMap<JobId, DownloadJob>,
    running: HashMap<JobId, JoinHandle<()>>,
    finished: VecDeque<JobId>,
    queue: mpsc::UnboundedSender<ControlMessage>,
    event_channel: broadcast::Sender<ShellEvent>,
}

impl DownloadJobManager {
    pub fn new(
        backend: Arc<dyn DownloadBackend>,
        video_dir: PathBuf,
        audio_dir: PathBuf,
        affordance: Box<dyn DownloadAffordance>,
        queue: mpsc::UnboundedSender<ControlMessage>,
        event_channel: broadcast::Sender<ShellEvent>,
    ) -> Self {
        Self {
            backend,
            video_dir,
            audio_dir,
            affordance,
            jobs: HashMap::new(),
            running: HashMap::new(),
            finished: VecDeque::new(),
            queue,
            event_channel,
        }
    }

    pub fn output_dir(&self, kind: DownloadKind) -> &Path {
        match kind {
            DownloadKind::Video => &self.video_dir,
            DownloadKind::Audio => &self.audio_dir,
        }
    }

    fn in_flight(&self, url: &str, kind: DownloadKind) -> bool {
        self.jobs
            .values()
            .any(|j| !j.is_finished() && j.kind == kind && j.source_url == url)
    }

    /// Starts a download. A missing converter fails the job right away; the
    /// returned id still names it.
    pub fn submit(&mut self, url: &str, kind: DownloadKind) -> Result<JobId, DownloadError> {
        if self.in_flight(url, kind) {
            log::warn!("[download]{} {} is already running", kind, url);
            return Err(DownloadError::AlreadyRunning {
                url: url.to_string(),
                kind,
            });
        }

        let job = DownloadJob::new(url, kind);
        let job_id = job.job_id.clone();
        self.affordance.set_enabled(kind, false);
        self.jobs.insert(job_id.clone(), job.clone());
        let _ = self.event_channel.send(ShellEvent::DownloadStarted { job });

        if let Err(path) = self.backend.check_prerequisites(kind) {
            log::error!("[download]Converter missing at {}, {} skipped", path, job_id);
            self.on_finished(&job_id, Err(DownloadError::MissingConverter { path }));
            return Ok(job_id);
        }

        log::info!("[download]Starting {} {} for {}", kind, job_id, url);
        let backend = self.backend.clone();
        let queue = self.queue.clone();
        let output_dir = self.output_dir(kind).to_path_buf();
        let url = url.to_string();
        let task_id = job_id.clone();
        let handle = tokio::spawn(async move {
            let result = backend
                .fetch(&url, kind, &output_dir)
                .await
                .map_err(|message| DownloadError::Failed { message });
            if queue
                .send(ControlMessage::DownloadFinished {
                    job_id: task_id.clone(),
                    result,
                })
                .is_err()
            {
                log::warn!("[download]Control loop gone before {} finished", task_id);
            }
        });
        self.running.insert(job_id.clone(), handle);
        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.status = DownloadStatus::Running;
        }
        Ok(job_id)
    }

    /// Applies a finished download. Only the first result for a job counts.
    pub fn on_finished(&mut self, job_id: &str, result: Result<PathBuf, DownloadError>) {
        self.running.remove(job_id);
        let Some(job) = self.jobs.get_mut(job_id) else {
            log::warn!("[download]Result for unknown job {}", job_id);
            return;
        };
        if job.is_finished() {
            return;
        }
        match result {
            Ok(path) => {
                log::info!("[download]{} saved to {}", job_id, path.display());
                job.status = DownloadStatus::Succeeded;
                job.output_path = Some(path);
            }
            Err(e) => {
                log::error!("[download]{} failed: {}", job_id, e);
                job.status = DownloadStatus::Failed;
                job.error_message = Some(e.to_string());
            }
        }
        let job = job.clone();
        let kind = job.kind;
        let _ = self.event_channel.send(ShellEvent::DownloadFinished { job });
        self.affordance.set_enabled(kind, true);

        self.finished.push_back(job_id.to_string());
        while self.finished.len() > FINISHED_JOB_HISTORY {
            if let Some(oldest) = self.finished.pop_front() {
                self.jobs.remove(&oldest);
            }
        }
    }

    pub fn job(&self, job_id: &str) -> Option<&DownloadJob> {
        self.jobs.get(job_id)
    }

    /// All jobs, oldest first.
    pub fn jobs(&self) -> Vec<&DownloadJob> {
        let mut jobs: Vec<_> = self.jobs.values().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    /// Aborts every running download, used on shutdown.
    pub fn abort_all(&mut self) {
        for (job_id, handle) in self.running.drain() {
            log::info!("[download]Aborting {}", job_id);
            handle.abort();
        }
    }
}

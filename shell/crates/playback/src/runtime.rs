use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::backend::MediaBackend;
use crate::events::ControlMessage;
use crate::router::NavigationRouter;

/// The single control task. Everything that touches playback state runs here,
/// one message or one poll tick at a time.
pub struct ControlLoop<B: MediaBackend> {
    router: NavigationRouter<B>,
    queue: mpsc::UnboundedReceiver<ControlMessage>,
    poll_interval: Duration,
}

impl<B: MediaBackend> ControlLoop<B> {
    pub fn new(
        router: NavigationRouter<B>,
        queue: mpsc::UnboundedReceiver<ControlMessage>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            router,
            queue,
            poll_interval,
        }
    }

    pub fn router(&self) -> &NavigationRouter<B> {
        &self.router
    }

    /// Handles one message. Returns false on shutdown.
    pub fn dispatch(&mut self, message: ControlMessage) -> bool {
        match message {
            ControlMessage::Navigation(url) => self.router.on_navigation(&url),
            ControlMessage::Backend { session, event } => {
                self.router.on_backend_event(session, event)
            }
            ControlMessage::Resolved { request, result } => self.router.on_resolved(request, result),
            ControlMessage::Comments { request, comments } => {
                self.router.on_comments(request, comments)
            }
            ControlMessage::DownloadFinished { job_id, result } => {
                self.router.downloads_mut().on_finished(&job_id, result)
            }
            ControlMessage::User(action) => self.router.handle_user(action),
            ControlMessage::Shutdown => return false,
        }
        true
    }

    /// Runs until [`ControlMessage::Shutdown`] or until every sender is gone.
    /// Returns the router so callers can inspect the final state.
    pub async fn run(mut self) -> NavigationRouter<B> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log::info!("[control]Loop started, polling every {:?}", self.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.router.on_poll_tick(),
                message = self.queue.recv() => {
                    let Some(message) = message else {
                        log::warn!("[control]Queue closed");
                        break;
                    };
                    if !self.dispatch(message) {
                        break;
                    }
                }
            }
        }

        self.router.controller_mut().stop();
        self.router.downloads_mut().abort_all();
        log::info!("[control]Loop stopped");
        self.router
    }
}

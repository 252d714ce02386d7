use tokio::sync::{broadcast, mpsc};

use crate::backend::{BackendEvent, BackendEventSink, MediaBackend, PlaybackErrorKind};
use crate::errors::SessionError;
use crate::events::{ControlMessage, ShellEvent};
use crate::source::{SessionId, StreamSource};
use crate::state::{PlaybackState, PositionSample};
use crate::sync::{PositionSync, SampleOutcome, SyncConfig};

/// How a session finished. Returned exactly once per session.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    Ended,
    Errored(SessionError),
}

struct Session {
    id: SessionId,
    source: StreamSource,
    sync: PositionSync,
}

/// The playback state machine.
///
/// Owned by the control thread. Backend callbacks never reach it directly:
/// they arrive as [`ControlMessage::Backend`] and are routed through
/// [`PlaybackController::handle_backend_event`].
pub struct PlaybackController<B: MediaBackend> {
    backend: B,
    state: PlaybackState,
    session: Option<Session>,
    last_session: u64,
    sync_config: SyncConfig,
    /// The poll timer; ticks are ignored while false
    polling: bool,
    queue: mpsc::UnboundedSender<ControlMessage>,
    event_channel: broadcast::Sender<ShellEvent>,
    volume: u8,
    muted: bool,
}

impl<B: MediaBackend> PlaybackController<B> {
    pub fn new(
        backend: B,
        sync_config: SyncConfig,
        queue: mpsc::UnboundedSender<ControlMessage>,
        event_channel: broadcast::Sender<ShellEvent>,
    ) -> Self {
        Self {
            backend,
            state: PlaybackState::Idle,
            session: None,
            last_session: 0,
            sync_config,
            polling: false,
            queue,
            event_channel,
            volume: 100,
            muted: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn source(&self) -> Option<&StreamSource> {
        self.session.as_ref().map(|s| &s.source)
    }

    pub fn displayed(&self) -> Option<PositionSample> {
        self.session.as_ref().and_then(|s| s.sync.displayed())
    }

    pub fn is_polling(&self) -> bool {
        self.polling
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn emit(&self, event: ShellEvent) {
        // no subscribers is fine
        let _ = self.event_channel.send(event);
    }

    fn log_prefix(&self) -> String {
        match self.session_id() {
            Some(id) => format!("[{id}]"),
            None => "[no session]".to_string(),
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        log::debug!("{}State {} -> {}", self.log_prefix(), self.state, state);
        self.state = state;
        self.emit(ShellEvent::StateChanged {
            session: self.session_id(),
            state,
        });
    }

    /// Starts a new session, tearing down the current one first.
    pub fn start(&mut self, source: StreamSource) -> Result<SessionId, SessionError> {
        let tracks = match source.tracks() {
            Ok(tracks) => tracks,
            Err(e) => {
                log::error!("{}Refused to start {}: {}", self.log_prefix(), source.id, e);
                self.stop();
                return Err(e);
            }
        };

        self.teardown();
        if self.state != PlaybackState::Idle {
            self.set_state(PlaybackState::Idle);
        }

        self.last_session += 1;
        let id = SessionId(self.last_session);
        self.session = Some(Session {
            id,
            sync: PositionSync::new(self.sync_config.clone(), source.is_live),
            source,
        });
        self.set_state(PlaybackState::Loading);
        log::info!(
            "[{}]Loading {} (split: {}, live: {})",
            id,
            self.source().map(|s| s.id.as_str()).unwrap_or_default(),
            tracks.is_split(),
            self.source().is_some_and(|s| s.is_live)
        );

        self.backend
            .subscribe(BackendEventSink::new(id, self.queue.clone()));
        if let Err(e) = self.backend.load(&tracks) {
            log::error!("[{}]Backend failed to load: {}", id, e);
            self.teardown();
            self.set_state(PlaybackState::Idle);
            return Err(e);
        }
        self.backend.set_volume(self.volume);
        self.backend.set_muted(self.muted);
        self.backend.play();
        self.polling = true;
        Ok(id)
    }

    /// Stops backend playback, cancels the poll timer and detaches from
    /// backend events. Leaves `state` alone.
    fn teardown(&mut self) {
        if self.session.is_none() && !self.polling {
            return;
        }
        self.polling = false;
        self.backend.stop();
        self.backend.unsubscribe();
        if let Some(session) = self.session.take() {
            log::info!("[{}]Session torn down in state {}", session.id, self.state);
        }
    }

    /// Back to `Idle` from any state. Idempotent.
    pub fn stop(&mut self) {
        self.teardown();
        self.set_state(PlaybackState::Idle);
    }

    pub fn toggle_play_pause(&mut self) {
        match self.state {
            PlaybackState::Playing | PlaybackState::Buffering => {
                self.backend.pause();
                self.set_state(PlaybackState::Paused);
            }
            PlaybackState::Paused => {
                self.backend.play();
                self.set_state(PlaybackState::Playing);
            }
            state => {
                log::debug!("{}Play/pause ignored in {}", self.log_prefix(), state);
            }
        }
    }

    pub fn seek_relative(&mut self, offset_ms: i64) -> Option<u64> {
        if !self.state.relays_position() {
            return None;
        }
        let current = self
            .backend
            .time_ms()
            .or_else(|| self.displayed().map(|s| s.current_ms))
            .unwrap_or(0);
        self.commit_seek(current, offset_ms)
    }

    pub fn seek_absolute(&mut self, ms: u64) -> Option<u64> {
        if !self.state.relays_position() {
            return None;
        }
        self.commit_seek(ms, 0)
    }

    /// Commits `from + offset_ms`, clamped to the known length.
    fn commit_seek(&mut self, from: u64, offset_ms: i64) -> Option<u64> {
        let length = self.backend.length_ms();
        let session = self.session.as_mut()?;
        if let Some(length) = length {
            session.sync.observe_length(length);
        }
        let target = session.sync.clamp_offset(from, offset_ms);
        let sample = session.sync.commit(target);
        self.backend.set_time_ms(target);
        self.emit(ShellEvent::SeekCommitted { ms: target });
        self.emit(ShellEvent::PositionChanged { sample });
        Some(target)
    }

    /// Scrub phase one. Only from `Playing`, `Paused` or `Buffering`.
    pub fn scrub_begin(&mut self) -> bool {
        if !self.state.relays_position() {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if !session.sync.begin_scrub() {
            return false;
        }
        self.set_state(PlaybackState::Scrubbing);
        true
    }

    /// Scrub phase two: moves the backend cursor and echoes the label only.
    pub fn scrub_drag(&mut self, ms: u64) -> Option<u64> {
        if self.state != PlaybackState::Scrubbing {
            return None;
        }
        let target = self.session.as_mut()?.sync.drag(ms)?;
        self.backend.set_time_ms(target);
        self.emit(ShellEvent::ScrubPreview { ms: target });
        Some(target)
    }

    /// Scrub phase three: commits the released value and resumes playback.
    pub fn scrub_end(&mut self, ms: u64) -> Option<u64> {
        if self.state != PlaybackState::Scrubbing {
            return None;
        }
        let target = self.session.as_mut()?.sync.end_scrub(ms)?;
        self.backend.set_time_ms(target);
        if !self.backend.is_playing() {
            self.backend.play();
        }
        self.set_state(PlaybackState::Playing);
        self.emit(ShellEvent::SeekCommitted { ms: target });
        if let Some(sample) = self.displayed() {
            self.emit(ShellEvent::PositionChanged { sample });
        }
        Some(target)
    }

    /// One tick of the poll timer. Runs on the control thread.
    pub fn on_poll_tick(&mut self) -> Option<Terminal> {
        if !self.polling {
            return None;
        }
        let state = self.state;
        if self.session.as_mut()?.sync.track_check_due(state) {
            self.check_audio_track();
        }

        if self.state == PlaybackState::Loading && self.backend.is_playing() {
            // some backends never report readiness on their own
            self.on_backend_ready();
        }
        if !self.state.relays_position() {
            return None;
        }

        let current = self.backend.time_ms()?;
        let total = self.backend.length_ms().unwrap_or(0);
        self.apply_sample(PositionSample::new(current, total))
    }

    fn check_audio_track(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(track) = self.backend.audio_track() {
            log::debug!("[{}]Audio track {} active", session.id, track);
            session.sync.finish_track_check();
            return;
        }
        if let Some(first) = self.backend.audio_tracks().first().copied() {
            log::warn!(
                "[{}]No audio track selected, selecting track {}",
                session.id,
                first
            );
            self.backend.set_audio_track(first);
            session.sync.finish_track_check();
        }
    }

    fn apply_sample(&mut self, sample: PositionSample) -> Option<Terminal> {
        let state = self.state;
        let outcome = self.session.as_mut()?.sync.accept(state, sample);
        match outcome {
            SampleOutcome::Dropped => None,
            SampleOutcome::Displayed(sample) => {
                self.emit(ShellEvent::PositionChanged { sample });
                None
            }
            SampleOutcome::NearEnd(sample) => {
                self.emit(ShellEvent::PositionChanged { sample });
                log::info!(
                    "{}Reached {} of {}, treating as end of stream",
                    self.log_prefix(),
                    sample.current_ms,
                    sample.total_ms
                );
                self.finish(Terminal::Ended)
            }
        }
    }

    pub fn on_position_event(&mut self, ms: u64) -> Option<Terminal> {
        self.apply_sample(PositionSample::new(ms, 0))
    }

    pub fn on_backend_ready(&mut self) {
        if self.state == PlaybackState::Loading {
            self.set_state(PlaybackState::Playing);
        }
    }

    pub fn on_buffering(&mut self, active: bool) {
        match (self.state, active) {
            (PlaybackState::Playing, true) => self.set_state(PlaybackState::Buffering),
            (PlaybackState::Buffering, false) => self.set_state(PlaybackState::Playing),
            _ => {}
        }
    }

    /// End of stream. Repeated calls after the first are no-ops.
    pub fn on_backend_end_reached(&mut self) -> Option<Terminal> {
        if matches!(
            self.state,
            PlaybackState::Idle | PlaybackState::Ended | PlaybackState::Errored
        ) {
            log::debug!("{}End reached ignored in {}", self.log_prefix(), self.state);
            return None;
        }
        self.finish(Terminal::Ended)
    }

    pub fn on_backend_error(&mut self, kind: PlaybackErrorKind) -> Option<Terminal> {
        if matches!(
            self.state,
            PlaybackState::Idle | PlaybackState::Ended | PlaybackState::Errored
        ) {
            log::debug!("{}Backend error {} ignored in {}", self.log_prefix(), kind, self.state);
            return None;
        }
        self.finish(Terminal::Errored(SessionError::Playback(kind)))
    }

    fn finish(&mut self, terminal: Terminal) -> Option<Terminal> {
        let id = self.session_id()?;
        self.polling = false;
        if let Some(session) = self.session.as_mut() {
            session.sync.cancel_scrub();
        }
        match &terminal {
            Terminal::Ended => {
                log::info!("[{}]Playback ended", id);
                self.set_state(PlaybackState::Ended);
                self.emit(ShellEvent::Ended { session: id });
            }
            Terminal::Errored(error) => {
                log::error!("[{}]Playback failed: {}", id, error);
                self.set_state(PlaybackState::Errored);
                self.emit(ShellEvent::Errored {
                    session: id,
                    error: error.clone(),
                });
            }
        }
        Some(terminal)
    }

    /// Routes a marshalled backend event. Events of any other session are dropped.
    pub fn handle_backend_event(
        &mut self,
        session: SessionId,
        event: BackendEvent,
    ) -> Option<Terminal> {
        if self.session_id() != Some(session) {
            log::debug!(
                "{}Dropped {:?} from stale {}",
                self.log_prefix(),
                event,
                session
            );
            return None;
        }
        match event {
            BackendEvent::Ready => {
                self.on_backend_ready();
                None
            }
            BackendEvent::EndReached => self.on_backend_end_reached(),
            BackendEvent::Error(kind) => self.on_backend_error(kind),
            BackendEvent::PositionChanged(ms) => self.on_position_event(ms),
            BackendEvent::Buffering(active) => {
                self.on_buffering(active);
                None
            }
        }
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        self.backend.set_volume(self.volume);
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        self.backend.set_muted(self.muted);
        self.muted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{channels, drain, vod_source, FakeBackend};

    struct Harness {
        controller: PlaybackController<FakeBackend>,
        backend: FakeBackend,
        queue: mpsc::UnboundedReceiver<ControlMessage>,
        events: broadcast::Receiver<ShellEvent>,
    }

    fn harness() -> Harness {
        let (tx, queue, event_tx, events) = channels();
        let backend = FakeBackend::default();
        let controller =
            PlaybackController::new(backend.clone(), SyncConfig::default(), tx, event_tx);
        Harness {
            controller,
            backend,
            queue,
            events,
        }
    }

    fn playing(h: &mut Harness, source: StreamSource) -> SessionId {
        let id = h.controller.start(source).unwrap();
        h.controller.on_backend_ready();
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        id
    }

    fn terminal_count(events: &[ShellEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ShellEvent::Ended { .. } | ShellEvent::Errored { .. }))
            .count()
    }

    #[test]
    fn test_start_loads_and_waits_for_ready() {
        let mut h = harness();
        let id = h.controller.start(vod_source("a", 1)).unwrap();
        assert_eq!(h.controller.state(), PlaybackState::Loading);
        assert!(h.controller.is_polling());
        assert_eq!(
            h.backend.calls(),
            vec![
                "subscribe 1",
                "load https://cdn.example/a/0",
                "set_volume 100",
                "set_muted false",
                "play"
            ]
        );

        h.controller.toggle_play_pause();
        assert_eq!(h.controller.state(), PlaybackState::Loading);

        h.controller.handle_backend_event(id, BackendEvent::Ready);
        assert_eq!(h.controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_split_source_loads_auxiliary_audio() {
        let mut h = harness();
        h.controller.start(vod_source("split", 2)).unwrap();
        let loaded = h.backend.log.lock().unwrap().loaded.clone().unwrap();
        assert_eq!(loaded.auxiliary(), Some("https://cdn.example/split/1"));
    }

    #[test]
    fn test_start_with_empty_urls_stops_previous_session() {
        let mut h = harness();
        playing(&mut h, vod_source("b", 1));
        h.backend.clear_calls();

        let err = h.controller.start(vod_source("empty", 0)).unwrap_err();
        assert!(matches!(err, SessionError::Resolution { .. }));
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert!(!h.controller.is_polling());
        assert_eq!(h.backend.calls(), vec!["stop", "unsubscribe"]);
    }

    #[test]
    fn test_backend_init_failure_leaves_idle() {
        let mut h = harness();
        h.backend.log.lock().unwrap().fail_load = true;
        let err = h.controller.start(vod_source("a", 1)).unwrap_err();
        assert!(matches!(err, SessionError::BackendInit { .. }));
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.controller.session_id(), None);
        assert!(!h.controller.is_polling());
    }

    // Scenario D
    #[test]
    fn test_start_tears_down_previous_session_first() {
        let mut h = harness();
        let first = playing(&mut h, vod_source("b", 1));
        h.backend.clear_calls();
        drain(&mut h.events);

        let second = h.controller.start(vod_source("a", 1)).unwrap();
        assert_ne!(first, second);

        let calls = h.backend.calls();
        let stop = calls.iter().position(|c| c == "stop").unwrap();
        let unsubscribe = calls.iter().position(|c| c == "unsubscribe").unwrap();
        let load = calls.iter().position(|c| c.starts_with("load")).unwrap();
        assert!(stop < load && unsubscribe < load);

        let states: Vec<_> = drain(&mut h.events)
            .into_iter()
            .filter_map(|e| match e {
                ShellEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![PlaybackState::Idle, PlaybackState::Loading]);

        // a late event from the old session cannot touch the new one
        assert!(h
            .controller
            .handle_backend_event(first, BackendEvent::EndReached)
            .is_none());
        assert_eq!(h.controller.state(), PlaybackState::Loading);
    }

    #[test]
    fn test_toggle_play_pause() {
        let mut h = harness();
        playing(&mut h, vod_source("a", 1));
        h.controller.toggle_play_pause();
        assert_eq!(h.controller.state(), PlaybackState::Paused);
        assert!(!h.backend.is_playing());
        h.controller.toggle_play_pause();
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert!(h.backend.is_playing());
    }

    #[test]
    fn test_seeks_are_clamped_to_known_length() {
        let mut h = harness();
        playing(&mut h, vod_source("a", 1));
        h.backend.set_position(30_000, 600_000);

        assert_eq!(h.controller.seek_relative(-60_000), Some(0));
        assert_eq!(h.controller.seek_absolute(700_000), Some(600_000));
        assert_eq!(h.controller.seek_relative(10_000), Some(600_000));
        assert_eq!(h.controller.seek_absolute(42_000), Some(42_000));
        assert_eq!(h.backend.time_ms(), Some(42_000));
    }

    #[test]
    fn test_live_seek_only_clamps_at_zero() {
        let mut h = harness();
        let mut source = vod_source("live", 1);
        source.is_live = true;
        playing(&mut h, source);
        h.backend.set_position(5_000, 0);

        assert_eq!(h.controller.seek_relative(-10_000), Some(0));
        assert_eq!(h.controller.seek_absolute(9_000_000), Some(9_000_000));
        assert_eq!(h.controller.seek_relative(i64::MIN), Some(0));
    }

    #[test]
    fn test_extreme_seeks_stay_within_length() {
        let mut h = harness();
        playing(&mut h, vod_source("a", 1));
        h.backend.set_position(30_000, 600_000);

        assert_eq!(h.controller.seek_absolute(u64::MAX), Some(600_000));
        assert_eq!(h.controller.seek_relative(i64::MAX), Some(600_000));
        assert_eq!(h.controller.seek_relative(i64::MIN), Some(0));

        assert!(h.controller.scrub_begin());
        assert_eq!(h.controller.scrub_drag(u64::MAX), Some(600_000));
        assert_eq!(h.controller.scrub_end(u64::MAX), Some(600_000));
        assert_eq!(h.backend.time_ms(), Some(600_000));
    }

    // Scenario C
    #[test]
    fn test_scrub_commits_released_value_once() {
        let mut h = harness();
        playing(&mut h, vod_source("a", 1));
        h.backend.set_position(10_000, 600_000);
        h.controller.on_poll_tick();
        drain(&mut h.events);

        assert!(h.controller.scrub_begin());
        assert_eq!(h.controller.state(), PlaybackState::Scrubbing);
        for ms in [20_000, 60_000, 90_000] {
            assert_eq!(h.controller.scrub_drag(ms), Some(ms));
            // the backend keeps pushing while the user drags
            h.backend.set_position(ms + 100, 600_000);
            assert!(h.controller.on_poll_tick().is_none());
            h.controller.on_position_event(ms + 200);
            assert_eq!(h.controller.displayed().unwrap().current_ms, 10_000);
        }
        h.controller.toggle_play_pause();
        assert_eq!(h.controller.state(), PlaybackState::Scrubbing);

        assert_eq!(h.controller.scrub_end(120_000), Some(120_000));
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert_eq!(h.backend.time_ms(), Some(120_000));
        assert_eq!(h.controller.displayed().unwrap().current_ms, 120_000);

        let events = drain(&mut h.events);
        let commits: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ShellEvent::SeekCommitted { ms } => Some(*ms),
                _ => None,
            })
            .collect();
        assert_eq!(commits, vec![120_000]);
        let previews = events
            .iter()
            .filter(|e| matches!(e, ShellEvent::ScrubPreview { .. }))
            .count();
        assert_eq!(previews, 3);
        assert!(!events
            .iter()
            .any(|e| matches!(e, ShellEvent::PositionChanged { sample } if sample.current_ms != 120_000)));
    }

    #[test]
    fn test_scrub_end_resumes_paused_playback() {
        let mut h = harness();
        playing(&mut h, vod_source("a", 1));
        h.controller.toggle_play_pause();
        assert!(h.controller.scrub_begin());
        h.controller.scrub_end(5_000);
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert!(h.backend.is_playing());
    }

    #[test]
    fn test_scrub_needs_loaded_session() {
        let mut h = harness();
        assert!(!h.controller.scrub_begin());
        h.controller.start(vod_source("a", 1)).unwrap();
        assert!(!h.controller.scrub_begin());
        assert_eq!(h.controller.scrub_end(1_000), None);
    }

    // Scenario A
    #[test]
    fn test_near_end_forces_ended_without_end_event() {
        let mut h = harness();
        let id = playing(&mut h, vod_source("a", 1));
        h.backend.set_position(599_600, 600_000);

        assert_eq!(h.controller.on_poll_tick(), Some(Terminal::Ended));
        assert_eq!(h.controller.state(), PlaybackState::Ended);
        assert!(!h.controller.is_polling());

        // the real end callback arriving later is absorbed
        assert!(h
            .controller
            .handle_backend_event(id, BackendEvent::EndReached)
            .is_none());
        assert_eq!(terminal_count(&drain(&mut h.events)), 1);
    }

    // Scenario B
    #[test]
    fn test_live_polls_never_end_session() {
        let mut h = harness();
        let mut source = vod_source("live", 1);
        source.is_live = true;
        playing(&mut h, source);

        for i in 0..50u64 {
            h.backend.set_position(i * 1_000, 1_000);
            assert!(h.controller.on_poll_tick().is_none());
        }
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert_eq!(h.controller.displayed().unwrap().total_ms, 0);
    }

    #[test]
    fn test_repeated_end_reached_notifies_once() {
        let mut h = harness();
        let id = playing(&mut h, vod_source("a", 1));
        let sink = h.backend.sink().unwrap();
        for _ in 0..5 {
            sink.end_reached();
        }

        let mut terminals = Vec::new();
        while let Ok(message) = h.queue.try_recv() {
            if let ControlMessage::Backend { session, event } = message {
                assert_eq!(session, id);
                terminals.extend(h.controller.handle_backend_event(session, event));
            }
        }
        assert_eq!(terminals, vec![Terminal::Ended]);
        assert_eq!(terminal_count(&drain(&mut h.events)), 1);
    }

    #[test]
    fn test_backend_error_is_terminal_once() {
        let mut h = harness();
        playing(&mut h, vod_source("a", 1));
        let terminal = h.controller.on_backend_error(PlaybackErrorKind::Network);
        assert_eq!(
            terminal,
            Some(Terminal::Errored(SessionError::Playback(
                PlaybackErrorKind::Network
            )))
        );
        assert_eq!(h.controller.state(), PlaybackState::Errored);
        assert!(h.controller.on_backend_error(PlaybackErrorKind::Format).is_none());
        assert!(h.controller.on_backend_end_reached().is_none());

        let events = drain(&mut h.events);
        assert_eq!(terminal_count(&events), 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut h = harness();
        playing(&mut h, vod_source("a", 1));
        h.backend.clear_calls();
        h.controller.stop();
        h.controller.stop();
        assert_eq!(h.controller.state(), PlaybackState::Idle);
        assert_eq!(h.backend.calls(), vec!["stop", "unsubscribe"]);
        assert!(h.backend.sink().is_none());
        assert!(h.controller.on_poll_tick().is_none());
    }

    #[test]
    fn test_end_after_stop_is_ignored() {
        let mut h = harness();
        let id = playing(&mut h, vod_source("a", 1));
        h.controller.stop();
        assert!(h
            .controller
            .handle_backend_event(id, BackendEvent::EndReached)
            .is_none());
        assert!(h.controller.on_backend_end_reached().is_none());
        assert_eq!(h.controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_buffering_round_trip() {
        let mut h = harness();
        let id = playing(&mut h, vod_source("a", 1));
        h.controller
            .handle_backend_event(id, BackendEvent::Buffering(true));
        assert_eq!(h.controller.state(), PlaybackState::Buffering);
        h.backend.set_position(1_000, 600_000);
        h.controller.on_poll_tick();
        assert_eq!(h.controller.displayed().unwrap().current_ms, 1_000);
        h.controller
            .handle_backend_event(id, BackendEvent::Buffering(false));
        assert_eq!(h.controller.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_poll_promotes_loading_when_backend_plays() {
        let mut h = harness();
        h.controller.start(vod_source("a", 1)).unwrap();
        h.backend.set_position(200, 600_000);
        h.controller.on_poll_tick();
        assert_eq!(h.controller.state(), PlaybackState::Playing);
        assert_eq!(h.controller.displayed().unwrap().current_ms, 200);
    }

    #[test]
    fn test_missing_audio_track_is_selected_once() {
        let mut h = harness();
        playing(&mut h, vod_source("split", 2));
        h.backend.log.lock().unwrap().audio_tracks = vec![1, 2];
        h.backend.set_position(0, 600_000);

        for _ in 0..50 {
            h.controller.on_poll_tick();
        }
        assert_eq!(h.backend.audio_track(), Some(1));

        // the user turns audio off; later checks leave that alone
        h.backend.log.lock().unwrap().audio_track = None;
        h.backend.clear_calls();
        for _ in 0..200 {
            h.controller.on_poll_tick();
        }
        assert!(!h
            .backend
            .calls()
            .iter()
            .any(|c| c.starts_with("set_audio_track")));
    }

    #[test]
    fn test_volume_and_mute() {
        let mut h = harness();
        h.controller.set_volume(150);
        assert_eq!(h.controller.volume(), 100);
        h.controller.set_volume(40);
        assert!(h.controller.toggle_mute());
        assert!(!h.controller.toggle_mute());
        assert_eq!(
            h.backend.calls(),
            vec!["set_volume 100", "set_volume 40", "set_muted true", "set_muted false"]
        );
    }
}

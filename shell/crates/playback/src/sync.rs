use std::time::Duration;

use crate::state::{PlaybackState, PositionSample};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often the control thread polls backend time and length
    pub poll_interval: Duration,
    /// A VOD sample this close to the total length counts as end of stream
    pub near_end_margin_ms: u64,
    /// Playback time between audio track checks
    pub track_check_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            poll_interval: Duration::from_millis(100),
            near_end_margin_ms: 500,
            track_check_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// Scrubbing, not yet loaded, or already finished
    Dropped,
    Displayed(PositionSample),
    /// Displayed, and close enough to the end to finish the session
    NearEnd(PositionSample),
}

#[derive(Debug, Clone, Copy)]
struct Scrub {
    preview_ms: Option<u64>,
}

/// Reconciles poll and push position samples for one session and owns the
/// scrub protocol.
///
/// The engine never changes [`PlaybackState`] itself; it tells the controller
/// what a sample or a scrub step means and the controller acts on it.
#[derive(Debug)]
pub struct PositionSync {
    config: SyncConfig,
    is_live: bool,
    total_ms: u64,
    displayed: Option<PositionSample>,
    near_end_fired: bool,
    scrub: Option<Scrub>,
    played_ms: u64,
    next_track_check_ms: u64,
    track_check_done: bool,
}

impl PositionSync {
    pub fn new(config: SyncConfig, is_live: bool) -> Self {
        let next_track_check_ms = config.track_check_interval_ms;
        Self {
            config,
            is_live,
            total_ms: 0,
            displayed: None,
            near_end_fired: false,
            scrub: None,
            played_ms: 0,
            next_track_check_ms,
            track_check_done: false,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn is_live(&self) -> bool {
        self.is_live
    }

    /// What the slider and labels currently show.
    pub fn displayed(&self) -> Option<PositionSample> {
        self.displayed
    }

    /// Known total length. Always `None` for live sources.
    pub fn total_ms(&self) -> Option<u64> {
        if self.is_live || self.total_ms == 0 {
            None
        } else {
            Some(self.total_ms)
        }
    }

    pub fn observe_length(&mut self, length_ms: u64) {
        if !self.is_live && length_ms > 0 {
            self.total_ms = length_ms;
        }
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrub.is_some()
    }

    pub fn near_end_fired(&self) -> bool {
        self.near_end_fired
    }

    /// Clamps a seek target to `[0, total]`, or only at 0 while the total is unknown.
    pub fn clamp(&self, ms: u64) -> u64 {
        match self.total_ms() {
            Some(total) => ms.min(total),
            None => ms,
        }
    }

    /// Clamps `current + offset_ms`, saturating instead of wrapping.
    pub fn clamp_offset(&self, current: u64, offset_ms: i64) -> u64 {
        self.clamp(current.saturating_add_signed(offset_ms))
    }

    /// Feeds one sample from the poll path or the push path.
    pub fn accept(&mut self, state: PlaybackState, sample: PositionSample) -> SampleOutcome {
        if self.scrub.is_some() || !state.relays_position() {
            return SampleOutcome::Dropped;
        }

        let sample = if self.is_live {
            PositionSample::new(sample.current_ms, 0)
        } else {
            self.observe_length(sample.total_ms);
            PositionSample::new(sample.current_ms, self.total_ms)
        };
        self.displayed = Some(sample);

        if self.reached_near_end(&sample) {
            self.near_end_fired = true;
            return SampleOutcome::NearEnd(sample);
        }
        SampleOutcome::Displayed(sample)
    }

    fn reached_near_end(&self, sample: &PositionSample) -> bool {
        !self.is_live
            && !self.near_end_fired
            && sample.total_ms > 0
            && sample.current_ms + self.config.near_end_margin_ms >= sample.total_ms
    }

    /// Applies a committed seek to the display.
    pub fn commit(&mut self, target_ms: u64) -> PositionSample {
        let sample = PositionSample::new(target_ms, self.total_ms().unwrap_or(0));
        self.displayed = Some(sample);
        sample
    }

    /// Phase one: stop relaying backend samples. Returns false when already scrubbing.
    pub fn begin_scrub(&mut self) -> bool {
        if self.scrub.is_some() {
            return false;
        }
        self.scrub = Some(Scrub { preview_ms: None });
        true
    }

    /// Phase two: an intermediate value, clamped, not committed.
    pub fn drag(&mut self, ms: u64) -> Option<u64> {
        let target = self.clamp(ms);
        let scrub = self.scrub.as_mut()?;
        scrub.preview_ms = Some(target);
        Some(target)
    }

    pub fn preview(&self) -> Option<u64> {
        self.scrub.and_then(|s| s.preview_ms)
    }

    /// Phase three: the released value becomes the one committed seek.
    pub fn end_scrub(&mut self, ms: u64) -> Option<u64> {
        let target_ms = self.clamp(ms);
        self.scrub.take()?;
        self.commit(target_ms);
        Some(target_ms)
    }

    /// Drops a scrub in progress without committing, used on teardown.
    pub fn cancel_scrub(&mut self) {
        self.scrub = None;
    }

    /// Counts one poll interval of playback. Returns true when the audio
    /// track should be checked.
    pub fn track_check_due(&mut self, state: PlaybackState) -> bool {
        if self.track_check_done || state != PlaybackState::Playing {
            return false;
        }
        self.played_ms += self.config.poll_interval.as_millis() as u64;
        if self.played_ms < self.next_track_check_ms {
            return false;
        }
        self.next_track_check_ms += self.config.track_check_interval_ms;
        true
    }

    /// The check found an active track or corrected it; never check again.
    pub fn finish_track_check(&mut self) {
        self.track_check_done = true;
    }
}

//! Monophonic Pitch Tracker
//!
//! Smooths per-frame [`PitchEstimate`]s for one tracking session. A new note
//! is reported on the frame it first appears; a held note is re-reported once
//! enough samples have accumulated. Either way the reading is the mean of the
//! whole history window, which may still hold samples of the previous note.
//! Silence longer than the decay time clears the session.
//!
//! Time is passed in as data: `now` is the monotonic time elapsed since the
//! session started.

use std::time::Duration;

use crate::config::ConfigError;
use crate::mapper::{cents_between, PitchEstimate};

/// Default number of estimates held in the history window.
pub const DEFAULT_HISTORY_LEN: usize = 5;
/// Default number of samples that makes a held note worth re-reporting.
pub const DEFAULT_STABLE_COUNT: usize = 3;
/// Default cents window within which a held note counts as stable.
pub const DEFAULT_STABILITY_CENTS: i32 = 15;
/// Default unbroken silence after which the session goes silent.
pub const DEFAULT_DECAY: Duration = Duration::from_millis(800);

/// Tracker session state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrackerState {
    /// No note is being tracked.
    Silent,
    /// A note has been reported and not yet decayed.
    Tracking,
}

/// What the tracker currently reports.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PitchReading {
    /// Smoothed estimate.
    pub estimate: PitchEstimate,
    /// Whether the window is full of the same note within the stability cents.
    pub stable: bool,
}

/// Fixed-capacity FIFO of recent estimates; the oldest is overwritten first.
#[derive(Debug, Clone)]
struct PitchHistory {
    slots: Vec<PitchEstimate>,
    head: usize,
    capacity: usize,
}

impl PitchHistory {
    fn with_capacity(capacity: usize) -> Self {
        PitchHistory {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    fn push(&mut self, estimate: PitchEstimate) {
        if self.slots.len() < self.capacity {
            self.slots.push(estimate);
        } else {
            self.slots[self.head] = estimate;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    /// Oldest to newest.
    fn iter(&self) -> impl Iterator<Item = &PitchEstimate> + '_ {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }
}

/// Builder for [`PitchTracker`].
pub struct PitchTrackerBuilder {
    history_len: usize,
    stable_count: usize,
    stability_cents: i32,
    volume_floor: f32,
    decay: Duration,
}

impl PitchTrackerBuilder {
    /// Defaults: window of 5, stable after 3, 15 cents, floor 0, 800 ms decay.
    pub fn new() -> Self {
        PitchTrackerBuilder {
            history_len: DEFAULT_HISTORY_LEN,
            stable_count: DEFAULT_STABLE_COUNT,
            stability_cents: DEFAULT_STABILITY_CENTS,
            volume_floor: 0.0,
            decay: DEFAULT_DECAY,
        }
    }

    /// Capacity of the smoothing window.
    pub fn history_len(mut self, n: usize) -> Self {
        self.history_len = n;
        self
    }

    /// Samples of one note needed before a held note is re-reported.
    pub fn stable_count(mut self, n: usize) -> Self {
        self.stable_count = n;
        self
    }

    /// Maximum cents spread for a reading to count as stable.
    pub fn stability_cents(mut self, cents: i32) -> Self {
        self.stability_cents = cents;
        self
    }

    /// Frames quieter than this take the silence path.
    pub fn volume_floor(mut self, floor: f32) -> Self {
        self.volume_floor = floor;
        self
    }

    /// Unbroken silence after which history is dropped.
    pub fn decay(mut self, decay: Duration) -> Self {
        self.decay = decay;
        self
    }

    /// Validate and build a silent tracker.
    pub fn build(self) -> Result<PitchTracker, ConfigError> {
        if self.stable_count == 0 || self.history_len < self.stable_count {
            return Err(ConfigError::InvalidWindow {
                history_len: self.history_len,
                stable_count: self.stable_count,
            });
        }
        if !self.volume_floor.is_finite() || self.volume_floor < 0.0 {
            return Err(ConfigError::InvalidFloor {
                name: "volume_floor",
                value: self.volume_floor,
            });
        }
        if self.stability_cents < 0 {
            return Err(ConfigError::InvalidStabilityCents(self.stability_cents));
        }
        Ok(PitchTracker {
            history: PitchHistory::with_capacity(self.history_len),
            stable_count: self.stable_count,
            stability_cents: self.stability_cents,
            volume_floor: self.volume_floor,
            decay: self.decay,
            state: TrackerState::Silent,
            last: None,
            silence_since: None,
        })
    }
}

impl Default for PitchTrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One monophonic tracking session.
#[derive(Debug, Clone)]
pub struct PitchTracker {
    history: PitchHistory,
    stable_count: usize,
    stability_cents: i32,
    volume_floor: f32,
    decay: Duration,
    state: TrackerState,
    last: Option<PitchReading>,
    silence_since: Option<Duration>,
}

impl PitchTracker {
    /// Return a builder to customise the window and timing.
    pub fn builder() -> PitchTrackerBuilder {
        PitchTrackerBuilder::new()
    }

    /// Current session state.
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Last reported reading, if any.
    pub fn current(&self) -> Option<PitchReading> {
        self.last
    }

    /// Return to `Silent`, dropping history.
    pub fn reset(&mut self) {
        self.history.clear();
        self.state = TrackerState::Silent;
        self.last = None;
        self.silence_since = None;
    }

    /// Feed one frame.
    ///
    /// `magnitude` is the frame's loudness measure and `estimate` the mapped
    /// note for it, if any. Returns what the session reports after the frame.
    pub fn update(
        &mut self,
        magnitude: f32,
        estimate: Option<PitchEstimate>,
        now: Duration,
    ) -> Option<PitchReading> {
        if magnitude.is_nan() || magnitude < self.volume_floor {
            return self.on_quiet(now);
        }
        // Loud but unmapped: leave the session untouched.
        let Some(estimate) = estimate else {
            return self.last;
        };

        self.silence_since = None;
        self.state = TrackerState::Tracking;

        let changed = self.last.map(|r| r.estimate.note) != Some(estimate.note);
        self.history.push(estimate);

        if changed || self.history.len() >= self.stable_count {
            let reading = self.smoothed(&estimate);
            if changed {
                log::debug!(
                    "note change to {} ({:.2} Hz, {:+} cents)",
                    reading.estimate.note,
                    reading.estimate.frequency,
                    reading.estimate.cents
                );
            }
            self.last = Some(reading);
        }
        self.last
    }

    fn on_quiet(&mut self, now: Duration) -> Option<PitchReading> {
        if self.state == TrackerState::Silent {
            return None;
        }
        let since = *self.silence_since.get_or_insert(now);
        if now.saturating_sub(since) > self.decay {
            log::debug!("silence for {:?}, dropping tracked note", now.saturating_sub(since));
            self.reset();
            return None;
        }
        self.last
    }

    /// Mean of the window, with cents measured against the newest sample's
    /// implied reference frequency. The note identity is the newest sample's.
    fn smoothed(&self, newest: &PitchEstimate) -> PitchReading {
        let n = self.history.len() as f32;
        let (freq_sum, mag_sum) = self
            .history
            .iter()
            .fold((0.0f32, 0.0f32), |(f, m), e| (f + e.frequency, m + e.magnitude));
        let frequency = freq_sum / n;
        let cents = cents_between(frequency, newest.reference_frequency());

        let estimate = PitchEstimate {
            note: newest.note,
            frequency,
            magnitude: mag_sum / n,
            octave: newest.octave,
            cents,
        };
        let stable = self.history.len() >= self.stable_count
            && self.history.iter().all(|e| {
                e.note == newest.note && (e.cents - cents).abs() <= self.stability_cents
            });
        PitchReading { estimate, stable }
    }
}

impl Default for PitchTracker {
    fn default() -> Self {
        PitchTracker {
            history: PitchHistory::with_capacity(DEFAULT_HISTORY_LEN),
            stable_count: DEFAULT_STABLE_COUNT,
            stability_cents: DEFAULT_STABILITY_CENTS,
            volume_floor: 0.0,
            decay: DEFAULT_DECAY,
            state: TrackerState::Silent,
            last: None,
            silence_since: None,
        }
    }
}

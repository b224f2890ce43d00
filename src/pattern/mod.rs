//! Fixed-grid step patterns
//!
//! A [`StepPattern`] holds six drum lanes and one monophonic bass lane,
//! all exactly `length` sixteenth-note steps long, where `length` is a
//! whole number of 16-step bars.

pub mod extract;
pub mod gm;

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use extract::{
    apply_swing, extract, DocumentMetadata, ExtractionPass, TempoMeta, TimeSignature, TrackClass,
};

/// Steps in one 4/4 bar of sixteenth notes
pub const STEPS_PER_BAR: usize = 16;
/// Upper bound for user-requested resizes
pub const MAX_PATTERN_LENGTH: usize = 2048;
pub const DEFAULT_TEMPO_BPM: u32 = 120;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern length {0} is not a positive multiple of 16")]
    InvalidLength(usize),
    #[error("{lane} lane has {actual} steps, pattern length is {expected}")]
    LaneLengthMismatch {
        lane: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrumVoice {
    Kick,
    Snare,
    HiHat,
    OpenHat,
    Crash,
    Ride,
}

impl DrumVoice {
    pub const ALL: [DrumVoice; 6] = [
        DrumVoice::Kick,
        DrumVoice::Snare,
        DrumVoice::HiHat,
        DrumVoice::OpenHat,
        DrumVoice::Crash,
        DrumVoice::Ride,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DrumVoice::Kick => "kick",
            DrumVoice::Snare => "snare",
            DrumVoice::HiHat => "hihat",
            DrumVoice::OpenHat => "openhat",
            DrumVoice::Crash => "crash",
            DrumVoice::Ride => "ride",
        }
    }

    /// Canonical GM key used when the voice is played back
    pub fn gm_note(&self) -> u8 {
        match self {
            DrumVoice::Kick => 36,
            DrumVoice::Snare => 38,
            DrumVoice::HiHat => 42,
            DrumVoice::OpenHat => 46,
            DrumVoice::Crash => 49,
            DrumVoice::Ride => 51,
        }
    }
}

impl fmt::Display for DrumVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One boolean lane per drum voice; serializes as `{ "kick": [...], ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrumLanes {
    kick: Vec<bool>,
    snare: Vec<bool>,
    hihat: Vec<bool>,
    openhat: Vec<bool>,
    crash: Vec<bool>,
    ride: Vec<bool>,
}

impl DrumLanes {
    fn empty(length: usize) -> Self {
        Self {
            kick: vec![false; length],
            snare: vec![false; length],
            hihat: vec![false; length],
            openhat: vec![false; length],
            crash: vec![false; length],
            ride: vec![false; length],
        }
    }

    pub fn lane(&self, voice: DrumVoice) -> &[bool] {
        match voice {
            DrumVoice::Kick => &self.kick,
            DrumVoice::Snare => &self.snare,
            DrumVoice::HiHat => &self.hihat,
            DrumVoice::OpenHat => &self.openhat,
            DrumVoice::Crash => &self.crash,
            DrumVoice::Ride => &self.ride,
        }
    }

    fn lane_mut(&mut self, voice: DrumVoice) -> &mut Vec<bool> {
        match voice {
            DrumVoice::Kick => &mut self.kick,
            DrumVoice::Snare => &mut self.snare,
            DrumVoice::HiHat => &mut self.hihat,
            DrumVoice::OpenHat => &mut self.openhat,
            DrumVoice::Crash => &mut self.crash,
            DrumVoice::Ride => &mut self.ride,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepPattern {
    drums: DrumLanes,
    bass: Vec<Option<String>>,
    tempo: u32,
    length: usize,
}

impl StepPattern {
    /// An empty pattern of `length` steps.
    pub fn new(length: usize, tempo: u32) -> Result<Self, PatternError> {
        if length == 0 || length % STEPS_PER_BAR != 0 {
            return Err(PatternError::InvalidLength(length));
        }
        Ok(Self::empty(length, tempo))
    }

    // Callers guarantee `length` is a positive multiple of 16
    fn empty(length: usize, tempo: u32) -> Self {
        Self {
            drums: DrumLanes::empty(length),
            bass: vec![None; length],
            tempo,
            length,
        }
    }

    /// Builds a pattern from whole lanes, checking every lane length
    pub fn from_lanes(
        drums: Vec<(DrumVoice, Vec<bool>)>,
        bass: Vec<Option<String>>,
        tempo: u32,
    ) -> Result<Self, PatternError> {
        let mut pattern = Self::new(bass.len(), tempo)?;
        for (voice, lane) in drums {
            if lane.len() != pattern.length {
                return Err(PatternError::LaneLengthMismatch {
                    lane: voice.name(),
                    expected: pattern.length,
                    actual: lane.len(),
                });
            }
            *pattern.drums.lane_mut(voice) = lane;
        }
        pattern.bass = bass;
        Ok(pattern)
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn bars(&self) -> usize {
        self.length / STEPS_PER_BAR
    }

    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn set_tempo(&mut self, tempo: u32) {
        self.tempo = tempo;
    }

    pub fn drums(&self) -> &DrumLanes {
        &self.drums
    }

    pub fn drum(&self, voice: DrumVoice) -> &[bool] {
        self.drums.lane(voice)
    }

    /// Whether `voice` sounds on `step`; out-of-range steps are silent
    pub fn is_active(&self, voice: DrumVoice, step: usize) -> bool {
        self.drum(voice).get(step).copied().unwrap_or(false)
    }

    pub fn set_drum(&mut self, voice: DrumVoice, step: usize, active: bool) {
        if let Some(cell) = self.drums.lane_mut(voice).get_mut(step) {
            *cell = active;
        }
    }

    pub fn toggle_drum(&mut self, voice: DrumVoice, step: usize) {
        if let Some(cell) = self.drums.lane_mut(voice).get_mut(step) {
            *cell = !*cell;
        }
    }

    /// Voices sounding on `step`, in [`DrumVoice::ALL`] order
    pub fn active_voices(&self, step: usize) -> impl Iterator<Item = DrumVoice> + '_ {
        DrumVoice::ALL
            .into_iter()
            .filter(move |&voice| self.is_active(voice, step))
    }

    pub fn bass(&self) -> &[Option<String>] {
        &self.bass
    }

    pub fn bass_note(&self, step: usize) -> Option<&str> {
        self.bass.get(step).and_then(|n| n.as_deref())
    }

    pub fn set_bass(&mut self, step: usize, note: Option<String>) {
        if let Some(cell) = self.bass.get_mut(step) {
            *cell = note;
        }
    }

    /// Places `note` on `step`, or clears the step if it already holds it
    pub fn toggle_bass(&mut self, step: usize, note: &str) {
        if let Some(cell) = self.bass.get_mut(step) {
            if cell.as_deref() == Some(note) {
                *cell = None;
            } else {
                *cell = Some(note.to_string());
            }
        }
    }

    pub fn clear(&mut self) {
        for voice in DrumVoice::ALL {
            self.drums.lane_mut(voice).fill(false);
        }
        self.bass.fill(None);
    }

    /// Four-on-the-floor starter beat in the first bar
    pub fn basic_beat(&mut self) {
        for step in [0, 4, 8, 12] {
            self.set_drum(DrumVoice::Kick, step, true);
        }
        for step in [4, 12] {
            self.set_drum(DrumVoice::Snare, step, true);
        }
        for step in (0..STEPS_PER_BAR).step_by(2) {
            self.set_drum(DrumVoice::HiHat, step, true);
        }
    }

    /// Returns a copy resized to `requested` steps.
    ///
    /// The length is clamped to `[16, 2048]` and rounded up to a whole bar.
    /// Steps that fit in both lengths are preserved.
    pub fn resized(&self, requested: usize) -> StepPattern {
        let length = requested
            .clamp(STEPS_PER_BAR, MAX_PATTERN_LENGTH)
            .div_ceil(STEPS_PER_BAR)
            * STEPS_PER_BAR;
        let keep = length.min(self.length);

        let mut resized = StepPattern::empty(length, self.tempo);
        for voice in DrumVoice::ALL {
            resized.drums.lane_mut(voice)[..keep].copy_from_slice(&self.drum(voice)[..keep]);
        }
        resized.bass[..keep].clone_from_slice(&self.bass[..keep]);
        resized
    }

    pub(crate) fn lane_mut(&mut self, voice: DrumVoice) -> &mut Vec<bool> {
        self.drums.lane_mut(voice)
    }
}

impl Default for StepPattern {
    fn default() -> Self {
        StepPattern::empty(STEPS_PER_BAR, DEFAULT_TEMPO_BPM)
    }
}

/// Text grid: one row per voice, `x` for hits, bar lines every 16 steps
impl fmt::Display for StepPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for voice in DrumVoice::ALL {
            write!(f, "{:<8}", voice.name())?;
            for (step, &hit) in self.drum(voice).iter().enumerate() {
                if step % STEPS_PER_BAR == 0 {
                    f.write_str("|")?;
                }
                f.write_str(if hit { "x" } else { "." })?;
            }
            writeln!(f, "|")?;
        }
        write!(f, "{:<8}", "bass")?;
        for (step, note) in self.bass.iter().enumerate() {
            if step % STEPS_PER_BAR == 0 {
                f.write_str("|")?;
            }
            f.write_str(if note.is_some() { "o" } else { "." })?;
        }
        writeln!(f, "|")
    }
}

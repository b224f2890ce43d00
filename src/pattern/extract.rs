//! MIDI document to step pattern conversion
//!
//! Extraction runs in two passes. [`DocumentMetadata::scan`] walks every
//! track first to collect tempo, time signature and overall length, since a
//! tempo event may appear after the notes it governs. [`ExtractionPass`]
//! then walks the tracks again and places notes on the sixteenth grid.

use super::gm::{drum_voice_for_note, note_name, BASS_PROGRAMS, BASS_RANGE};
use super::{DrumVoice, StepPattern, MAX_PATTERN_LENGTH, STEPS_PER_BAR};
use crate::midi::{EventKind, MidiDocument, RawEvent, Track, GM_DRUM_CHANNEL};
use log::{debug, info, warn};

pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

/// A tempo meta event positioned on its track's timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoMeta {
    pub absolute_tick: u64,
    pub micros_per_quarter: u32,
}

impl TempoMeta {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / f64::from(self.micros_per_quarter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }
}

/// Result of the metadata pass
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub ticks_per_quarter: u32,
    /// Every tempo event, in track order then file order
    pub tempos: Vec<TempoMeta>,
    /// The last time signature seen
    pub time_signature: TimeSignature,
    /// Largest absolute tick reached by any track
    pub max_tick: u64,
}

impl DocumentMetadata {
    pub fn scan(document: &MidiDocument) -> Self {
        let mut tempos = Vec::new();
        let mut time_signature = TimeSignature::default();
        let mut max_tick = 0;

        for track in &document.tracks {
            for (tick, event) in track.timed_events() {
                max_tick = max_tick.max(tick);
                let EventKind::Meta(meta) = &event.kind else {
                    continue;
                };
                if let Some(micros) = meta.tempo.filter(|&us| us > 0) {
                    debug!("Tempo change at tick {}: {} us/quarter", tick, micros);
                    tempos.push(TempoMeta {
                        absolute_tick: tick,
                        micros_per_quarter: micros,
                    });
                } else if let Some((numerator, exponent)) = meta.time_signature() {
                    time_signature = TimeSignature {
                        numerator,
                        denominator: 2u32.saturating_pow(u32::from(exponent)),
                    };
                    debug!("Time signature: {}/{}", numerator, time_signature.denominator);
                }
            }
        }

        Self {
            ticks_per_quarter: document.ticks_per_quarter(),
            tempos,
            time_signature,
            max_tick,
        }
    }

    /// Microseconds per quarter of the last tempo event observed
    pub fn micros_per_quarter(&self) -> u32 {
        self.tempos
            .last()
            .map_or(DEFAULT_MICROS_PER_QUARTER, |t| t.micros_per_quarter)
    }

    /// Whole-number tempo for the pattern, rounded half up
    pub fn tempo_bpm(&self) -> u32 {
        let bpm = 60_000_000.0 / f64::from(self.micros_per_quarter());
        (bpm + 0.5).floor() as u32
    }

    pub fn ticks_per_sixteenth(&self) -> f64 {
        f64::from(self.ticks_per_quarter) / 4.0
    }

    pub fn ticks_per_bar(&self) -> u64 {
        u64::from(self.ticks_per_quarter) * u64::from(self.time_signature.numerator)
    }

    /// Step count covering the whole document, rounded up to whole bars and
    /// capped at [`MAX_PATTERN_LENGTH`]. Notes past the cap are dropped.
    pub fn pattern_length(&self) -> usize {
        let total_sixteenths = (self.max_tick as f64 / self.ticks_per_sixteenth()).ceil() as usize;
        let bars = total_sixteenths.div_ceil(STEPS_PER_BAR).max(1);
        let length = bars.saturating_mul(STEPS_PER_BAR);
        if length > MAX_PATTERN_LENGTH {
            warn!(
                "Document spans {} steps, truncating pattern to {}",
                length, MAX_PATTERN_LENGTH
            );
            return MAX_PATTERN_LENGTH;
        }
        length
    }

    /// Nearest sixteenth step for an absolute tick; ties round up
    pub fn quantize(&self, tick: u64) -> usize {
        let exact_position = tick as f64 / self.ticks_per_sixteenth();
        (exact_position + 0.5).floor() as usize
    }
}

/// Per-track classification, updated as the track's events are walked.
///
/// A note is judged by the classification in force when it is reached, so
/// a program change that arrives after some notes only affects the notes
/// that follow it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackClass {
    pub drum: bool,
    pub bass: bool,
}

impl TrackClass {
    pub fn observe(self, event: &RawEvent) -> Self {
        let mut next = self;
        if let EventKind::ProgramChange { program } = event.kind {
            if event.channel == GM_DRUM_CHANNEL {
                next.drum = true;
            } else if BASS_PROGRAMS.contains(&program) {
                next.bass = true;
            }
        }
        if event.channel == GM_DRUM_CHANNEL {
            next.drum = true;
        }
        next
    }
}

/// Second pass: places every note-on onto the grid
pub struct ExtractionPass<'a> {
    metadata: &'a DocumentMetadata,
    pattern: StepPattern,
}

impl<'a> ExtractionPass<'a> {
    pub fn new(metadata: &'a DocumentMetadata) -> Self {
        let pattern = StepPattern::empty(metadata.pattern_length(), metadata.tempo_bpm());
        Self { metadata, pattern }
    }

    pub fn run(mut self, document: &MidiDocument) -> StepPattern {
        for (index, track) in document.tracks.iter().enumerate() {
            let class = self.extract_track(track);
            debug!(
                "Track {}: drum={}, bass={}",
                index, class.drum, class.bass
            );
        }
        self.pattern
    }

    fn extract_track(&mut self, track: &Track) -> TrackClass {
        track
            .timed_events()
            .fold(TrackClass::default(), |class, (tick, event)| {
                let class = class.observe(event);
                if let EventKind::NoteOn { note, velocity } = event.kind {
                    if velocity > 0 {
                        self.place_note(class, event.channel, note, tick);
                    }
                }
                class
            })
    }

    fn place_note(&mut self, class: TrackClass, channel: u8, note: u8, tick: u64) {
        let step = self.metadata.quantize(tick);
        if step >= self.pattern.length() {
            return;
        }

        if class.drum || channel == GM_DRUM_CHANNEL {
            if let Some(voice) = drum_voice_for_note(note) {
                self.pattern.set_drum(voice, step, true);
            }
        } else if BASS_RANGE.contains(&note) {
            self.pattern.set_bass(step, Some(note_name(note)));
        }
    }
}

/// Converts a decoded document into a step pattern.
///
/// `swing` is a fraction (0.5 = 50%). It only applies when
/// `quantize_divisor` is 16; a divisor of 0 leaves the base grid alone.
pub fn extract(document: &MidiDocument, quantize_divisor: u32, swing: f64) -> StepPattern {
    let metadata = DocumentMetadata::scan(document);
    info!(
        "PPQ {}, {} tempo events, {} BPM, {}/{}",
        metadata.ticks_per_quarter,
        metadata.tempos.len(),
        metadata.tempo_bpm(),
        metadata.time_signature.numerator,
        metadata.time_signature.denominator
    );
    debug!(
        "Ticks per 16th: {}, ticks per bar: {}, last tick: {}",
        metadata.ticks_per_sixteenth(),
        metadata.ticks_per_bar(),
        metadata.max_tick
    );

    let mut pattern = ExtractionPass::new(&metadata).run(document);

    if quantize_divisor == 16 && swing > 0.0 {
        apply_swing(&mut pattern, swing);
    }

    info!(
        "Extracted {} steps ({} bars) at {} BPM",
        pattern.length(),
        pattern.bars(),
        pattern.tempo()
    );
    pattern
}

/// Pushes active odd (off-beat) steps later by `floor(swing * 0.5)` whole
/// steps, per drum lane.
///
/// Offsets are whole steps, so any swing below 2.0 moves nothing. A hit
/// only moves when its target step was empty before the pass began.
pub fn apply_swing(pattern: &mut StepPattern, swing: f64) {
    let offset = (swing * 0.5).floor().max(0.0) as usize;
    if offset == 0 {
        return;
    }

    for voice in DrumVoice::ALL {
        let original = pattern.drum(voice).to_vec();
        let len = original.len();
        let lane = pattern.lane_mut(voice);

        for i in (1..len).step_by(2) {
            if !original[i] || i + 1 >= len {
                continue;
            }
            let target = i + offset;
            if !original.get(target).copied().unwrap_or(false) {
                lane[i] = false;
                lane[target.min(len - 1)] = true;
            }
        }
    }
}

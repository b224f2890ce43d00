use crate::midi::{MidiMessage, GM_DRUM_CHANNEL};
use crate::midi_output::TimedMessage;
use crate::pattern::gm::note_number;
use crate::scheduler::StepHandler;
use crate::state::PatternSlot;
use crossbeam::channel::Sender;
use log::{trace, warn};

/// E2, used when a bass slot holds a name that does not parse
pub const FALLBACK_BASS_NOTE: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerConfig {
    pub drum_channel: u8,
    pub bass_channel: u8,
    pub velocity: u8,
    /// Seconds between a drum note-on and its note-off
    pub drum_gate_secs: f64,
    pub bass_gate_secs: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            drum_channel: GM_DRUM_CHANNEL,
            bass_channel: 0,
            velocity: 100,
            drum_gate_secs: 0.05,
            bass_gate_secs: 0.25,
        }
    }
}

/// Step reported to observers once its messages are queued
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    pub step: usize,
    pub time: f64,
}

/// Turns scheduled steps into timestamped MIDI notes.
///
/// Reads the live pattern on every step, so edits and replacements are
/// heard from the next step boundary.
pub struct PatternPlayer {
    pattern: PatternSlot,
    output: Sender<TimedMessage>,
    steps: Option<Sender<StepEvent>>,
    config: PlayerConfig,
}

impl PatternPlayer {
    pub fn new(pattern: PatternSlot, output: Sender<TimedMessage>, config: PlayerConfig) -> Self {
        Self {
            pattern,
            output,
            steps: None,
            config,
        }
    }

    /// Also report every played step on `steps`
    pub fn with_step_events(mut self, steps: Sender<StepEvent>) -> Self {
        self.steps = Some(steps);
        self
    }

    fn note(&self, channel: u8, note: u8, time: f64, gate: f64) {
        let on = TimedMessage::new(
            time,
            MidiMessage::NoteOn {
                channel,
                note,
                velocity: self.config.velocity,
            },
        );
        let off = TimedMessage::new(
            time + gate,
            MidiMessage::NoteOff {
                channel,
                note,
                velocity: 0,
            },
        );
        if self.output.send(on).and_then(|_| self.output.send(off)).is_err() {
            warn!("MIDI output channel closed, note {} dropped", note);
        }
    }
}

impl StepHandler for PatternPlayer {
    fn on_step(&mut self, step: usize, time: f64) {
        let pattern = self.pattern.load();
        if step >= pattern.length() {
            return;
        }

        for voice in pattern.active_voices(step) {
            trace!("Step {}: {}", step, voice);
            self.note(
                self.config.drum_channel,
                voice.gm_note(),
                time,
                self.config.drum_gate_secs,
            );
        }

        if let Some(name) = pattern.bass_note(step) {
            let note = note_number(name).unwrap_or(FALLBACK_BASS_NOTE);
            trace!("Step {}: bass {} ({})", step, name, note);
            self.note(self.config.bass_channel, note, time, self.config.bass_gate_secs);
        }

        if let Some(steps) = &self.steps {
            if steps.send(StepEvent { step, time }).is_err() {
                trace!("Step observer gone, step {} not reported", step);
            }
        }
    }
}

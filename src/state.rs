use crate::pattern::StepPattern;
use arc_swap::ArcSwap;
use log::debug;
use std::sync::Arc;

/// Shared, swappable handle to the pattern being played.
///
/// Readers take a snapshot with [`PatternSlot::load`] and never block
/// writers. Every edit publishes a fresh copy, so a snapshot a reader is
/// holding does not change underneath it.
#[derive(Clone)]
pub struct PatternSlot {
    current: Arc<ArcSwap<StepPattern>>,
}

impl PatternSlot {
    pub fn new(pattern: StepPattern) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(pattern)),
        }
    }

    pub fn load(&self) -> Arc<StepPattern> {
        self.current.load_full()
    }

    pub fn length(&self) -> usize {
        self.current.load().length()
    }

    pub fn tempo(&self) -> u32 {
        self.current.load().tempo()
    }

    pub fn replace(&self, pattern: StepPattern) {
        debug!(
            "Pattern replaced: {} steps at {} BPM",
            pattern.length(),
            pattern.tempo()
        );
        self.current.store(Arc::new(pattern));
    }

    /// Applies an edit to a copy of the current pattern and publishes it.
    ///
    /// `edit` may run more than once if another writer races this one.
    pub fn update<F>(&self, edit: F)
    where
        F: Fn(&mut StepPattern),
    {
        self.current.rcu(|pattern| {
            let mut next = StepPattern::clone(pattern);
            edit(&mut next);
            next
        });
    }
}

impl Default for PatternSlot {
    fn default() -> Self {
        Self::new(StepPattern::default())
    }
}

/// Where playback is and when the next step is due
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    pub current_step: usize,
    /// Seconds on the audio clock
    pub next_trigger_time: f64,
    pub tempo_bpm: f64,
}

impl PlaybackCursor {
    pub fn new(tempo_bpm: f64) -> Self {
        Self {
            current_step: 0,
            next_trigger_time: 0.0,
            tempo_bpm,
        }
    }

    /// Length of one sixteenth at the current tempo
    pub fn seconds_per_step(&self) -> f64 {
        60.0 / (self.tempo_bpm * 4.0)
    }

    /// Moves to the following step, wrapping at `length`
    pub fn advance(&mut self, length: usize) {
        self.next_trigger_time += self.seconds_per_step();
        self.current_step = (self.current_step + 1) % length.max(1);
    }

    pub fn reset(&mut self, now: f64) {
        self.current_step = 0;
        self.next_trigger_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::DrumVoice;

    #[test]
    fn test_snapshot_is_stable_across_updates() {
        let slot = PatternSlot::default();
        let before = slot.load();

        slot.update(|p| p.set_drum(DrumVoice::Kick, 0, true));

        assert!(!before.is_active(DrumVoice::Kick, 0));
        assert!(slot.load().is_active(DrumVoice::Kick, 0));
    }

    #[test]
    fn test_cursor_advance_wraps() {
        let mut cursor = PlaybackCursor::new(120.0);
        assert_eq!(cursor.seconds_per_step(), 0.125);

        cursor.reset(1.0);
        for _ in 0..15 {
            cursor.advance(16);
        }
        assert_eq!(cursor.current_step, 15);
        cursor.advance(16);
        assert_eq!(cursor.current_step, 0);
        assert!((cursor.next_trigger_time - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_clones_share_the_slot() {
        let slot = PatternSlot::default();
        let other = slot.clone();
        other.replace(StepPattern::new(32, 90).unwrap());
        assert_eq!(slot.length(), 32);
        assert_eq!(slot.tempo(), 90);
    }
}

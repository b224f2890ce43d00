//! Decoded representation of a Standard MIDI File
//!
//! These types carry the wire format only; musical meaning (drums, bass,
//! steps) is assigned later by the pattern extractor.

/// Ticks per quarter note substituted when the header uses SMPTE timing
pub const SMPTE_FALLBACK_PPQ: u32 = 480;

/// Meta event type carrying a tempo change
pub const META_TEMPO: u8 = 0x51;
/// Meta event type carrying a time signature
pub const META_TIME_SIGNATURE: u8 = 0x58;

/// Time division from the header chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Division {
    /// Metrical timing: ticks per quarter note
    TicksPerQuarter(u16),
    /// SMPTE time code (high bit set); the raw word is kept for reporting
    Smpte(u16),
}

impl Division {
    pub fn from_word(word: u16) -> Self {
        if word & 0x8000 != 0 {
            Division::Smpte(word)
        } else {
            Division::TicksPerQuarter(word)
        }
    }

    /// Resolution used for quantization.
    ///
    /// SMPTE is not decoded; it falls back to 480 PPQ. A metrical division
    /// of zero would make every position infinite, so it gets the same
    /// fallback.
    pub fn ticks_per_quarter(&self) -> u32 {
        match *self {
            Division::TicksPerQuarter(0) | Division::Smpte(_) => SMPTE_FALLBACK_PPQ,
            Division::TicksPerQuarter(ppq) => u32::from(ppq),
        }
    }

    pub fn is_smpte(&self) -> bool {
        matches!(self, Division::Smpte(_))
    }
}

/// A meta event (status 0xFF)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEvent {
    pub meta_type: u8,
    pub data: Vec<u8>,
    /// Microseconds per quarter note, present for well-formed tempo events
    pub tempo: Option<u32>,
}

impl MetaEvent {
    pub fn new(meta_type: u8, data: Vec<u8>) -> Self {
        let tempo = if meta_type == META_TEMPO && data.len() >= 3 {
            Some((u32::from(data[0]) << 16) | (u32::from(data[1]) << 8) | u32::from(data[2]))
        } else {
            None
        };

        Self {
            meta_type,
            data,
            tempo,
        }
    }

    /// Tempo in beats per minute, if this is a tempo event
    pub fn tempo_bpm(&self) -> Option<f64> {
        self.tempo
            .filter(|&us| us > 0)
            .map(|us| 60_000_000.0 / f64::from(us))
    }

    /// (numerator, denominator exponent) for time signature events
    pub fn time_signature(&self) -> Option<(u8, u8)> {
        if self.meta_type == META_TIME_SIGNATURE && self.data.len() >= 2 {
            Some((self.data[0], self.data[1]))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NoteOn { note: u8, velocity: u8 },
    /// Also produced by note-on messages with velocity 0
    NoteOff { note: u8, velocity: u8 },
    Controller { controller: u8, value: u8 },
    ProgramChange { program: u8 },
    /// 14-bit value, `low | (high << 7)`
    PitchBend { value: u16 },
    Meta(MetaEvent),
    /// System exclusive blobs and unknown status bytes; payload skipped
    Other { status: u8 },
}

/// One (delta-time, event) pair from a track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Ticks since the previous event in the same track
    pub delta_ticks: u32,
    /// Low nibble of the status byte
    pub channel: u8,
    pub kind: EventKind,
}

impl RawEvent {
    pub fn is_note_on(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn { velocity, .. } if velocity > 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Track {
    pub events: Vec<RawEvent>,
}

impl Track {
    /// Iterates events paired with their absolute tick within this track
    pub fn timed_events(&self) -> impl Iterator<Item = (u64, &RawEvent)> + '_ {
        self.events.iter().scan(0u64, |tick, event| {
            *tick += u64::from(event.delta_ticks);
            Some((*tick, event))
        })
    }

    /// Absolute tick of the last event (0 for an empty track)
    pub fn end_tick(&self) -> u64 {
        self.events.iter().map(|e| u64::from(e.delta_ticks)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiDocument {
    pub format: u16,
    pub division: Division,
    pub tracks: Vec<Track>,
}

impl MidiDocument {
    pub fn ticks_per_quarter(&self) -> u32 {
        self.division.ticks_per_quarter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(delta: u32) -> RawEvent {
        RawEvent {
            delta_ticks: delta,
            channel: 0,
            kind: EventKind::Controller {
                controller: 7,
                value: 100,
            },
        }
    }

    #[test]
    fn test_division_smpte_falls_back_to_480() {
        let division = Division::from_word(0xE728);
        assert!(division.is_smpte());
        assert_eq!(division.ticks_per_quarter(), 480);
        assert_eq!(Division::from_word(96).ticks_per_quarter(), 96);
    }

    #[test]
    fn test_tempo_meta_decodes_24_bit_value() {
        let meta = MetaEvent::new(META_TEMPO, vec![0x07, 0xA1, 0x20]);
        assert_eq!(meta.tempo, Some(500_000));
        assert_eq!(meta.tempo_bpm(), Some(120.0));

        let short = MetaEvent::new(META_TEMPO, vec![0x07]);
        assert_eq!(short.tempo, None);
    }

    #[test]
    fn test_timed_events_accumulate_per_track() {
        let track = Track {
            events: vec![event(0), event(120), event(0), event(240)],
        };
        let ticks: Vec<u64> = track.timed_events().map(|(t, _)| t).collect();
        assert_eq!(ticks, vec![0, 120, 120, 360]);
        assert_eq!(track.end_tick(), 360);
    }
}

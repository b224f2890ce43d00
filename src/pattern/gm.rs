//! General MIDI tables used to classify notes

use super::DrumVoice;
use std::ops::RangeInclusive;

/// Note numbers treated as bass when they come from a non-drum track (E1..G3)
pub const BASS_RANGE: RangeInclusive<u8> = 28..=55;

/// General MIDI program numbers for the bass family
pub const BASS_PROGRAMS: RangeInclusive<u8> = 32..=39;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Maps a GM percussion key to one of the six drum voices
pub fn drum_voice_for_note(note: u8) -> Option<DrumVoice> {
    match note {
        35 | 36 => Some(DrumVoice::Kick),
        38 | 40 => Some(DrumVoice::Snare),
        42 | 44 => Some(DrumVoice::HiHat),
        46 => Some(DrumVoice::OpenHat),
        49 | 57 => Some(DrumVoice::Crash),
        51 | 59 => Some(DrumVoice::Ride),
        _ => None,
    }
}

/// Scientific pitch name with C4 = 60, e.g. 40 -> "E2"
pub fn note_name(note: u8) -> String {
    let octave = i32::from(note / 12) - 1;
    format!("{}{}", NOTE_NAMES[usize::from(note % 12)], octave)
}

/// Inverse of [`note_name`]; sharps only
pub fn note_number(name: &str) -> Option<u8> {
    let split = name.find(|c: char| c == '-' || c.is_ascii_digit())?;
    let (pitch, octave) = name.split_at(split);
    let pitch_class = NOTE_NAMES.iter().position(|&n| n == pitch)? as i32;
    let octave: i32 = octave.parse().ok()?;
    let number = (octave + 1) * 12 + pitch_class;
    u8::try_from(number).ok().filter(|&n| n <= 127)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gm_drum_mapping() {
        assert_eq!(drum_voice_for_note(36), Some(DrumVoice::Kick));
        assert_eq!(drum_voice_for_note(38), Some(DrumVoice::Snare));
        assert_eq!(drum_voice_for_note(44), Some(DrumVoice::HiHat));
        assert_eq!(drum_voice_for_note(46), Some(DrumVoice::OpenHat));
        assert_eq!(drum_voice_for_note(49), Some(DrumVoice::Crash));
        assert_eq!(drum_voice_for_note(51), Some(DrumVoice::Ride));
        assert_eq!(drum_voice_for_note(37), None);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(note_name(28), "E1");
        assert_eq!(note_name(40), "E2");
        assert_eq!(note_name(49), "C#3");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(0), "C-1");
    }

    #[test]
    fn test_note_number_round_trips_bass_range() {
        for note in BASS_RANGE {
            assert_eq!(note_number(&note_name(note)), Some(note));
        }
        assert_eq!(note_number("C-1"), Some(0));
        assert_eq!(note_number("H2"), None);
        assert_eq!(note_number("E"), None);
        assert_eq!(note_number("G9"), Some(127));
        assert_eq!(note_number("G#9"), None);
    }
}

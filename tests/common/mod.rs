//! Builders for Standard MIDI File byte buffers

#![allow(dead_code)]

pub fn varlen(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.insert(0, (value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes
}

/// Accumulates one track's events as raw bytes
#[derive(Default)]
pub struct TrackBuilder {
    bytes: Vec<u8>,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a delta-time followed by `event` verbatim
    pub fn raw(mut self, delta: u32, event: &[u8]) -> Self {
        self.bytes.extend(varlen(delta));
        self.bytes.extend_from_slice(event);
        self
    }

    pub fn note_on(self, delta: u32, channel: u8, note: u8, velocity: u8) -> Self {
        self.raw(delta, &[0x90 | channel, note, velocity])
    }

    pub fn note_off(self, delta: u32, channel: u8, note: u8) -> Self {
        self.raw(delta, &[0x80 | channel, note, 0])
    }

    pub fn program(self, delta: u32, channel: u8, program: u8) -> Self {
        self.raw(delta, &[0xC0 | channel, program])
    }

    pub fn meta(self, delta: u32, meta_type: u8, data: &[u8]) -> Self {
        let mut event = vec![0xFF, meta_type];
        event.extend(varlen(data.len() as u32));
        event.extend_from_slice(data);
        self.raw(delta, &event)
    }

    pub fn tempo(self, delta: u32, micros_per_quarter: u32) -> Self {
        let [_, a, b, c] = micros_per_quarter.to_be_bytes();
        self.meta(delta, 0x51, &[a, b, c])
    }

    pub fn time_signature(self, delta: u32, numerator: u8, exponent: u8) -> Self {
        self.meta(delta, 0x58, &[numerator, exponent, 24, 8])
    }

    pub fn end_of_track(self) -> Self {
        self.meta(0, 0x2F, &[])
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn smf(format: u16, division: u16, tracks: Vec<Vec<u8>>) -> Vec<u8> {
    let mut bytes = b"MThd".to_vec();
    bytes.extend(6u32.to_be_bytes());
    bytes.extend(format.to_be_bytes());
    bytes.extend((tracks.len() as u16).to_be_bytes());
    bytes.extend(division.to_be_bytes());
    for track in tracks {
        bytes.extend(b"MTrk");
        bytes.extend((track.len() as u32).to_be_bytes());
        bytes.extend(track);
    }
    bytes
}

/// Two tracks at 480 PPQ: a 120 BPM, 4/4 conductor track and four kicks on
/// channel 10 one sixteenth apart
pub fn four_kicks() -> Vec<u8> {
    let conductor = TrackBuilder::new()
        .tempo(0, 500_000)
        .time_signature(0, 4, 2)
        .end_of_track()
        .into_bytes();
    let drums = TrackBuilder::new()
        .note_on(0, 9, 36, 100)
        .note_on(120, 9, 36, 100)
        .note_on(120, 9, 36, 100)
        .note_on(120, 9, 36, 100)
        .end_of_track()
        .into_bytes();
    smf(1, 480, vec![conductor, drums])
}

/// Routes library logging to the test harness output
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

use thiserror::Error;

/// Fatal problems found while decoding a Standard MIDI File.
///
/// No partial document is ever returned alongside one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The buffer does not start with `MThd`
    #[error("not a Standard MIDI File: missing MThd header")]
    BadHeaderMagic,

    /// A chunk carried a different tag than the one expected at its position
    #[error("expected {expected} chunk, found {found:?}")]
    UnexpectedChunk {
        expected: &'static str,
        found: [u8; 4],
    },

    /// The data ended before a length-declared field completed
    #[error("unexpected end of data while reading {context} at byte {offset}")]
    Truncated {
        context: &'static str,
        offset: usize,
    },

    /// A variable-length quantity kept its continuation bit past 4 bytes
    #[error("variable-length quantity longer than 4 bytes at byte {offset}")]
    VarLenTooLong { offset: usize },

    /// The header chunk declared fewer than the 6 bytes it must hold
    #[error("header chunk too short: {length} bytes")]
    HeaderTooShort { length: u32 },

    #[error("failed to read MIDI file: {0}")]
    Io(String),
}

/// Errors raised by MIDI output devices
#[derive(Debug, Error)]
pub enum MidiError {
    /// Error when connecting to a MIDI device
    #[error("MIDI connection error: {0}")]
    ConnectionError(String),
    /// Error when sending a MIDI message
    #[error("MIDI send error: {0}")]
    SendError(String),
    /// No output port matched the requested name
    #[error("MIDI output device '{0}' not found")]
    DeviceNotFound(String),
}

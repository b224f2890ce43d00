//! Standard MIDI File decoder
//!
//! Turns a raw byte buffer into a [`MidiDocument`]. Structural problems
//! (bad magic, truncation) are fatal; unknown status bytes are logged and
//! recorded as [`EventKind::Other`] so decoding can carry on.

use super::error::FormatError;
use super::event::{Division, EventKind, MetaEvent, MidiDocument, RawEvent, Track};
use super::reader::ByteReader;
use log::{debug, info, warn};
use std::path::Path;

const HEADER_MAGIC: &[u8; 4] = b"MThd";
const TRACK_MAGIC: &[u8; 4] = b"MTrk";
const HEADER_LENGTH: u32 = 6;

/// Decodes a complete Standard MIDI File held in memory.
///
/// Variable-length quantities are limited to 4 bytes; a longer one fails
/// with [`FormatError::VarLenTooLong`] rather than being read on.
pub fn decode(bytes: &[u8]) -> Result<MidiDocument, FormatError> {
    if !bytes.starts_with(HEADER_MAGIC) {
        return Err(FormatError::BadHeaderMagic);
    }

    let mut reader = ByteReader::new(bytes);
    reader.read_tag("header magic")?;

    let header_length = reader.read_u32("header length")?;
    if header_length < HEADER_LENGTH {
        return Err(FormatError::HeaderTooShort {
            length: header_length,
        });
    }
    let mut header = reader.sub_reader(header_length as usize, "header chunk")?;
    let format = header.read_u16("format type")?;
    let track_count = header.read_u16("track count")?;
    let division = Division::from_word(header.read_u16("division")?);

    info!(
        "MIDI header: format {}, {} tracks, division {:?}",
        format, track_count, division
    );

    let tracks = (0..track_count)
        .map(|index| decode_track(&mut reader, index))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MidiDocument {
        format,
        division,
        tracks,
    })
}

/// Reads and decodes a file from disk
pub fn decode_file(path: &Path) -> Result<MidiDocument, FormatError> {
    let bytes = std::fs::read(path).map_err(|e| FormatError::Io(e.to_string()))?;
    decode(&bytes)
}

fn decode_track(reader: &mut ByteReader<'_>, index: u16) -> Result<Track, FormatError> {
    let tag = reader.read_tag("track magic")?;
    if &tag != TRACK_MAGIC {
        return Err(FormatError::UnexpectedChunk {
            expected: "MTrk",
            found: tag,
        });
    }

    let length = reader.read_u32("track length")?;
    let mut body = reader.sub_reader(length as usize, "track chunk")?;

    // Running status never carries over from a previous track
    let mut running_status: Option<u8> = None;
    let mut events = Vec::new();

    while !body.is_empty() {
        let delta_ticks = body.read_varlen("delta-time")?;
        events.push(decode_event(&mut body, delta_ticks, &mut running_status)?);
    }

    debug!("Track {}: decoded {} events", index, events.len());
    Ok(Track { events })
}

fn decode_event(
    body: &mut ByteReader<'_>,
    delta_ticks: u32,
    running_status: &mut Option<u8>,
) -> Result<RawEvent, FormatError> {
    let status = match body.peek_u8() {
        Some(byte) if byte & 0x80 != 0 => {
            body.read_u8("status byte")?;
            *running_status = Some(byte);
            byte
        }
        Some(byte) => match *running_status {
            Some(status) => status,
            None => {
                warn!(
                    "Data byte {:#04x} at offset {} with no running status, skipping",
                    byte,
                    body.offset()
                );
                return Ok(RawEvent {
                    delta_ticks,
                    channel: 0,
                    kind: EventKind::Other { status: 0 },
                });
            }
        },
        None => {
            return Err(FormatError::Truncated {
                context: "status byte",
                offset: body.offset(),
            })
        }
    };

    let channel = status & 0x0F;
    let kind = match status & 0xF0 {
        0x80 => EventKind::NoteOff {
            note: body.read_u8("note number")?,
            velocity: body.read_u8("velocity")?,
        },
        0x90 => {
            let note = body.read_u8("note number")?;
            let velocity = body.read_u8("velocity")?;
            if velocity == 0 {
                EventKind::NoteOff { note, velocity }
            } else {
                EventKind::NoteOn { note, velocity }
            }
        }
        0xB0 => EventKind::Controller {
            controller: body.read_u8("controller number")?,
            value: body.read_u8("controller value")?,
        },
        0xC0 => EventKind::ProgramChange {
            program: body.read_u8("program number")?,
        },
        0xE0 => {
            let low = u16::from(body.read_u8("pitch bend")?);
            let high = u16::from(body.read_u8("pitch bend")?);
            EventKind::PitchBend {
                value: low | (high << 7),
            }
        }
        0xF0 if status == 0xFF => {
            let meta_type = body.read_u8("meta type")?;
            let length = body.read_varlen("meta length")?;
            let data = body.read_bytes(length as usize, "meta data")?;
            EventKind::Meta(MetaEvent::new(meta_type, data.to_vec()))
        }
        0xF0 => {
            let length = body.read_varlen("system exclusive length")?;
            body.read_bytes(length as usize, "system exclusive data")?;
            EventKind::Other { status }
        }
        _ => {
            warn!(
                "Unknown MIDI event type {:#04x} at offset {}, skipping",
                status & 0xF0,
                body.offset()
            );
            EventKind::Other { status }
        }
    };

    Ok(RawEvent {
        delta_ticks,
        channel,
        kind,
    })
}

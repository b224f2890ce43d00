//! MIDI functionality for midistep
//!
//! This module provides:
//! - A Standard MIDI File decoder producing a [`MidiDocument`]
//! - The [`MidiEngine`] trait for sending note messages to a device
//! - [`MidirEngine`] for real MIDI output and [`MockMidiEngine`] for tests
//!
mod decoder;
mod engine;
mod error;
mod event;
pub mod midir_engine;
pub mod mock_engine;
mod reader;

pub use decoder::{decode, decode_file};
pub use engine::{MidiEngine, MidiMessage, Result};
pub use error::{FormatError, MidiError};
pub use event::{
    Division, EventKind, MetaEvent, MidiDocument, RawEvent, Track, META_TEMPO,
    META_TIME_SIGNATURE, SMPTE_FALLBACK_PPQ,
};
pub use reader::read_varlen;

pub use midir_engine::{list_output_ports, MidirEngine};
pub use mock_engine::MockMidiEngine;

// General MIDI reserves channel 10 (index 9) for percussion
pub const GM_DRUM_CHANNEL: u8 = 9;

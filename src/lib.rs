//! midistep: Standard MIDI File to step pattern conversion and lookahead
//! playback.
//!
//! The pipeline is `midi::decode` → `pattern::extract` → [`Scheduler`],
//! with [`PatternPlayer`] turning scheduled steps into timed MIDI output.

pub mod cli;
pub mod clock;
pub mod config;
pub mod logging;
pub mod midi;
pub mod midi_output;
pub mod pattern;
pub mod player;
pub mod scheduler;
pub mod state;
pub mod ui;

pub use clock::{AudioClock, ManualClock, MonotonicClock};
pub use config::Settings;
pub use pattern::{extract, DrumVoice, StepPattern};
pub use player::{PatternPlayer, PlayerConfig, StepEvent};
pub use scheduler::{ManualTimer, Scheduler, SchedulerConfig, StepHandler, ThreadTimer, WakeTimer};
pub use state::{PatternSlot, PlaybackCursor};

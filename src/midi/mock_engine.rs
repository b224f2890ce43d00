use crate::midi::{MidiEngine, MidiMessage, Result};
use std::sync::{Arc, Mutex};

/// Records every message it is asked to send.
///
/// Clones share the same log, so a test can keep one handle while the
/// output thread owns another.
#[derive(Clone, Default)]
pub struct MockMidiEngine {
    sent: Arc<Mutex<Vec<MidiMessage>>>,
}

impl MockMidiEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<MidiMessage> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl MidiEngine for MockMidiEngine {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(msg);
        }
        Ok(())
    }
}

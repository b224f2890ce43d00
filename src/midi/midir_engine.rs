use crate::midi::{MidiEngine, MidiError, MidiMessage, Result};
use log::{debug, info};
use midir::{MidiOutput, MidiOutputConnection};

const CLIENT_NAME: &str = "midistep-out";

/// Output connection to a real MIDI device
pub struct MidirEngine {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidirEngine {
    /// Connects to the first output port whose name contains `device_name`,
    /// or to the first available port when no name is given
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let midi_out =
            MidiOutput::new(CLIENT_NAME).map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        let out_ports = midi_out.ports();
        let port = match device_name {
            Some(name) => out_ports
                .iter()
                .find(|p| midi_out.port_name(p).unwrap_or_default().contains(name))
                .ok_or_else(|| MidiError::DeviceNotFound(name.to_string()))?,
            None => out_ports
                .first()
                .ok_or_else(|| MidiError::ConnectionError("No MIDI output ports available".into()))?,
        };

        let port_name = midi_out
            .port_name(port)
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;
        info!("Connecting to MIDI output port: {}", port_name);

        let connection = midi_out
            .connect(port, "midistep-output-conn")
            .map_err(|e| MidiError::ConnectionError(e.to_string()))?;

        Ok(MidirEngine {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl MidiEngine for MidirEngine {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        debug!("Sending {:?}", msg);
        self.connection
            .send(&msg.to_bytes())
            .map_err(|e| MidiError::SendError(e.to_string()))
    }
}

/// Names of all MIDI output ports on this machine
#[cfg(not(feature = "test-mock"))]
pub fn list_output_ports() -> Vec<String> {
    match MidiOutput::new("midistep-port-lister") {
        Ok(midi_out) => midi_out
            .ports()
            .iter()
            .filter_map(|p| midi_out.port_name(p).ok())
            .collect(),
        Err(e) => {
            log::error!("Failed to list MIDI ports: {}", e);
            vec![]
        }
    }
}

#[cfg(feature = "test-mock")]
pub fn list_output_ports() -> Vec<String> {
    // Mock implementation for tests - simple format as expected by tests
    vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
}

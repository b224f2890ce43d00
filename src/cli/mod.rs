use crate::config::Settings;
use clap::Parser;
use dialoguer::Select;
use std::path::PathBuf;

/// Convert a MIDI file into a 16-step drum and bass pattern
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Standard MIDI file to convert
    #[arg(required_unless_present = "device_list")]
    pub file: Option<PathBuf>,

    /// Quantize divisor (16 enables swing, 0 keeps the plain sixteenth grid)
    #[arg(short, long)]
    pub quantize: Option<u32>,

    /// Swing amount in percent
    #[arg(short, long)]
    pub swing: Option<f64>,

    /// Override the tempo read from the file
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(60..=200))]
    pub bpm: Option<u32>,

    /// Print the pattern as JSON instead of a grid
    #[arg(long)]
    pub json: bool,

    /// Play the pattern through a MIDI output port
    #[arg(long)]
    pub play: bool,

    /// Number of times to play the pattern
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub loops: u32,

    /// MIDI output device (matched by substring)
    #[arg(long)]
    pub midi_output: Option<String>,

    /// List available MIDI output devices
    #[arg(long)]
    pub device_list: bool,

    /// Settings file (defaults to ./midistep.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Command-line values win over every other settings layer
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(quantize) = self.quantize {
            settings.quantize = quantize;
        }
        if let Some(swing) = self.swing {
            settings.swing = swing;
        }
        if let Some(device) = &self.midi_output {
            settings.midi_output = Some(device.clone());
        }
    }
}

pub fn handle_device_list() -> Vec<String> {
    crate::midi::list_output_ports()
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}

/// Picks the output port: the configured one if any, the only one if there
/// is just one, otherwise asks on the terminal
pub fn choose_device(requested: Option<&str>, devices: &[String]) -> Result<String, String> {
    if let Some(name) = requested {
        validate_device(name, devices)?;
        return Ok(name.to_string());
    }

    match devices {
        [] => Err("Error: No MIDI output devices available".to_string()),
        [only] => Ok(only.clone()),
        _ => Select::new()
            .with_prompt("Select a MIDI output device")
            .items(devices)
            .default(0)
            .interact()
            .map(|index| devices[index].clone())
            .map_err(|e| format!("Error: Device selection failed: {}", e)),
    }
}

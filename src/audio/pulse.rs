use libpulse_binding as pulse;
use libpulse_simple_binding as psimple;
use pulse::sample::{Format, Spec};
use pulse::stream::Direction;
use std::io;
use tracing::{info, warn};

use super::source::AudioSource;
use crate::error::AnalysisError;

/// Mono s16le record stream on PulseAudio/PipeWire.
///
/// The connection closes when this is dropped.
pub struct PulseSource {
    stream: psimple::Simple,
    device: Option<String>,
    sample_rate: u32,
}

impl PulseSource {
    /// Open a record stream on `device`, or on the default sink's monitor when `None`.
    pub fn open(device: Option<String>, sample_rate: u32) -> Result<Self, AnalysisError> {
        let spec = Spec {
            format: Format::S16le,
            channels: 1,
            rate: sample_rate,
        };

        if !spec.is_valid() {
            return Err(AnalysisError::InvalidConfig(format!(
                "PulseAudio rejects sample rate {}",
                sample_rate
            )));
        }

        let device = device.or_else(find_monitor_source);
        info!("Using audio device: {}", device.as_deref().unwrap_or("default"));

        let stream = psimple::Simple::new(
            None,                // Use default server
            "fftscope",          // Application name
            Direction::Record,   // Recording stream
            device.as_deref(),   // Device name (None = default)
            "spectrum-analyzer", // Stream description
            &spec,               // Sample format
            None,                // Default channel map
            None,                // Default buffering attributes
        )
        .map_err(|e| AnalysisError::DeviceUnavailable(format!("{:?}", e)))?;

        info!("Connected to PulseAudio at {} Hz", sample_rate);

        Ok(Self {
            stream,
            device,
            sample_rate,
        })
    }
}

impl AudioSource for PulseSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // The simple API blocks until the whole buffer is filled
        self.stream
            .read(buf)
            .map_err(|e| io::Error::other(format!("PulseAudio read error: {:?}", e)))?;
        Ok(buf.len())
    }

    fn describe(&self) -> String {
        format!(
            "pulse:{} @ {} Hz",
            self.device.as_deref().unwrap_or("default"),
            self.sample_rate
        )
    }
}

/// List available PulseAudio/PipeWire sources.
///
/// Returns a list of `(name, state)` tuples parsed from `pactl list short sources`.
pub fn list_sources() -> anyhow::Result<Vec<(String, String)>> {
    let output = std::process::Command::new("pactl")
        .args(["list", "short", "sources"])
        .output()
        .map_err(|e| anyhow::anyhow!("Failed to run pactl: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("pactl list short sources failed"));
    }

    Ok(parse_source_list(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_source_list(text: &str) -> Vec<(String, String)> {
    // Format: <id>\t<name>\t<module>\t<sample_spec>\t<state>
    text.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('\t').collect();
            (cols.len() >= 5).then(|| (cols[1].to_string(), cols[4].to_string()))
        })
        .collect()
}

/// Monitor source of the default sink, so we analyze whatever is playing.
fn find_monitor_source() -> Option<String> {
    if let Ok(output) = std::process::Command::new("pactl")
        .args(["get-default-sink"])
        .output()
    {
        if output.status.success() {
            let sink_name = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !sink_name.is_empty() {
                let monitor = format!("{}.monitor", sink_name);
                info!("Using default sink monitor: {}", monitor);
                return Some(monitor);
            }
        }
    }

    warn!("Could not determine default sink, using PulseAudio default source");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_list() {
        let text = "0\talsa_output.pci.monitor\tmodule-alsa-card.c\ts16le 2ch 44100Hz\tRUNNING\n\
                    1\talsa_input.pci\tmodule-alsa-card.c\ts16le 2ch 44100Hz\tSUSPENDED\n\
                    garbage line\n";

        let sources = parse_source_list(text);
        assert_eq!(
            sources,
            vec![
                ("alsa_output.pci.monitor".to_string(), "RUNNING".to_string()),
                ("alsa_input.pci".to_string(), "SUSPENDED".to_string()),
            ]
        );
    }
}

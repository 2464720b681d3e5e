use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::FftAlgorithm;
use crate::cli::Args;
use crate::display::DisplayMode;
use crate::error::AnalysisError;

/// Where PCM comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// PulseAudio/PipeWire record stream
    #[default]
    Pulse,
    /// Raw s16le mono on standard input
    Stdin,
    /// Raw s16le mono file
    File,
    /// Synthetic sine tone
    Tone,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub source: SourceKind,
    /// Pulse source name (None = monitor of the default sink)
    pub device: Option<String>,
    /// Path for the file source
    pub input: Option<PathBuf>,
    pub sample_rate: u32,
    pub tone_frequency: f64,
    pub tone_amplitude: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Pulse,
            device: None,
            input: None,
            sample_rate: 44100,
            tone_frequency: 1000.0,
            tone_amplitude: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Samples per frame, a power of two
    pub fft_size: usize,
    pub algorithm: FftAlgorithm,
    /// Failed cycles in a row before the capture thread starts backing off
    pub max_consecutive_errors: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            algorithm: FftAlgorithm::Recursive,
            max_consecutive_errors: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub mode: DisplayMode,
    /// Reader polls per second
    pub refresh_rate: u32,
    /// Linear display scale applied to magnitudes
    pub gain: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Terminal,
            refresh_rate: 30,
            gain: 0.25,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Get the default XDG config path (~/.config/fftscope/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("fftscope").join("config.toml"))
    }

    /// Load config from the default XDG path if it exists
    /// Returns None if file doesn't exist, logs warning on parse errors
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return None;
        }
        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("{:#}; using defaults", e);
                None
            }
        }
    }

    /// Initialize default config file at XDG path, returns the path
    pub fn init_default_config() -> Result<PathBuf> {
        let path = Self::default_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, Self::generate_config_template())?;
        Ok(path)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let fft_size = self.analysis.fft_size;
        if fft_size < 2 || !fft_size.is_power_of_two() {
            return Err(AnalysisError::SizeNotPowerOfTwo(fft_size));
        }
        if self.audio.sample_rate == 0 {
            return Err(AnalysisError::InvalidConfig("sample_rate must be positive".into()));
        }
        if self.audio.source == SourceKind::File && self.audio.input.is_none() {
            return Err(AnalysisError::InvalidConfig(
                "source = \"file\" needs audio.input".into(),
            ));
        }
        if self.audio.source == SourceKind::Tone {
            let nyquist = self.audio.sample_rate as f64 / 2.0;
            if !(0.0..nyquist).contains(&self.audio.tone_frequency) {
                return Err(AnalysisError::InvalidConfig(format!(
                    "tone_frequency {} must be below Nyquist ({} Hz)",
                    self.audio.tone_frequency, nyquist
                )));
            }
        }
        if self.display.refresh_rate == 0 {
            return Err(AnalysisError::InvalidConfig("refresh_rate must be positive".into()));
        }
        Ok(())
    }

    /// Generate a commented TOML config template
    pub fn generate_config_template() -> String {
        r#"# fftscope configuration
# This file is auto-generated. Edit as needed.

[audio]
# Capture source: "pulse", "stdin", "file", or "tone"
source = "pulse"
# Pulse source name (omit = monitor of the default sink)
# device = "alsa_output.pci-0000_00_1f.3.analog-stereo.monitor"
# Raw mono s16le PCM file for source = "file"
# input = "/tmp/capture.raw"
# Sample rate in Hz (must match the source; it is not negotiated)
sample_rate = 44100
# Sine tone for source = "tone"
tone_frequency = 1000.0
tone_amplitude = 0.8

[analysis]
# Samples per frame, power of two (512, 1024, 2048)
fft_size = 1024
# FFT formulation: "recursive" or "iterative"
algorithm = "recursive"
# Failed frames in a row before capture slows its retries
max_consecutive_errors = 32

[display]
# Reader: "terminal" (bar display) or "monitor" (logs the dominant frequency)
mode = "terminal"
# Reader polls per second
refresh_rate = 30
# Fraction of the display height per unit of linear magnitude
gain = 0.25
"#
        .to_string()
    }

    /// Merge CLI arguments into config (CLI takes priority)
    pub fn merge_args(&mut self, args: &Args) {
        // Audio settings
        if let Some(source) = args.source {
            self.audio.source = source;
        }
        if let Some(ref device) = args.device {
            self.audio.device = Some(device.clone());
        }
        if let Some(ref input) = args.input {
            self.audio.input = Some(input.clone());
            // An input path on its own implies the file source
            if args.source.is_none() {
                self.audio.source = SourceKind::File;
            }
        }
        if let Some(rate) = args.sample_rate {
            self.audio.sample_rate = rate;
        }
        if let Some(freq) = args.tone_frequency {
            self.audio.tone_frequency = freq;
        }

        // Analysis settings
        if let Some(size) = args.fft_size {
            self.analysis.fft_size = size;
        }
        if let Some(algorithm) = args.algorithm {
            self.analysis.algorithm = algorithm;
        }

        // Display settings
        if let Some(mode) = args.mode {
            self.display.mode = mode;
        }
        if let Some(rate) = args.refresh_rate {
            self.display.refresh_rate = rate;
        }
        if let Some(gain) = args.gain {
            self.display.gain = gain.max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_template_parses_to_defaults() {
        let config: Config = toml::from_str(&Config::generate_config_template()).unwrap();
        let defaults = Config::default();

        assert_eq!(config.audio.source, defaults.audio.source);
        assert_eq!(config.audio.sample_rate, defaults.audio.sample_rate);
        assert_eq!(config.analysis.fft_size, defaults.analysis.fft_size);
        assert_eq!(config.analysis.algorithm, defaults.analysis.algorithm);
        assert_eq!(config.display.refresh_rate, defaults.display.refresh_rate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = toml::from_str("[analysis]\nfft_size = 2048\nalgorithm = \"iterative\"\n").unwrap();

        assert_eq!(config.analysis.fft_size, 2048);
        assert_eq!(config.analysis.algorithm, FftAlgorithm::Iterative);
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.display.mode, DisplayMode::Terminal);
    }

    #[test]
    fn test_validate_rejects_bad_fft_size() {
        let mut config = Config::default();
        config.analysis.fft_size = 100;
        assert!(matches!(config.validate(), Err(AnalysisError::SizeNotPowerOfTwo(100))));
    }

    #[test]
    fn test_validate_file_needs_input() {
        let mut config = Config::default();
        config.audio.source = SourceKind::File;
        assert!(matches!(config.validate(), Err(AnalysisError::InvalidConfig(_))));

        config.audio.input = Some(PathBuf::from("/tmp/x.raw"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_tone_below_nyquist() {
        let mut config = Config::default();
        config.audio.source = SourceKind::Tone;
        config.audio.tone_frequency = 30000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "fftscope",
            "--mode",
            "monitor",
            "--fft-size",
            "2048",
            "--algorithm",
            "iterative",
            "--input",
            "capture.raw",
            "--sample-rate",
            "48000",
        ]);

        let mut config = Config::default();
        config.merge_args(&args);

        assert_eq!(config.display.mode, DisplayMode::Monitor);
        assert_eq!(config.analysis.fft_size, 2048);
        assert_eq!(config.analysis.algorithm, FftAlgorithm::Iterative);
        assert_eq!(config.audio.source, SourceKind::File);
        assert_eq!(config.audio.input, Some(PathBuf::from("capture.raw")));
        assert_eq!(config.audio.sample_rate, 48000);
    }

    #[test]
    fn test_explicit_source_wins_over_input() {
        let args = Args::parse_from(["fftscope", "--source", "stdin", "--input", "ignored.raw"]);
        let mut config = Config::default();
        config.merge_args(&args);
        assert_eq!(config.audio.source, SourceKind::Stdin);
    }
}

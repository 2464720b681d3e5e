use clap::Parser;
use std::path::PathBuf;

use crate::audio::FftAlgorithm;
use crate::config::SourceKind;
use crate::display::DisplayMode;

#[derive(Parser, Debug)]
#[command(name = "fftscope")]
#[command(author, version, about = "Real-time audio spectrum analyzer")]
pub struct Args {
    /// Reader: terminal bar display or headless monitor
    #[arg(short, long)]
    pub mode: Option<DisplayMode>,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Capture source
    #[arg(short, long)]
    pub source: Option<SourceKind>,

    /// PulseAudio source name (default: monitor of the default sink)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Raw mono s16le PCM file (implies --source file)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Sample rate of the input in Hz
    #[arg(short = 'r', long)]
    pub sample_rate: Option<u32>,

    /// Samples per FFT frame (power of two)
    #[arg(short = 'n', long)]
    pub fft_size: Option<usize>,

    /// FFT formulation
    #[arg(short, long)]
    pub algorithm: Option<FftAlgorithm>,

    /// Frequency of the synthetic tone source in Hz
    #[arg(long)]
    pub tone_frequency: Option<f64>,

    /// Reader polls per second
    #[arg(long)]
    pub refresh_rate: Option<u32>,

    /// Display height fraction per unit of magnitude
    #[arg(short, long)]
    pub gain: Option<f64>,

    /// List PulseAudio sources and exit
    #[arg(long)]
    pub list_sources: bool,

    /// Write a commented config file to the default path and exit
    #[arg(long)]
    pub init_config: bool,
}

mod capture;
mod fft;
mod frame;
#[cfg(feature = "pulse")]
mod pulse;
mod source;
mod spectrum;
mod window;

pub use capture::{Capture, CaptureLoop, CaptureStats, EndReason};
pub use fft::{ComplexValue, FftAlgorithm, FftEngine, Frame};
pub use frame::FrameAssembler;
#[cfg(feature = "pulse")]
pub use pulse::{list_sources, PulseSource};
pub use source::{AudioSource, ReaderSource, ToneSource, BYTES_PER_SAMPLE};
pub use spectrum::{Spectrum, SpectrumPublisher, SpectrumReader};
pub use window::WindowTable;

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tracing::info;

use crate::config::{AnalysisConfig, AudioConfig, SourceKind};
use crate::error::AnalysisError;

/// Validate the analysis settings, build the window and engine, and start
/// the capture thread on `source`.
///
/// Every configuration error is returned before the thread is spawned.
pub fn create_pipeline(
    sample_rate: u32,
    analysis: &AnalysisConfig,
    source: Box<dyn AudioSource>,
) -> Result<(Capture, SpectrumReader), AnalysisError> {
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidConfig("sample rate must be positive".into()));
    }

    let engine = FftEngine::new(analysis.fft_size, analysis.algorithm)?;
    let window = Arc::new(WindowTable::hann(analysis.fft_size)?);
    let (publisher, reader) = SpectrumPublisher::new(sample_rate, analysis.fft_size);

    info!(
        "Analysis: {} Hz, FFT size {}, {:.2} Hz/bin, {:.1} ms per frame",
        sample_rate,
        analysis.fft_size,
        sample_rate as f64 / analysis.fft_size as f64,
        analysis.fft_size as f64 / sample_rate as f64 * 1000.0
    );

    let capture_loop = CaptureLoop::new(source, FrameAssembler::new(window), engine, publisher)
        .with_max_consecutive_errors(analysis.max_consecutive_errors);

    let capture = Capture::start(capture_loop)?;
    Ok((capture, reader))
}

/// Open the configured capture source. Device failures surface here, before
/// any pipeline thread exists.
pub fn open_source(audio: &AudioConfig) -> Result<Box<dyn AudioSource>, AnalysisError> {
    match audio.source {
        SourceKind::Pulse => open_pulse(audio),
        SourceKind::Stdin => Ok(Box::new(ReaderSource::new(std::io::stdin(), "stdin"))),
        SourceKind::File => {
            let path = audio.input.as_ref().ok_or_else(|| {
                AnalysisError::InvalidConfig("file source needs an input path".into())
            })?;
            let file = File::open(path)?;
            Ok(Box::new(ReaderSource::new(
                BufReader::new(file),
                format!("file:{}", path.display()),
            )))
        }
        SourceKind::Tone => Ok(Box::new(
            ToneSource::new(audio.tone_frequency, audio.sample_rate)
                .with_amplitude(audio.tone_amplitude)
                .realtime(true),
        )),
    }
}

#[cfg(feature = "pulse")]
fn open_pulse(audio: &AudioConfig) -> Result<Box<dyn AudioSource>, AnalysisError> {
    Ok(Box::new(PulseSource::open(audio.device.clone(), audio.sample_rate)?))
}

#[cfg(not(feature = "pulse"))]
fn open_pulse(_audio: &AudioConfig) -> Result<Box<dyn AudioSource>, AnalysisError> {
    Err(AnalysisError::DeviceUnavailable(
        "built without PulseAudio support (enable the `pulse` feature)".into(),
    ))
}

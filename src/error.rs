use std::io;
use thiserror::Error;

/// Errors raised by the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Window size must be a power of two and at least 2
    #[error("invalid window size {0}: must be a power of two >= 2")]
    InvalidSize(usize),

    #[error("FFT size {0} is not a power of two")]
    SizeNotPowerOfTwo(usize),

    /// The source hit end-of-stream part way through a frame
    #[error("capture ended mid-frame: expected {expected} bytes, received {received}")]
    IncompleteCapture { expected: usize, received: usize },

    #[error("frame has {actual} samples, engine expects {expected}")]
    FrameLength { expected: usize, actual: usize },

    #[error("audio source error: {0}")]
    Source(#[from] io::Error),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to spawn capture thread: {0}")]
    ThreadSpawn(io::Error),
}

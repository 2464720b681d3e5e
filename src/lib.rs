//! Real-time audio spectrum analysis.
//!
//! A capture thread reads s16le PCM from an [`audio::AudioSource`], windows
//! each frame, transforms it and publishes the magnitude spectrum. Readers
//! take the latest snapshot whenever they like through
//! [`audio::SpectrumReader`].

pub mod audio;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;

pub use audio::{create_pipeline, open_source, Spectrum, SpectrumReader};
pub use config::Config;
pub use error::AnalysisError;

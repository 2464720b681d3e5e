use anyhow::Result;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::audio::{Capture, Spectrum, SpectrumReader};
use crate::config::Config;

/// Headless reader: polls the latest spectrum at `refresh_rate` and logs the
/// dominant frequency whenever it moves to a different bin.
pub async fn run(config: &Config, mut reader: SpectrumReader, capture: &Capture) -> Result<()> {
    let period = Duration::from_secs_f64(1.0 / config.display.refresh_rate.max(1) as f64);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut tracker = PeakTracker::default();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping");
                break;
            }
            _ = ticker.tick() => {
                // Read before the update check so a final publish is never skipped
                let finished = capture.is_finished();
                if reader.has_update() {
                    if let Some(line) = tracker.update(&mut reader) {
                        info!("{}", line);
                    }
                } else if finished {
                    info!("Capture finished");
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Remembers the dominant bin so only moves get reported
#[derive(Debug, Default)]
pub struct PeakTracker {
    last_bin: Option<usize>,
}

impl PeakTracker {
    /// Take the latest spectrum; returns a summary line if the peak moved
    pub fn update(&mut self, reader: &mut SpectrumReader) -> Option<String> {
        let spectrum = reader.latest_and_mark();
        debug!("Generation {}", spectrum.generation());

        let bin = spectrum.peak().map(|(bin, _)| bin);
        if bin == self.last_bin {
            return None;
        }
        self.last_bin = bin;
        describe_peak(&spectrum)
    }
}

/// One-line summary of the strongest bin, `None` before the first cycle
pub fn describe_peak(spectrum: &Spectrum) -> Option<String> {
    let (bin, magnitude) = spectrum.peak()?;
    Some(format!(
        "peak {:.1} Hz (bin {}/{}, magnitude {:.3}, generation {})",
        spectrum.frequency_of(bin),
        bin,
        spectrum.len(),
        magnitude,
        spectrum.generation()
    ))
}

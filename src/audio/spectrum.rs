use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use super::fft::Frame;

/// Linear magnitude spectrum for bins `0..N/2` of one analysis cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    magnitudes: Vec<f64>,
    sample_rate: u32,
    fft_size: usize,
    /// 0 for the initial empty value, then 1, 2, ... per published cycle
    generation: u64,
    captured_at: Instant,
}

impl Spectrum {
    /// Placeholder published before the first cycle completes
    pub fn empty(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            magnitudes: Vec::new(),
            sample_rate,
            fft_size,
            generation: 0,
            captured_at: Instant::now(),
        }
    }

    /// Magnitudes of the lower half of a transformed frame. Bins at and above
    /// N/2 mirror the lower half for real input and are dropped.
    pub fn from_transform(transformed: &Frame, sample_rate: u32, generation: u64) -> Self {
        let fft_size = transformed.len();
        let magnitudes = transformed.as_slice()[..fft_size / 2]
            .iter()
            .map(|c| {
                let magnitude = c.norm();
                if magnitude.is_finite() {
                    magnitude
                } else {
                    0.0
                }
            })
            .collect();

        Self {
            magnitudes,
            sample_rate,
            fft_size,
            generation,
            captured_at: Instant::now(),
        }
    }

    pub fn magnitudes(&self) -> &[f64] {
        &self.magnitudes
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Hz per bin
    pub fn bin_resolution(&self) -> f64 {
        self.sample_rate as f64 / self.fft_size as f64
    }

    /// Centre frequency of bin `index`: `index · sample_rate / N`
    pub fn frequency_of(&self, index: usize) -> f64 {
        index as f64 * self.bin_resolution()
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// Strongest bin as `(index, magnitude)`
    pub fn peak(&self) -> Option<(usize, f64)> {
        self.magnitudes
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Single writer side of the latest-spectrum cell.
///
/// Each `publish` builds a complete [`Spectrum`] and swaps it in as a new
/// `Arc`; a published spectrum is never modified, so readers cannot observe a
/// mix of two cycles. Unread spectra are simply replaced.
pub struct SpectrumPublisher {
    sender: watch::Sender<Arc<Spectrum>>,
    sample_rate: u32,
    generation: u64,
}

impl SpectrumPublisher {
    pub fn new(sample_rate: u32, fft_size: usize) -> (Self, SpectrumReader) {
        let (sender, receiver) = watch::channel(Arc::new(Spectrum::empty(sample_rate, fft_size)));
        let publisher = Self {
            sender,
            sample_rate,
            generation: 0,
        };
        (publisher, SpectrumReader::new(receiver))
    }

    /// Compute magnitudes from a transformed frame and make them the latest snapshot
    pub fn publish(&mut self, transformed: &Frame) -> Arc<Spectrum> {
        self.generation += 1;
        let spectrum = Arc::new(Spectrum::from_transform(
            transformed,
            self.sample_rate,
            self.generation,
        ));
        // Works with zero receivers too; the old snapshot drops once its last reader lets go
        self.sender.send_replace(Arc::clone(&spectrum));
        spectrum
    }

    pub fn latest(&self) -> Arc<Spectrum> {
        Arc::clone(&self.sender.borrow())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn subscribe(&self) -> SpectrumReader {
        SpectrumReader::new(self.sender.subscribe())
    }
}

/// Pull-based read handle for renderers. Cheap to clone and never waits on the writer.
#[derive(Clone)]
pub struct SpectrumReader {
    receiver: watch::Receiver<Arc<Spectrum>>,
    // Generation returned by the last `latest_and_mark`
    seen: u64,
}

impl SpectrumReader {
    fn new(receiver: watch::Receiver<Arc<Spectrum>>) -> Self {
        let seen = receiver.borrow().generation();
        Self { receiver, seen }
    }

    /// Most recently published spectrum (empty before the first cycle)
    pub fn latest(&self) -> Arc<Spectrum> {
        Arc::clone(&self.receiver.borrow())
    }

    /// Latest spectrum, and mark it seen for [`has_update`](Self::has_update)
    pub fn latest_and_mark(&mut self) -> Arc<Spectrum> {
        let spectrum = Arc::clone(&self.receiver.borrow_and_update());
        self.seen = spectrum.generation();
        spectrum
    }

    /// Whether something was published since the last `latest_and_mark`.
    /// Still true after the publisher is gone if the final spectrum is unread.
    pub fn has_update(&self) -> bool {
        self.generation() > self.seen
    }

    pub fn generation(&self) -> u64 {
        self.receiver.borrow().generation()
    }

    /// Wait for the next publication. Errors once the publisher is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.receiver.changed().await
    }
}

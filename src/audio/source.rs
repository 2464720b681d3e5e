use std::f64::consts::PI;
use std::io::{self, Read};
use std::thread;
use std::time::{Duration, Instant};

/// Bytes per mono s16le sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// A blocking byte stream of mono, 16-bit signed little-endian PCM.
///
/// `read` behaves like [`std::io::Read::read`]: it may return fewer bytes than
/// requested, and `Ok(0)` means the stream has ended. Dropping the source
/// releases whatever device it holds.
pub trait AudioSource: Send {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Human-readable description for logging
    fn describe(&self) -> String;
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Raw PCM from any reader: stdin, a file, a pipe from `parec`.
pub struct ReaderSource<R> {
    reader: R,
    name: String,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
        }
    }
}

impl<R: Read + Send> AudioSource for ReaderSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Synthetic sine tone, for running the pipeline without a capture device.
pub struct ToneSource {
    frequency: f64,
    sample_rate: u32,
    amplitude: f64,
    sample_index: u64,
    remaining: Option<u64>,
    realtime: bool,
    started: Instant,
    // A sample split across two reads
    pending: Option<u8>,
}

impl ToneSource {
    pub fn new(frequency: f64, sample_rate: u32) -> Self {
        Self {
            frequency,
            sample_rate,
            amplitude: 0.8,
            sample_index: 0,
            remaining: None,
            realtime: false,
            started: Instant::now(),
            pending: None,
        }
    }

    /// Peak amplitude in [0, 1]
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// End the stream after this many samples
    pub fn with_limit(mut self, samples: u64) -> Self {
        self.remaining = Some(samples);
        self
    }

    /// Pace reads to the sample rate like a live device would
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn next_sample(&mut self) -> i16 {
        let t = self.sample_index as f64 / self.sample_rate as f64;
        self.sample_index += 1;
        let value = self.amplitude * (2.0 * PI * self.frequency * t).sin();
        (value * i16::MAX as f64).round() as i16
    }

    fn pace(&self) {
        let due = Duration::from_secs_f64(self.sample_index as f64 / self.sample_rate as f64);
        let elapsed = self.started.elapsed();
        if due > elapsed {
            thread::sleep(due - elapsed);
        }
    }
}

impl AudioSource for ToneSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut written = 0;

        if let Some(high) = self.pending.take() {
            if buf.is_empty() {
                self.pending = Some(high);
                return Ok(0);
            }
            buf[0] = high;
            written = 1;
        }

        while written < buf.len() {
            if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    break;
                }
                *remaining -= 1;
            }

            let bytes = self.next_sample().to_le_bytes();
            buf[written] = bytes[0];
            written += 1;
            if written < buf.len() {
                buf[written] = bytes[1];
                written += 1;
            } else {
                self.pending = Some(bytes[1]);
            }
        }

        if self.realtime {
            self.pace();
        }

        Ok(written)
    }

    fn describe(&self) -> String {
        format!("sine tone {:.1} Hz @ {} Hz", self.frequency, self.sample_rate)
    }
}

use num_complex::Complex;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::trace;

use super::fft::Frame;
use super::source::{AudioSource, BYTES_PER_SAMPLE};
use super::window::WindowTable;
use crate::error::AnalysisError;

/// Normalization divisor for signed 16-bit PCM
const I16_SCALE: f64 = 32768.0;

/// Collects exactly `2·N` bytes of s16le PCM per frame and turns them into
/// windowed complex samples. Consecutive frames never overlap.
pub struct FrameAssembler {
    window: Arc<WindowTable>,
    buffer: Vec<u8>,
    short_reads: u64,
}

impl FrameAssembler {
    pub fn new(window: Arc<WindowTable>) -> Self {
        let buffer = vec![0u8; window.len() * BYTES_PER_SAMPLE];
        Self {
            window,
            buffer,
            short_reads: 0,
        }
    }

    /// Samples per frame
    pub fn frame_size(&self) -> usize {
        self.window.len()
    }

    /// Reads that returned fewer bytes than were still needed
    pub fn short_reads(&self) -> u64 {
        self.short_reads
    }

    /// Read the next full frame from `source`.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
    pub fn next_frame(&mut self, source: &mut dyn AudioSource) -> Result<Option<Frame>, AnalysisError> {
        let expected = self.buffer.len();
        let mut filled = 0;

        while filled < expected {
            match source.read(&mut self.buffer[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => {
                    return Err(AnalysisError::IncompleteCapture {
                        expected,
                        received: filled,
                    })
                }
                Ok(n) => {
                    filled += n;
                    if filled < expected {
                        self.short_reads += 1;
                        trace!("Short read: {}/{} bytes", filled, expected);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(AnalysisError::Source(e)),
            }
        }

        Ok(Some(self.decode(&self.buffer)))
    }

    /// Convert one block of s16le bytes into a windowed frame.
    ///
    /// `bytes` should hold `2·N` bytes; a trailing odd byte is ignored.
    pub fn decode(&self, bytes: &[u8]) -> Frame {
        let coefficients = self.window.coefficients();

        let values = bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .zip(coefficients)
            .map(|(pair, &w)| {
                let raw = (pair[0] as u16 | ((pair[1] as u16) << 8)) as i16;
                Complex::new(raw as f64 / I16_SCALE * w, 0.0)
            })
            .collect();

        Frame::new(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::source::ReaderSource;
    use std::io::{self, Cursor};

    /// Hands out at most `chunk` bytes per read
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        chunk: usize,
        interrupt_next: bool,
    }

    impl AudioSource for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.interrupt_next {
                self.interrupt_next = false;
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            self.interrupt_next = true;
            let n = buf.len().min(self.chunk).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }

        fn describe(&self) -> String {
            "trickle".into()
        }
    }

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_extremes() {
        // Hann(4) is [0, 0.75, 0.75, 0]
        let window = Arc::new(WindowTable::hann(4).unwrap());
        let assembler = FrameAssembler::new(window);

        let frame = assembler.decode(&pcm(&[i16::MIN, i16::MIN, i16::MAX, 0]));
        let re: Vec<f64> = frame.as_slice().iter().map(|c| c.re).collect();

        assert_eq!(re[0], 0.0);
        assert!((re[1] - (-1.0 * 0.75)).abs() < 1e-12);
        assert!((re[2] - (32767.0 / 32768.0 * 0.75)).abs() < 1e-12);
        assert_eq!(re[3], 0.0);
        assert!(frame.as_slice().iter().all(|c| c.im == 0.0));
    }

    #[test]
    fn test_little_endian_byte_order() {
        let window = Arc::new(WindowTable::hann(4).unwrap());
        let assembler = FrameAssembler::new(window);

        // 0x0100 = 256, 0xFFFE = -2
        let frame = assembler.decode(&[0x00, 0x01, 0xFE, 0xFF, 0, 0, 0, 0]);
        assert_eq!(frame.as_slice()[0].re, 0.0);
        assert!((frame.as_slice()[1].re - (-2.0 / 32768.0 * 0.75)).abs() < 1e-15);

        let frame = assembler.decode(&[0, 0, 0x00, 0x01, 0, 0, 0, 0]);
        assert!((frame.as_slice()[1].re - (256.0 / 32768.0 * 0.75)).abs() < 1e-15);
    }

    #[test]
    fn test_short_reads_still_give_full_frames() {
        let window = Arc::new(WindowTable::hann(64).unwrap());
        let mut assembler = FrameAssembler::new(window.clone());

        let samples: Vec<i16> = (0..128).map(|i| (i * 100) as i16).collect();
        let bytes = pcm(&samples);
        let mut source = Trickle {
            data: bytes.clone(),
            pos: 0,
            chunk: 7,
            interrupt_next: false,
        };

        let first = assembler.next_frame(&mut source).unwrap().unwrap();
        let second = assembler.next_frame(&mut source).unwrap().unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(second.len(), 64);
        assert_eq!(first, assembler.decode(&bytes[..128]));
        assert_eq!(second, assembler.decode(&bytes[128..]));
        assert!(assembler.short_reads() > 0);

        assert!(assembler.next_frame(&mut source).unwrap().is_none());
    }

    #[test]
    fn test_eof_mid_frame() {
        let window = Arc::new(WindowTable::hann(16).unwrap());
        let mut assembler = FrameAssembler::new(window);
        let mut source = ReaderSource::new(Cursor::new(vec![0u8; 20]), "short");

        match assembler.next_frame(&mut source) {
            Err(AnalysisError::IncompleteCapture { expected, received }) => {
                assert_eq!(expected, 32);
                assert_eq!(received, 20);
            }
            other => panic!("expected IncompleteCapture, got {:?}", other),
        }
    }

    #[test]
    fn test_eof_on_boundary() {
        let window = Arc::new(WindowTable::hann(8).unwrap());
        let mut assembler = FrameAssembler::new(window);
        let mut source = ReaderSource::new(Cursor::new(Vec::new()), "empty");

        assert!(assembler.next_frame(&mut source).unwrap().is_none());
    }

    #[test]
    fn test_source_error_surfaces() {
        struct Broken;
        impl AudioSource for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("device gone"))
            }
            fn describe(&self) -> String {
                "broken".into()
            }
        }

        let window = Arc::new(WindowTable::hann(8).unwrap());
        let mut assembler = FrameAssembler::new(window);
        assert!(matches!(assembler.next_frame(&mut Broken), Err(AnalysisError::Source(_))));
    }
}

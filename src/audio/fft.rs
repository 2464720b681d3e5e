use clap::ValueEnum;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::AnalysisError;

/// A single frequency- or time-domain value
pub type ComplexValue = Complex<f64>;

/// An ordered block of complex samples, one analysis cycle's worth.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    values: Vec<ComplexValue>,
}

impl Frame {
    pub fn new(values: Vec<ComplexValue>) -> Self {
        Self { values }
    }

    /// Build a frame from real samples (imaginary parts zero)
    pub fn from_real(samples: &[f64]) -> Self {
        Self {
            values: samples.iter().map(|&s| Complex::new(s, 0.0)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[ComplexValue] {
        &self.values
    }

    pub fn into_inner(self) -> Vec<ComplexValue> {
        self.values
    }
}

impl From<Vec<ComplexValue>> for Frame {
    fn from(values: Vec<ComplexValue>) -> Self {
        Self::new(values)
    }
}

/// Which radix-2 formulation the engine runs. Both produce the same output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FftAlgorithm {
    /// Textbook even/odd split, allocating at every level
    #[default]
    Recursive,
    /// In-place bit-reversal permutation followed by butterfly passes
    Iterative,
}

/// Radix-2 decimation-in-time FFT for a fixed power-of-two size.
///
/// The size is checked once in [`FftEngine::new`]; `transform` only checks that
/// each frame has that length.
#[derive(Debug, Clone)]
pub struct FftEngine {
    size: usize,
    algorithm: FftAlgorithm,
    // W_k = e^{-2πik/N} for k in 0..N/2. A sub-transform of length m reads every (N/m)th entry.
    twiddles: Vec<ComplexValue>,
}

impl FftEngine {
    pub fn new(size: usize, algorithm: FftAlgorithm) -> Result<Self, AnalysisError> {
        if !size.is_power_of_two() {
            return Err(AnalysisError::SizeNotPowerOfTwo(size));
        }

        let twiddles = (0..size / 2)
            .map(|k| {
                let angle = -2.0 * PI * k as f64 / size as f64;
                Complex::new(angle.cos(), angle.sin())
            })
            .collect();

        Ok(Self {
            size,
            algorithm,
            twiddles,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn algorithm(&self) -> FftAlgorithm {
        self.algorithm
    }

    /// Compute the discrete Fourier transform of `frame`
    pub fn transform(&self, frame: Frame) -> Result<Frame, AnalysisError> {
        if frame.len() != self.size {
            return Err(AnalysisError::FrameLength {
                expected: self.size,
                actual: frame.len(),
            });
        }

        let output = match self.algorithm {
            FftAlgorithm::Recursive => self.recursive(frame.as_slice()),
            FftAlgorithm::Iterative => {
                let mut values = frame.into_inner();
                self.iterative(&mut values);
                values
            }
        };

        Ok(Frame::new(output))
    }

    fn recursive(&self, input: &[ComplexValue]) -> Vec<ComplexValue> {
        let n = input.len();
        if n == 1 {
            return vec![input[0]];
        }

        let half = n / 2;
        let even: Vec<ComplexValue> = input.iter().step_by(2).copied().collect();
        let odd: Vec<ComplexValue> = input.iter().skip(1).step_by(2).copied().collect();

        let even = self.recursive(&even);
        let odd = self.recursive(&odd);

        let stride = self.size / n;
        let mut output = vec![Complex::new(0.0, 0.0); n];
        for k in 0..half {
            let t = self.twiddles[k * stride] * odd[k];
            output[k] = even[k] + t;
            output[k + half] = even[k] - t;
        }
        output
    }

    fn iterative(&self, data: &mut [ComplexValue]) {
        let n = data.len();
        if n <= 1 {
            return;
        }

        let bits = n.trailing_zeros();
        for i in 0..n {
            let j = i.reverse_bits() >> (usize::BITS - bits);
            if i < j {
                data.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= n {
            let half = len / 2;
            let stride = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..half {
                    let u = data[start + k];
                    let v = data[start + k + half] * self.twiddles[k * stride];
                    data[start + k] = u + v;
                    data[start + k + half] = u - v;
                }
            }
            len <<= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;
    const ALGORITHMS: [FftAlgorithm; 2] = [FftAlgorithm::Recursive, FftAlgorithm::Iterative];

    fn magnitudes(frame: &Frame) -> Vec<f64> {
        frame.as_slice().iter().map(|c| c.norm()).collect()
    }

    /// Deterministic pseudo-random samples in [-1, 1]
    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_impulse_is_flat() {
        for algorithm in ALGORITHMS {
            let engine = FftEngine::new(64, algorithm).unwrap();
            let mut samples = vec![0.0; 64];
            samples[0] = 1.0;

            let out = engine.transform(Frame::from_real(&samples)).unwrap();
            for (i, mag) in magnitudes(&out).into_iter().enumerate() {
                assert!(
                    (mag - 1.0).abs() < EPSILON,
                    "{:?}: bin {} magnitude {}, expected 1.0", algorithm, i, mag
                );
            }
        }
    }

    #[test]
    fn test_all_ones_n8() {
        for algorithm in ALGORITHMS {
            let engine = FftEngine::new(8, algorithm).unwrap();
            let out = engine.transform(Frame::from_real(&[1.0; 8])).unwrap();
            let mags = magnitudes(&out);

            assert!((mags[0] - 8.0).abs() < EPSILON, "DC was {}", mags[0]);
            for (i, &mag) in mags.iter().enumerate().skip(1) {
                assert!(mag.abs() < EPSILON, "{:?}: bin {} was {}", algorithm, i, mag);
            }
        }
    }

    #[test]
    fn test_single_point_passthrough() {
        let engine = FftEngine::new(1, FftAlgorithm::Recursive).unwrap();
        let value = Complex::new(0.25, -0.5);
        let out = engine.transform(Frame::new(vec![value])).unwrap();
        assert_eq!(out.as_slice(), &[value]);
    }

    #[test]
    fn test_linearity() {
        let n = 256;
        let (a, b) = (0.7, -1.3);
        let x = noise(n, 1);
        let y = noise(n, 2);
        let combined: Vec<f64> = x.iter().zip(&y).map(|(&x, &y)| a * x + b * y).collect();

        for algorithm in ALGORITHMS {
            let engine = FftEngine::new(n, algorithm).unwrap();
            let fx = engine.transform(Frame::from_real(&x)).unwrap();
            let fy = engine.transform(Frame::from_real(&y)).unwrap();
            let fc = engine.transform(Frame::from_real(&combined)).unwrap();

            for k in 0..n {
                let expected = fx.as_slice()[k] * a + fy.as_slice()[k] * b;
                let diff = (fc.as_slice()[k] - expected).norm();
                assert!(diff < 1e-9, "{:?}: bin {} off by {}", algorithm, k, diff);
            }
        }
    }

    #[test]
    fn test_sinusoid_peak_bin() {
        let n = 1024;
        let sample_rate = 44100.0;
        let resolution = sample_rate / n as f64;
        let frequency = 40.0 * resolution;

        let samples: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * frequency * i as f64 / sample_rate).sin())
            .collect();

        for algorithm in ALGORITHMS {
            let engine = FftEngine::new(n, algorithm).unwrap();
            let out = engine.transform(Frame::from_real(&samples)).unwrap();
            let mags = magnitudes(&out);

            let peak = mags[..n / 2]
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap();

            let expected = (frequency * n as f64 / sample_rate).round() as usize;
            assert_eq!(peak, expected, "{:?}: peak at wrong bin", algorithm);
        }
    }

    #[test]
    fn test_parseval() {
        let n = 512;
        let samples = noise(n, 7);
        let time_energy: f64 = samples.iter().map(|s| s * s).sum();

        for algorithm in ALGORITHMS {
            let engine = FftEngine::new(n, algorithm).unwrap();
            let out = engine.transform(Frame::from_real(&samples)).unwrap();
            let freq_energy: f64 = out.as_slice().iter().map(|c| c.norm_sqr()).sum::<f64>() / n as f64;

            assert!(
                (time_energy - freq_energy).abs() < 1e-12 * n as f64 * time_energy.max(1.0),
                "{:?}: time {} vs freq {}", algorithm, time_energy, freq_energy
            );
        }
    }

    #[test]
    fn test_algorithms_match_rustfft() {
        let n = 2048;
        let samples = noise(n, 42);

        let mut reference: Vec<rustfft::num_complex::Complex<f64>> = samples
            .iter()
            .map(|&s| rustfft::num_complex::Complex::new(s, 0.0))
            .collect();
        rustfft::FftPlanner::new().plan_fft_forward(n).process(&mut reference);

        for algorithm in ALGORITHMS {
            let engine = FftEngine::new(n, algorithm).unwrap();
            let out = engine.transform(Frame::from_real(&samples)).unwrap();

            for (k, (ours, theirs)) in out.as_slice().iter().zip(&reference).enumerate() {
                assert!(
                    (ours.re - theirs.re).abs() < 1e-8 && (ours.im - theirs.im).abs() < 1e-8,
                    "{:?}: bin {} is {} but rustfft gives {}", algorithm, k, ours, theirs
                );
            }
        }
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        for size in [0, 3, 100, 1000] {
            assert!(
                matches!(
                    FftEngine::new(size, FftAlgorithm::Recursive),
                    Err(AnalysisError::SizeNotPowerOfTwo(s)) if s == size
                ),
                "size {} should be rejected", size
            );
        }
    }

    #[test]
    fn test_wrong_frame_length() {
        let engine = FftEngine::new(16, FftAlgorithm::Iterative).unwrap();
        let err = engine.transform(Frame::from_real(&[0.0; 8])).unwrap_err();
        assert!(matches!(err, AnalysisError::FrameLength { expected: 16, actual: 8 }));
    }
}

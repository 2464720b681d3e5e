use crate::error::AnalysisError;

/// Precomputed Hann window coefficients for a fixed frame size.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowTable {
    coefficients: Vec<f64>,
}

impl WindowTable {
    /// Compute the Hann window for `size` samples: `0.5 * (1 - cos(2πi / (N-1)))`
    pub fn hann(size: usize) -> Result<Self, AnalysisError> {
        if size < 2 || !size.is_power_of_two() {
            return Err(AnalysisError::InvalidSize(size));
        }

        let denom = (size - 1) as f64;
        let coefficients = (0..size)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / denom;
                0.5 * (1.0 - angle.cos())
            })
            .collect();

        Ok(Self { coefficients })
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Weight samples in place. Extra samples past the table length are left untouched.
    pub fn apply(&self, samples: &mut [f64]) {
        for (sample, w) in samples.iter_mut().zip(&self.coefficients) {
            *sample *= w;
        }
    }
}

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::error::{invalid_argument, Result};

/// Complex DFT of one fixed size, planned once and shared across frames.
///
/// Spectra are exchanged as interleaved `(re, im)` pairs, so a transform of
/// size `N` consumes and produces `2N` floats. The forward direction is
/// unnormalised; the inverse divides by `N`, so forward followed by inverse
/// is the identity.
#[derive(Clone)]
pub struct SpectralTransform {
    size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl SpectralTransform {
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(invalid_argument("transform size must be positive"));
        }
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        Ok(Self {
            size,
            forward,
            inverse,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform of `size` real samples into `2 * size` interleaved floats.
    pub fn forward(&self, real: &[f64]) -> Result<Vec<f64>> {
        if real.len() != self.size {
            return Err(invalid_argument(format!(
                "forward transform expects {} samples, got {}",
                self.size,
                real.len()
            )));
        }
        let mut buffer = real_to_complex(real);
        self.forward.process(&mut buffer);
        Ok(interleave(&buffer))
    }

    /// Inverse transform of `2 * size` interleaved floats; the result is
    /// interleaved too, with the reconstructed real signal at even indices.
    pub fn inverse(&self, spectrum: &[f64]) -> Result<Vec<f64>> {
        if spectrum.len() != 2 * self.size {
            return Err(invalid_argument(format!(
                "inverse transform expects {} interleaved values, got {}",
                2 * self.size,
                spectrum.len()
            )));
        }
        let mut buffer = deinterleave(spectrum);
        self.inverse.process(&mut buffer);

        let scale = 1.0 / self.size as f64;
        for c in buffer.iter_mut() {
            *c *= scale;
        }
        Ok(interleave(&buffer))
    }
}

impl std::fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("size", &self.size)
            .finish()
    }
}

/// Packs real samples into complex values with zero imaginary parts.
pub fn real_to_complex(real: &[f64]) -> Vec<Complex<f64>> {
    real.iter().map(|&r| Complex::new(r, 0.0)).collect()
}

fn interleave(buffer: &[Complex<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(buffer.len() * 2);
    for c in buffer {
        out.push(c.re);
        out.push(c.im);
    }
    out
}

fn deinterleave(values: &[f64]) -> Vec<Complex<f64>> {
    values
        .chunks_exact(2)
        .map(|pair| Complex::new(pair[0], pair[1]))
        .collect()
}

use rayon::prelude::*;
use serde::Deserialize;

use super::chunker::{frame_at, FrameGrid};
use super::error::{invalid_argument, not_supported, Result};
use super::model::{SpectralFrames, SpectralModel};
use super::transform::SpectralTransform;
use super::window::{make_window, WindowKind};

/// Seconds per analysis frame: 1024 samples at 44.1 kHz.
pub const FRAME_DURATION: f64 = 0.0232199546485261;

/// Bins quieter than `max / NOISE_FLOOR_RATIO` within their frame get phase 0.
pub const NOISE_FLOOR_RATIO: f64 = 10000.0;

/// Mono input for one analysis session.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Bit depth of the source file; informational only.
    pub bit_depth: u16,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, bit_depth: u16) -> Self {
        Self {
            samples,
            sample_rate,
            bit_depth,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default)]
    pub window: WindowKind,
    #[serde(default = "default_overlap")]
    pub overlap: f64,
}

fn default_overlap() -> f64 { 0.5 }

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            window: WindowKind::Hann,
            overlap: default_overlap(),
        }
    }
}

/// Frame length for a sample rate, forced even.
pub fn frame_size_for(sample_rate: u32) -> usize {
    let size = (sample_rate as f64 * FRAME_DURATION).floor() as usize;
    if size % 2 == 1 {
        size - 1
    } else {
        size
    }
}

/// Centre frequency in Hz of each visible bin, bin 0 being DC.
pub fn bin_frequencies(bin_count: usize, sample_rate: u32) -> Vec<f64> {
    (0..bin_count)
        .map(|i| i as f64 / bin_count as f64 * sample_rate as f64 / 2.0)
        .collect()
}

/// Magnitude (normalised by frame size) and phase of one interleaved spectrum.
///
/// Phases of bins below the frame's noise floor are forced to 0 so that
/// rounding noise does not show up as meaningful phase.
pub fn polar_frame(spectrum: &[f64], frame_size: usize) -> (Vec<f64>, Vec<f64>) {
    let norm = frame_size as f64;
    let mut magnitudes = Vec::with_capacity(spectrum.len() / 2);
    let mut phases = Vec::with_capacity(spectrum.len() / 2);

    for pair in spectrum.chunks_exact(2) {
        let (re, im) = (pair[0], pair[1]);
        magnitudes.push((re * re + im * im).sqrt() / norm);
        phases.push(wrap_phase(im.atan2(re)));
    }

    let max = magnitudes.iter().copied().fold(0.0f64, f64::max);
    let floor = max / NOISE_FLOOR_RATIO;
    for (phase, &mag) in phases.iter_mut().zip(&magnitudes) {
        if mag == 0.0 || mag < floor {
            *phase = 0.0;
        }
    }

    (magnitudes, phases)
}

// atan2 yields -pi for a negative real part with a -0.0 imaginary part.
fn wrap_phase(phase: f64) -> f64 {
    if phase <= -std::f64::consts::PI {
        std::f64::consts::PI
    } else {
        phase
    }
}

/// Windows, transforms and polar-decomposes every frame of `buffer`.
///
/// Returns `Ok(None)` for an empty buffer: nothing is analysed and the
/// caller keeps whatever model it already had.
pub fn analyze(buffer: &SampleBuffer, settings: &AnalysisSettings) -> Result<Option<SpectralModel>> {
    if buffer.samples.is_empty() {
        log::debug!("Analysis skipped: empty sample buffer");
        return Ok(None);
    }
    if settings.window != WindowKind::Hann {
        return Err(not_supported(format!(
            "analysis requires a hann window, got {}",
            settings.window.name()
        )));
    }

    let frame_size = frame_size_for(buffer.sample_rate);
    if frame_size < 2 {
        return Err(invalid_argument(format!(
            "sample rate {} Hz is too low for analysis",
            buffer.sample_rate
        )));
    }
    let bin_count = frame_size / 2;
    let grid = FrameGrid::new(buffer.samples.len(), frame_size, settings.overlap)?;

    log::info!(
        "Analysis: {} samples, frame size {}, {} frames ({} without overlap), bin resolution {:.2} Hz",
        buffer.samples.len(),
        frame_size,
        grid.frame_count,
        grid.chunk_count,
        buffer.sample_rate as f64 / frame_size as f64
    );

    let window = make_window(frame_size, settings.window)?;
    let transform = SpectralTransform::new(frame_size)?;

    let polar: Vec<(Vec<f64>, Vec<f64>)> = (0..grid.frame_count)
        .into_par_iter()
        .map(|i| {
            let mut frame = frame_at(&buffer.samples, &grid, i);
            for (s, w) in frame.iter_mut().zip(&window) {
                *s *= w;
            }
            let spectrum = transform.forward(&frame)?;
            Ok(polar_frame(&spectrum, frame_size))
        })
        .collect::<Result<_>>()?;

    let (magnitudes, phases): (Vec<_>, Vec<_>) = polar.into_iter().unzip();

    let frames = SpectralFrames {
        frame_size,
        overlap_offset: grid.overlap_offset,
        chunk_count: grid.chunk_count,
        magnitudes,
        phases,
    };

    Ok(Some(SpectralModel::new(
        buffer.sample_rate,
        buffer.samples.len(),
        bin_frequencies(bin_count, buffer.sample_rate),
        frames,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::SpectralError;
    use std::f64::consts::PI;

    #[test]
    fn frame_size_reproduces_1024_at_44100() {
        assert_eq!(frame_size_for(44100), 1024);
        // 48000 * c = 1114.56 -> 1114 (already even)
        assert_eq!(frame_size_for(48000), 1114);
        // 22050 * c = 512.0
        assert_eq!(frame_size_for(22050), 512);
        // 8001 * c = 185.78 -> 185 -> 184
        assert_eq!(frame_size_for(8001), 184);
    }

    #[test]
    fn bin_zero_is_dc() {
        let f = bin_frequencies(512, 44100);
        assert_eq!(f.len(), 512);
        assert_eq!(f[0], 0.0);
        assert!((f[1] - 44100.0 / 1024.0).abs() < 1e-9);
    }

    #[test]
    fn empty_buffer_is_a_no_op() {
        let buffer = SampleBuffer::new(Vec::new(), 44100, 16);
        assert!(analyze(&buffer, &AnalysisSettings::default()).unwrap().is_none());
    }

    #[test]
    fn rejects_non_hann_windows() {
        let buffer = SampleBuffer::new(vec![0.1; 2048], 44100, 16);
        let settings = AnalysisSettings {
            window: WindowKind::Hamming,
            overlap: 0.5,
        };
        assert!(matches!(
            analyze(&buffer, &settings),
            Err(SpectralError::NotSupported(_))
        ));
    }

    #[test]
    fn magnitudes_are_non_negative_and_phases_bounded() {
        let samples: Vec<f32> = (0..5000)
            .map(|i| ((i as f32 * 0.37).sin() * 0.5 + (i as f32 * 0.011).cos() * 0.3))
            .collect();
        let buffer = SampleBuffer::new(samples, 44100, 16);
        let model = analyze(&buffer, &AnalysisSettings::default()).unwrap().unwrap();

        assert_eq!(model.frame_size(), 1024);
        assert_eq!(model.chunk_count(), 5);
        assert_eq!(model.frame_count(), 9);
        assert_eq!(model.overlap_offset(), 512);
        for (mags, phases) in model.frames().magnitudes.iter().zip(&model.frames().phases) {
            assert_eq!(mags.len(), 1024);
            assert_eq!(phases.len(), 1024);
            for (&m, &p) in mags.iter().zip(phases) {
                assert!(m >= 0.0);
                assert!(p > -PI && p <= PI);
            }
        }
    }

    #[test]
    fn noise_level_bins_get_zero_phase() {
        let n = 8;
        let mut spectrum = vec![0.0; 2 * n];
        // Dominant bin 1 and its mirror.
        spectrum[2] = 4.0;
        spectrum[3] = 4.0;
        spectrum[2 * 7] = 4.0;
        spectrum[2 * 7 + 1] = -4.0;
        // Rounding-noise level bin with a non-trivial angle.
        spectrum[2 * 3] = -1e-9;
        spectrum[2 * 3 + 1] = 1e-9;
        // Quiet but above the floor.
        spectrum[2 * 2] = 0.0;
        spectrum[2 * 2 + 1] = 0.01;

        let (mags, phases) = polar_frame(&spectrum, n);
        assert!((mags[1] - (32.0f64).sqrt() / 8.0).abs() < 1e-12);
        assert!((phases[1] - PI / 4.0).abs() < 1e-12);
        assert_eq!(phases[3], 0.0);
        assert!(mags[3] > 0.0);
        assert!((phases[2] - PI / 2.0).abs() < 1e-12);
        assert_eq!(phases[0], 0.0);
    }

    #[test]
    fn negative_zero_imaginary_maps_to_pi() {
        let (_, phases) = polar_frame(&[-1.0, -0.0], 1);
        assert_eq!(phases[0], PI);
    }

    #[test]
    fn dc_signal_concentrates_in_bin_zero() {
        let buffer = SampleBuffer::new(vec![0.5; 1024 * 4], 44100, 16);
        let model = analyze(&buffer, &AnalysisSettings::default()).unwrap().unwrap();
        // Interior frame: Hann-windowed DC, coherent gain ~0.5.
        let m = model.magnitudes(2).unwrap();
        assert!((m[0] - 0.25).abs() < 1e-3);
        assert!(m[0] > m[1]);
        assert!(m[5] < 1e-4);
    }
}

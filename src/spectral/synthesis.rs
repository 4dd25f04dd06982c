use rayon::prelude::*;

use super::error::{invalid_state, not_supported, Result, SpectralError};
use super::model::SpectralFrames;
use super::transform::SpectralTransform;
use super::window::{make_window, WindowKind};

/// Regularisation for undoing the window at the signal edges.
///
/// Phases zeroed by the analysis noise floor leave residue of roughly
/// `max / 10^4` in every frame; dividing that by Hann weights near zero would
/// blow it up, so `y * w / (w^2 + eps^2)` is used in place of `y / w`.
const UNWINDOW_EPSILON: f64 = 3e-4;

/// Rebuilds a flat sample buffer from per-frame magnitude and phase.
///
/// The output holds `chunk_count * frame_size` samples. Only half-overlapping
/// Hann frames, as produced by analysis with the default settings, can be
/// reconstructed.
pub fn synthesize(frames: &SpectralFrames) -> Result<Vec<f32>> {
    synthesize_until(frames, || false)
}

/// Like [`synthesize`], aborting with [`SpectralError::Cancelled`] once `cancelled` returns true.
pub fn synthesize_until<F>(frames: &SpectralFrames, cancelled: F) -> Result<Vec<f32>>
where
    F: Fn() -> bool + Sync,
{
    validate(frames)?;

    let n = frames.frame_size;
    let transform = SpectralTransform::new(n)?;

    let transformed: Vec<Vec<f64>> = frames
        .magnitudes
        .par_iter()
        .zip(frames.phases.par_iter())
        .map(|(mags, phases)| {
            if cancelled() {
                return Err(SpectralError::Cancelled);
            }
            let spectrum = to_interleaved(mags, phases, n);
            let signal = transform.inverse(&spectrum)?;
            Ok(signal.iter().step_by(2).copied().collect())
        })
        .collect::<Result<_>>()?;

    if cancelled() {
        return Err(SpectralError::Cancelled);
    }

    let window = make_window(n, WindowKind::Hann)?;
    let output = overlap_add(&transformed, &window, frames.chunk_count, n - frames.overlap_offset);

    log::info!(
        "Synthesis: {} frames -> {} samples",
        frames.frame_count(),
        output.len()
    );

    Ok(output)
}

fn validate(frames: &SpectralFrames) -> Result<()> {
    if frames.magnitudes.is_empty() || frames.phases.is_empty() {
        return Err(invalid_state("no spectral data to synthesise; run analysis first"));
    }
    if frames.magnitudes.len() != frames.phases.len() {
        return Err(invalid_state(format!(
            "{} magnitude frames but {} phase frames",
            frames.magnitudes.len(),
            frames.phases.len()
        )));
    }
    if frames.frame_size < 2 || frames.overlap_offset * 2 != frames.frame_size {
        return Err(not_supported(format!(
            "overlap-add needs exactly 50% overlap, got {} of {} samples",
            frames.overlap_offset, frames.frame_size
        )));
    }

    if frames.chunk_count == 0 || frames.magnitudes.len() != frames.chunk_count * 2 - 1 {
        return Err(invalid_state(format!(
            "{} overlapping frames do not match {} chunks",
            frames.magnitudes.len(),
            frames.chunk_count
        )));
    }

    let bad_row = frames
        .magnitudes
        .iter()
        .zip(&frames.phases)
        .position(|(m, p)| m.len() != frames.frame_size || p.len() != frames.frame_size);
    if let Some(i) = bad_row {
        return Err(invalid_state(format!(
            "frame {} does not hold {} bins",
            i, frames.frame_size
        )));
    }

    Ok(())
}

/// Polar to interleaved complex, undoing the `1 / frame_size` magnitude normalisation.
fn to_interleaved(magnitudes: &[f64], phases: &[f64], frame_size: usize) -> Vec<f64> {
    let scale = frame_size as f64;
    let mut spectrum = Vec::with_capacity(magnitudes.len() * 2);
    for (&mag, &phase) in magnitudes.iter().zip(phases) {
        let m = mag * scale;
        spectrum.push(m * phase.cos());
        spectrum.push(m * phase.sin());
    }
    spectrum
}

/// Sums half-overlapping windowed frames into `chunk_count` output frames.
///
/// Interior samples are covered by two Hann frames whose weights add to one.
/// The first half of the first frame and the second half of the last frame
/// are covered once, so the window is divided out there instead.
fn overlap_add(transformed: &[Vec<f64>], window: &[f64], chunk_count: usize, hop: usize) -> Vec<f32> {
    let n = window.len();
    let last = chunk_count - 1;
    let mut output = Vec::with_capacity(chunk_count * n);

    for i in 0..chunk_count {
        let current = &transformed[2 * i];
        for j in 0..n {
            let value = if j < hop {
                if i == 0 {
                    unwindow(current[j], window[j])
                } else {
                    current[j] + transformed[2 * i - 1][j + hop]
                }
            } else if i == last {
                unwindow(current[j], window[j])
            } else {
                current[j] + transformed[2 * i + 1][j - hop]
            };
            output.push(value as f32);
        }
    }

    output
}

fn unwindow(sample: f64, weight: f64) -> f64 {
    sample * weight / (weight * weight + UNWINDOW_EPSILON * UNWINDOW_EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::analysis::{analyze, AnalysisSettings, SampleBuffer};
    use std::f64::consts::PI;

    fn sine(len: usize, bin: usize, frame_size: usize, amplitude: f64) -> Vec<f32> {
        (0..len)
            .map(|i| (amplitude * (2.0 * PI * bin as f64 * i as f64 / frame_size as f64).sin()) as f32)
            .collect()
    }

    fn rms_error(a: &[f32], b: &[f32]) -> f64 {
        let sum: f64 = a
            .iter()
            .zip(b)
            .map(|(&x, &y)| (x as f64 - y as f64).powi(2))
            .sum();
        (sum / a.len() as f64).sqrt()
    }

    #[test]
    fn analysis_then_synthesis_reproduces_a_sine() {
        let samples = sine(44100 * 10, 40, 1024, 0.8);
        let buffer = SampleBuffer::new(samples.clone(), 44100, 16);
        let model = analyze(&buffer, &AnalysisSettings::default()).unwrap().unwrap();

        let output = synthesize(model.frames()).unwrap();
        assert_eq!(output.len(), model.chunk_count() * 1024);
        assert!(rms_error(&output[..samples.len()], &samples) < 0.01 * 0.8);
    }

    #[test]
    fn edge_error_is_confined_to_the_outer_samples() {
        let samples = sine(4096, 40, 1024, 0.8);
        let buffer = SampleBuffer::new(samples.clone(), 44100, 16);
        let model = analyze(&buffer, &AnalysisSettings::default()).unwrap().unwrap();
        let output = synthesize(model.frames()).unwrap();
        assert_eq!(output.len(), 4096);

        // Window reversal fades towards zero where the Hann weight vanishes.
        assert_eq!(output[0], 0.0);
        for i in 0..32 {
            for j in [i, 4095 - i] {
                assert!(output[j].abs() <= 0.8 + 0.01, "j={} out={}", j, output[j]);
            }
        }
        for i in 32..4096 - 32 {
            assert!((output[i] - samples[i]).abs() < 0.01, "i={}", i);
        }
    }

    #[test]
    fn interior_samples_are_reconstructed_closely() {
        let samples = sine(3000, 12, 1024, 0.5);
        let buffer = SampleBuffer::new(samples.clone(), 44100, 16);
        let model = analyze(&buffer, &AnalysisSettings::default()).unwrap().unwrap();

        let output = synthesize(model.frames()).unwrap();
        assert_eq!(output.len(), 3 * 1024);
        // Everything covered by two frames.
        for i in 512..2560 {
            assert!((output[i] - samples[i]).abs() < 0.01, "i={}", i);
        }
    }

    #[test]
    fn single_chunk_is_unwindowed() {
        let samples = sine(1024, 5, 1024, 0.5);
        let buffer = SampleBuffer::new(samples.clone(), 44100, 16);
        let model = analyze(&buffer, &AnalysisSettings::default()).unwrap().unwrap();
        assert_eq!(model.frame_count(), 1);

        let output = synthesize(model.frames()).unwrap();
        assert_eq!(output.len(), 1024);
        assert_eq!(output[0], 0.0);
        for j in 256..768 {
            assert!((output[j] - samples[j]).abs() < 1e-3, "j={}", j);
        }
    }

    #[test]
    fn unwindow_inverts_large_weights_and_vanishes_at_zero() {
        assert!((unwindow(0.25, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(unwindow(0.3, 0.0), 0.0);
    }

    #[test]
    fn empty_frames_are_invalid_state() {
        let frames = SpectralFrames {
            frame_size: 4,
            overlap_offset: 2,
            chunk_count: 0,
            magnitudes: Vec::new(),
            phases: Vec::new(),
        };
        assert!(matches!(synthesize(&frames), Err(SpectralError::InvalidState(_))));
    }

    #[test]
    fn mismatched_frames_are_invalid_state() {
        let frames = SpectralFrames {
            frame_size: 4,
            overlap_offset: 2,
            chunk_count: 2,
            magnitudes: vec![vec![0.0; 4]; 3],
            phases: vec![vec![0.0; 4]; 2],
        };
        assert!(matches!(synthesize(&frames), Err(SpectralError::InvalidState(_))));

        let frames = SpectralFrames {
            frame_size: 4,
            overlap_offset: 2,
            chunk_count: 2,
            magnitudes: vec![vec![0.0; 4], vec![0.0; 3], vec![0.0; 4]],
            phases: vec![vec![0.0; 4]; 3],
        };
        assert!(matches!(synthesize(&frames), Err(SpectralError::InvalidState(_))));
    }

    #[test]
    fn other_overlaps_are_not_supported() {
        let frames = SpectralFrames {
            frame_size: 4,
            overlap_offset: 0,
            chunk_count: 2,
            magnitudes: vec![vec![0.0; 4]; 2],
            phases: vec![vec![0.0; 4]; 2],
        };
        assert!(matches!(synthesize(&frames), Err(SpectralError::NotSupported(_))));
    }

    #[test]
    fn cancellation_commits_nothing() {
        let samples = sine(4096, 3, 1024, 0.5);
        let buffer = SampleBuffer::new(samples, 44100, 16);
        let model = analyze(&buffer, &AnalysisSettings::default()).unwrap().unwrap();
        assert_eq!(
            synthesize_until(model.frames(), || true),
            Err(SpectralError::Cancelled)
        );
    }
}

use serde::Deserialize;
use std::f64::consts::PI;

use super::error::{invalid_argument, Result};

/// Window functions available for framing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Flat,
    #[default]
    Hann,
    Hamming,
    Blackman,
}

impl WindowKind {
    pub fn name(self) -> &'static str {
        match self {
            WindowKind::Flat => "flat",
            WindowKind::Hann => "hann",
            WindowKind::Hamming => "hamming",
            WindowKind::Blackman => "blackman",
        }
    }
}

/// Per-sample weights of `kind` over `length` samples (symmetric form, `length - 1` denominator).
pub fn make_window(length: usize, kind: WindowKind) -> Result<Vec<f64>> {
    if length < 2 {
        return Err(invalid_argument(format!(
            "window length must be at least 2, got {}",
            length
        )));
    }

    let denom = (length - 1) as f64;
    let window = match kind {
        WindowKind::Flat => vec![1.0; length],
        WindowKind::Hann => (0..length)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
            .collect(),
        WindowKind::Hamming => (0..length)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos())
            .collect(),
        WindowKind::Blackman => {
            let alpha = 0.16;
            let a0 = (1.0 - alpha) / 2.0;
            let a1 = 0.5;
            let a2 = alpha / 2.0;
            (0..length)
                .map(|i| {
                    let x = i as f64 / denom;
                    a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
                })
                .collect()
        }
    };

    Ok(window)
}

/// Mean weight of the window, i.e. the factor a windowed sinusoid's peak is scaled by.
pub fn coherent_gain(window: &[f64]) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().sum::<f64>() / window.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const KINDS: [WindowKind; 4] = [
        WindowKind::Flat,
        WindowKind::Hann,
        WindowKind::Hamming,
        WindowKind::Blackman,
    ];

    #[test]
    fn rejects_short_lengths() {
        for kind in KINDS {
            assert!(matches!(
                make_window(0, kind),
                Err(crate::spectral::SpectralError::InvalidArgument(_))
            ));
            assert!(make_window(1, kind).is_err());
        }
    }

    #[test]
    fn values_stay_in_unit_range() {
        for kind in KINDS {
            for len in [2usize, 3, 7, 64, 1023, 1024] {
                let w = make_window(len, kind).unwrap();
                assert_eq!(w.len(), len);
                for &v in &w {
                    assert!(v >= -1e-12 && v <= 1.0 + 1e-12, "{} {} {}", kind.name(), len, v);
                }
            }
        }
    }

    #[test]
    fn hann_endpoints_are_zero() {
        let w = make_window(1024, WindowKind::Hann).unwrap();
        assert!(w[0].abs() < 1e-12);
        assert!(w[1023].abs() < 1e-12);
        let w = make_window(2, WindowKind::Hann).unwrap();
        assert!(w[0].abs() < 1e-12 && w[1].abs() < 1e-12);
    }

    #[test]
    fn flat_is_all_ones() {
        let w = make_window(16, WindowKind::Flat).unwrap();
        assert!(w.iter().all(|&v| v == 1.0));
        assert_eq!(coherent_gain(&w), 1.0);
    }

    #[test]
    fn hamming_and_blackman_match_reference_points() {
        let h = make_window(5, WindowKind::Hamming).unwrap();
        assert!((h[0] - 0.08).abs() < 1e-12);
        assert!((h[2] - 1.0).abs() < 1e-12);

        let b = make_window(5, WindowKind::Blackman).unwrap();
        assert!(b[0].abs() < 1e-12);
        assert!((b[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hann_coherent_gain_is_about_half() {
        let w = make_window(4096, WindowKind::Hann).unwrap();
        assert!((coherent_gain(&w) - 0.5).abs() < 1e-3);
    }
}

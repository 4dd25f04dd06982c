use serde::Deserialize;

use super::model::SpectralModel;

/// Raw sample encodings a playback device or PCM writer can be fed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PcmFormat {
    Int16,
    #[default]
    Float32,
    Float64,
}

impl PcmFormat {
    pub fn bytes_per_sample(self) -> u16 {
        match self {
            PcmFormat::Int16 => 2,
            PcmFormat::Float32 => 4,
            PcmFormat::Float64 => 8,
        }
    }

    pub fn bit_depth(self) -> u16 {
        self.bytes_per_sample() * 8
    }
}

/// Little-endian interleaved mono bytes for `samples`.
pub fn to_pcm_bytes(samples: &[f32], format: PcmFormat) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * format.bytes_per_sample() as usize);
    for &s in samples {
        match format {
            PcmFormat::Int16 => {
                let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                bytes.extend_from_slice(&v.to_le_bytes());
            }
            PcmFormat::Float32 => bytes.extend_from_slice(&s.to_le_bytes()),
            PcmFormat::Float64 => bytes.extend_from_slice(&(s as f64).to_le_bytes()),
        }
    }
    bytes
}

/// Playback position in milliseconds for a mono byte stream.
pub fn position_ms(byte_position: u64, sample_rate: u32, bytes_per_sample: u16) -> f64 {
    if sample_rate == 0 || bytes_per_sample == 0 {
        return 0.0;
    }
    byte_position as f64 / sample_rate as f64 / bytes_per_sample as f64 * 1000.0
}

/// Index of the analysis frame whose hop contains `position_ms`, clamped to the last frame.
pub fn frame_at_position(model: &SpectralModel, position_ms: f64) -> usize {
    let hop = model.frame_size() - model.overlap_offset();
    if hop == 0 || model.frame_count() == 0 {
        return 0;
    }
    let sample = (position_ms.max(0.0) * model.sample_rate() as f64 / 1000.0) as usize;
    (sample / hop).min(model.frame_count() - 1)
}

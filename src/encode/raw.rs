use anyhow::{Context, Result};
use std::path::Path;

use spectra::spectral::playback::to_pcm_bytes;
use spectra::spectral::PcmFormat;

/// Writes headerless little-endian mono PCM, the byte stream a playback device is fed.
pub fn write_raw(output_path: &Path, samples: &[f32], format: PcmFormat) -> Result<()> {
    let bytes = to_pcm_bytes(samples, format);
    std::fs::write(output_path, &bytes)
        .with_context(|| format!("Failed to write raw PCM: {}", output_path.display()))?;
    log::info!(
        "Raw PCM written: {} bytes ({}-bit, {} samples)",
        bytes.len(),
        format.bit_depth(),
        samples.len()
    );
    Ok(())
}

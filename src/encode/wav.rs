use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use spectra::spectral::PcmFormat;

pub struct WavEncoder {
    writer: hound::WavWriter<BufWriter<File>>,
    format: PcmFormat,
    written: usize,
}

impl WavEncoder {
    pub fn new(output_path: &Path, sample_rate: u32, format: PcmFormat) -> Result<Self> {
        let sample_format = match format {
            PcmFormat::Int16 => hound::SampleFormat::Int,
            PcmFormat::Float32 => hound::SampleFormat::Float,
            PcmFormat::Float64 => anyhow::bail!("WAV export supports int16 and float32 samples only"),
        };
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: format.bit_depth(),
            sample_format,
        };

        let writer = hound::WavWriter::create(output_path, spec)
            .with_context(|| format!("Failed to create WAV file: {}", output_path.display()))?;

        log::info!(
            "WAV encoder started: {}Hz mono, {}-bit {:?}",
            sample_rate,
            format.bit_depth(),
            sample_format
        );

        Ok(Self {
            writer,
            format,
            written: 0,
        })
    }

    pub fn write_samples(&mut self, samples: &[f32]) -> Result<()> {
        for &s in samples {
            let written = match self.format {
                PcmFormat::Int16 => {
                    let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                    self.writer.write_sample(v)
                }
                _ => self.writer.write_sample(s),
            };
            written.context("Failed to write sample to WAV file")?;
        }
        self.written += samples.len();
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        let written = self.written;
        self.writer.finalize().context("Failed to finalize WAV file")?;
        log::info!("WAV encoding complete: {} samples", written);
        Ok(())
    }
}

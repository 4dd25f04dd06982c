use serde::Deserialize;

/// Per-frame polar spectra plus the framing they were produced with.
///
/// Every magnitude/phase row holds all `frame_size` bins; only the lower
/// `frame_size / 2` are exposed for display and editing, the upper half
/// mirrors them so the spectrum stays conjugate-symmetric.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralFrames {
    pub frame_size: usize,
    pub overlap_offset: usize,
    /// Frames covering the signal without overlap; the synthesised length is `chunk_count * frame_size`.
    pub chunk_count: usize,
    pub magnitudes: Vec<Vec<f64>>,
    pub phases: Vec<Vec<f64>>,
}

impl SpectralFrames {
    pub fn frame_count(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn bin_count(&self) -> usize {
        self.frame_size / 2
    }
}

/// The editable spectral state of one loaded recording.
#[derive(Clone, Debug)]
pub struct SpectralModel {
    pub(crate) sample_rate: u32,
    pub(crate) sample_count: usize,
    pub(crate) bin_frequencies: Vec<f64>,
    pub(crate) frames: SpectralFrames,
    pub(crate) analysed_magnitudes: Vec<Vec<f64>>,
    pub(crate) dirty: bool,
    pub(crate) revision: u64,
}

impl SpectralModel {
    pub(crate) fn new(
        sample_rate: u32,
        sample_count: usize,
        bin_frequencies: Vec<f64>,
        frames: SpectralFrames,
    ) -> Self {
        let analysed_magnitudes = frames.magnitudes.clone();
        Self {
            sample_rate,
            sample_count,
            bin_frequencies,
            frames,
            analysed_magnitudes,
            dirty: false,
            revision: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the recording the model was analysed from.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn frame_size(&self) -> usize {
        self.frames.frame_size
    }

    pub fn bin_count(&self) -> usize {
        self.frames.bin_count()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.frame_count()
    }

    pub fn overlap_offset(&self) -> usize {
        self.frames.overlap_offset
    }

    pub fn chunk_count(&self) -> usize {
        self.frames.chunk_count
    }

    pub fn bin_frequencies(&self) -> &[f64] {
        &self.bin_frequencies
    }

    pub fn frames(&self) -> &SpectralFrames {
        &self.frames
    }

    /// Visible magnitudes of one frame.
    pub fn magnitudes(&self, frame: usize) -> Option<&[f64]> {
        let bins = self.bin_count();
        self.frames.magnitudes.get(frame).map(|m| &m[..bins])
    }

    /// Visible phases of one frame.
    pub fn phases(&self, frame: usize) -> Option<&[f64]> {
        let bins = self.bin_count();
        self.frames.phases.get(frame).map(|p| &p[..bins])
    }

    pub fn magnitude(&self, frame: usize, bin: usize) -> Option<f64> {
        self.magnitudes(frame).and_then(|m| m.get(bin).copied())
    }

    /// Magnitude as produced by analysis, before any edit.
    pub fn analysed_magnitude(&self, frame: usize, bin: usize) -> Option<f64> {
        if bin >= self.bin_count() {
            return None;
        }
        self.analysed_magnitudes
            .get(frame)
            .and_then(|m| m.get(bin).copied())
    }

    /// Heights for the visualisation layer: magnitude times a display scale.
    pub fn display_heights(&self, frame: usize, scale: f64) -> Option<Vec<f64>> {
        self.magnitudes(frame)
            .map(|m| m.iter().map(|&v| v * scale).collect())
    }

    /// Visible magnitudes of one frame in decibels.
    pub fn magnitudes_db(&self, frame: usize) -> Option<Vec<f64>> {
        self.magnitudes(frame)
            .map(|m| m.iter().map(|&v| to_db(v)).collect())
    }

    /// Largest visible magnitude across all frames; used to normalise colour ramps.
    pub fn max_magnitude(&self) -> f64 {
        let bins = self.bin_count();
        self.frames
            .magnitudes
            .iter()
            .flat_map(|m| m[..bins].iter().copied())
            .fold(0.0f64, f64::max)
    }

    /// Whether edits were applied since the last successful synthesis.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bumped once per applied edit batch.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Writes a visible bin and its mirror in the upper half of the spectrum.
    pub(crate) fn set_magnitude(&mut self, frame: usize, bin: usize, value: f64) {
        let n = self.frames.frame_size;
        let row = &mut self.frames.magnitudes[frame];
        row[bin] = value;
        if bin > 0 {
            row[n - bin] = value;
        }
        self.dirty = true;
    }
}

const DB_FLOOR: f64 = -240.0;

pub fn to_db(magnitude: f64) -> f64 {
    if magnitude <= 0.0 {
        return DB_FLOOR;
    }
    (20.0 * magnitude.log10()).max(DB_FLOOR)
}

/// Geometry that places every (frame, bin) cell in visualisation space.
///
/// Bins run along x, frames along z, and magnitude scaled by
/// `display_scale` rises along y.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct SpectrumLayout {
    #[serde(default)]
    pub origin: [f64; 3],
    #[serde(default = "default_edge_length")]
    pub edge_length: f64,
    #[serde(default = "default_display_scale")]
    pub display_scale: f64,
}

fn default_edge_length() -> f64 { 0.01 }
fn default_display_scale() -> f64 { 10.0 }

impl Default for SpectrumLayout {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            edge_length: default_edge_length(),
            display_scale: default_display_scale(),
        }
    }
}

impl SpectrumLayout {
    pub fn position(&self, frame: usize, bin: usize, magnitude: f64) -> [f64; 3] {
        let half = self.edge_length / 2.0;
        [
            self.origin[0] + bin as f64 * self.edge_length + half,
            self.origin[1] + magnitude * self.display_scale,
            self.origin[2] + frame as f64 * self.edge_length + half,
        ]
    }
}

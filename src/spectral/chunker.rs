use super::error::{invalid_argument, Result};

/// How a sample buffer is cut into frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameGrid {
    pub frame_size: usize,
    /// Samples shared between neighbouring frames, `floor(frame_size * overlap)`.
    pub overlap_offset: usize,
    /// `ceil(len / frame_size)`: frames needed to cover the buffer without overlap.
    pub chunk_count: usize,
    /// Frames actually produced once overlap is applied.
    pub frame_count: usize,
}

impl FrameGrid {
    pub fn new(sample_count: usize, frame_size: usize, overlap: f64) -> Result<Self> {
        if frame_size == 0 {
            return Err(invalid_argument("frame size must be positive"));
        }
        if !(0.0..1.0).contains(&overlap) {
            return Err(invalid_argument(format!(
                "overlap fraction must lie in [0, 1), got {}",
                overlap
            )));
        }

        let chunk_count = sample_count.div_ceil(frame_size);
        let overlap_offset = (frame_size as f64 * overlap).floor() as usize;
        let frame_count = if overlap_offset == 0 {
            chunk_count
        } else {
            ((chunk_count as f64 / overlap).floor() as usize).saturating_sub(1)
        };

        Ok(Self {
            frame_size,
            overlap_offset,
            chunk_count,
            frame_count,
        })
    }

    /// Distance between the starts of consecutive frames.
    pub fn hop(&self) -> usize {
        self.frame_size - self.overlap_offset
    }

    pub fn frame_start(&self, index: usize) -> usize {
        index * self.hop()
    }
}

/// Copies frame `index` out of `samples`, zero-padding past the end of the buffer.
pub fn frame_at(samples: &[f32], grid: &FrameGrid, index: usize) -> Vec<f64> {
    let start = grid.frame_start(index);
    let mut frame = vec![0.0f64; grid.frame_size];
    if start < samples.len() {
        let end = (start + grid.frame_size).min(samples.len());
        for (dst, &src) in frame.iter_mut().zip(&samples[start..end]) {
            *dst = src as f64;
        }
    }
    frame
}

/// Splits `samples` into possibly-overlapping, zero-padded frames.
pub fn chunk(samples: &[f32], frame_size: usize, overlap: f64) -> Result<Vec<Vec<f64>>> {
    let grid = FrameGrid::new(samples.len(), frame_size, overlap)?;
    Ok((0..grid.frame_count)
        .map(|i| frame_at(samples, &grid, i))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_without_overlap() {
        let grid = FrameGrid::new(44100, 1024, 0.0).unwrap();
        assert_eq!(grid.chunk_count, 44);
        assert_eq!(grid.frame_count, 44);
        assert_eq!(grid.hop(), 1024);
    }

    #[test]
    fn half_overlap_frame_count() {
        let grid = FrameGrid::new(44100, 1024, 0.5).unwrap();
        assert_eq!(grid.chunk_count, 44);
        assert_eq!(grid.overlap_offset, 512);
        assert_eq!(grid.frame_count, 87);
        // Last frame ends exactly at the padded end of the no-overlap grid.
        assert_eq!(grid.frame_start(86) + 1024, 44 * 1024);
    }

    #[test]
    fn last_frame_is_zero_padded() {
        let samples: Vec<f32> = (1..=10).map(|v| v as f32).collect();
        let frames = chunk(&samples, 4, 0.0).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frames[2], vec![9.0, 10.0, 0.0, 0.0]);
    }

    #[test]
    fn overlapping_frames_advance_by_hop() {
        let samples: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let frames = chunk(&samples, 4, 0.5).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(frames[1], vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(frames[2], vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn empty_input_has_no_frames() {
        assert!(chunk(&[], 4, 0.5).unwrap().is_empty());
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(FrameGrid::new(10, 0, 0.5).is_err());
        assert!(FrameGrid::new(10, 4, 1.0).is_err());
        assert!(FrameGrid::new(10, 4, -0.1).is_err());
    }
}

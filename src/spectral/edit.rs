use crossbeam::queue::SegQueue;
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use super::error::{invalid_argument, Result, SpectralError};
use super::model::{SpectralModel, SpectrumLayout};

/// How the distance between a stroke point and a cell is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Full 3-D distance, height included.
    #[default]
    Euclidean,
    /// Distance in the bin/frame plane, ignoring height.
    Planar,
}

impl DistanceMetric {
    pub fn distance(self, a: &[f64; 3], b: &[f64; 3]) -> f64 {
        let dx = a[0] - b[0];
        let dz = a[2] - b[2];
        match self {
            DistanceMetric::Euclidean => {
                let dy = a[1] - b[1];
                (dx * dx + dy * dy + dz * dz).sqrt()
            }
            DistanceMetric::Planar => (dx * dx + dz * dz).sqrt(),
        }
    }
}

/// What an edit does to the magnitude of every selected cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditTool {
    /// Adds `direction * deform_factor`.
    Offset { direction: f64 },
    /// Replaces the magnitude with `value`.
    Absolute { value: f64 },
    /// Puts back the magnitude analysis produced.
    Restore,
}

impl EditTool {
    fn apply(self, current: f64, analysed: f64, deform_factor: f64) -> f64 {
        let value = match self {
            EditTool::Offset { direction } => current + direction * deform_factor,
            EditTool::Absolute { value } => value,
            EditTool::Restore => analysed,
        };
        value.max(0.0)
    }
}

/// One edit request from the visualisation layer: a stroke of points, a radius and a tool.
#[derive(Clone, Debug, PartialEq)]
pub struct EditRegion {
    pub stroke: Vec<[f64; 3]>,
    pub radius: f64,
    pub tool: EditTool,
}

impl EditRegion {
    pub fn point(point: [f64; 3], radius: f64, tool: EditTool) -> Self {
        Self {
            stroke: vec![point],
            radius,
            tool,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct EditSettings {
    #[serde(default = "default_deform_factor")]
    pub deform_factor: f64,
    #[serde(default)]
    pub metric: DistanceMetric,
}

fn default_deform_factor() -> f64 { 0.01 }

impl Default for EditSettings {
    fn default() -> Self {
        Self {
            deform_factor: default_deform_factor(),
            metric: DistanceMetric::Euclidean,
        }
    }
}

/// New magnitude for one visible (frame, bin) cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellChange {
    pub frame: usize,
    pub bin: usize,
    pub magnitude: f64,
}

/// Upper bound on points inserted between two stroke points.
pub const MAX_SEGMENT_STEPS: usize = 4096;

/// Inserts interpolated points so consecutive stroke points are never more than `radius` apart.
///
/// At most [`MAX_SEGMENT_STEPS`] points are inserted per segment; a radius too
/// small for that is spaced evenly at the cap instead.
pub fn fill_gaps(stroke: &[[f64; 3]], radius: f64) -> Vec<[f64; 3]> {
    let Some(first) = stroke.first() else {
        return Vec::new();
    };
    let mut filled = vec![*first];
    if radius <= 0.0 {
        filled.extend_from_slice(&stroke[1..]);
        return filled;
    }

    for pair in stroke.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let gap = DistanceMetric::Euclidean.distance(&a, &b);
        let steps = (gap / radius).ceil().clamp(1.0, MAX_SEGMENT_STEPS as f64) as usize;
        for s in 1..=steps {
            let t = s as f64 / steps as f64;
            filled.push([
                a[0] + (b[0] - a[0]) * t,
                a[1] + (b[1] - a[1]) * t,
                a[2] + (b[2] - a[2]) * t,
            ]);
        }
    }
    filled
}

fn validate(region: &EditRegion) -> Result<()> {
    if !region.radius.is_finite() || region.radius < 0.0 {
        return Err(invalid_argument(format!(
            "edit radius must be a non-negative number, got {}",
            region.radius
        )));
    }
    if region.stroke.iter().flatten().any(|c| !c.is_finite()) {
        return Err(invalid_argument("edit stroke contains a non-finite coordinate"));
    }
    match region.tool {
        EditTool::Offset { direction } if !direction.is_finite() => {
            Err(invalid_argument("edit direction must be finite"))
        }
        EditTool::Absolute { value } if !value.is_finite() => {
            Err(invalid_argument("absolute edit value must be finite"))
        }
        _ => Ok(()),
    }
}

/// Works out the new magnitude of every cell the region touches, without mutating the model.
///
/// Frames are scanned as independent tasks that push into one shared queue;
/// the queue is drained only after every task has finished. Each cell shows
/// up at most once per region no matter how many stroke points cover it.
pub fn collect_changes<F>(
    model: &SpectralModel,
    region: &EditRegion,
    layout: &SpectrumLayout,
    settings: &EditSettings,
    cancelled: F,
) -> Result<Vec<CellChange>>
where
    F: Fn() -> bool + Sync,
{
    validate(region)?;
    let stroke = fill_gaps(&region.stroke, region.radius);
    if stroke.is_empty() {
        return Ok(Vec::new());
    }

    let queue = SegQueue::new();
    let aborted = AtomicBool::new(false);

    (0..model.frame_count()).into_par_iter().for_each(|frame| {
        if aborted.load(Ordering::Relaxed) {
            return;
        }
        if cancelled() {
            aborted.store(true, Ordering::Relaxed);
            return;
        }
        let Some(magnitudes) = model.magnitudes(frame) else {
            return;
        };
        for (bin, &current) in magnitudes.iter().enumerate() {
            let position = layout.position(frame, bin, current);
            let hit = stroke
                .iter()
                .any(|p| settings.metric.distance(p, &position) < region.radius);
            if !hit {
                continue;
            }
            let analysed = model.analysed_magnitude(frame, bin).unwrap_or(current);
            queue.push(CellChange {
                frame,
                bin,
                magnitude: region.tool.apply(current, analysed, settings.deform_factor),
            });
        }
    });

    if aborted.load(Ordering::Relaxed) || cancelled() {
        return Err(SpectralError::Cancelled);
    }

    let mut changes = Vec::with_capacity(queue.len());
    while let Some(change) = queue.pop() {
        changes.push(change);
    }
    changes.sort_by_key(|c| (c.frame, c.bin));
    Ok(changes)
}

/// Writes a drained batch into the model and returns the touched cells.
pub fn apply_changes(model: &mut SpectralModel, changes: &[CellChange]) -> BTreeSet<(usize, usize)> {
    let mut touched = BTreeSet::new();
    for change in changes {
        model.set_magnitude(change.frame, change.bin, change.magnitude);
        touched.insert((change.frame, change.bin));
    }
    if !touched.is_empty() {
        model.revision += 1;
        log::debug!(
            "Edit batch applied to {} cells (revision {})",
            touched.len(),
            model.revision
        );
    }
    touched
}

/// Selects and rewrites every cell within `region`; magnitude only, phases are left alone.
pub fn apply_edit(
    model: &mut SpectralModel,
    region: &EditRegion,
    layout: &SpectrumLayout,
    settings: &EditSettings,
) -> Result<BTreeSet<(usize, usize)>> {
    let changes = collect_changes(model, region, layout, settings, || false)?;
    Ok(apply_changes(model, &changes))
}

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::analysis::{analyze, AnalysisSettings, SampleBuffer};
use super::edit::{apply_changes, collect_changes, EditRegion, EditSettings};
use super::error::{invalid_state, Result, SpectralError};
use super::model::{SpectralModel, SpectrumLayout};
use super::synthesis::synthesize_until;

#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct SessionSettings {
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub edit: EditSettings,
    #[serde(default)]
    pub layout: SpectrumLayout,
}

/// Output of the last successful synthesis.
#[derive(Clone, Debug)]
pub struct Rendered {
    pub samples: Arc<Vec<f32>>,
    pub sample_rate: u32,
    /// Model revision the samples were rendered from.
    pub revision: u64,
}

/// One editing session over one loaded recording.
///
/// The spectral model is the only shared mutable state. Synthesis and
/// visualisation take read locks; an edit batch computes its changes under an
/// upgradable read and upgrades to a write lock to drain them, so it waits for
/// any synthesis in flight. Loading a file or calling [`cancel`](Self::cancel)
/// bumps a generation counter that makes in-flight batches and passes abort
/// without committing anything.
pub struct SpectralSession {
    settings: SessionSettings,
    model: RwLock<Option<SpectralModel>>,
    rendered: RwLock<Option<Rendered>>,
    generation: AtomicU64,
}

impl SpectralSession {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            model: RwLock::new(None),
            rendered: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Abandons any edit batch or synthesis pass currently running.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Analyses `buffer` and replaces the current model wholesale.
    ///
    /// Returns `false` when the buffer is empty; the previous model is kept.
    /// On error the previous model is kept as well.
    pub fn load(&self, buffer: &SampleBuffer) -> Result<bool> {
        let Some(model) = analyze(buffer, &self.settings.analysis)? else {
            return Ok(false);
        };

        self.cancel();
        let mut slot = self.model.write();
        *slot = Some(model);
        *self.rendered.write() = None;
        Ok(true)
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    /// Whether edits were applied after the last synthesis.
    pub fn is_dirty(&self) -> bool {
        self.model.read().as_ref().is_some_and(|m| m.is_dirty())
    }

    /// Runs `f` against the current model under a read lock.
    pub fn read_model<R>(&self, f: impl FnOnce(&SpectralModel) -> R) -> Option<R> {
        self.model.read().as_ref().map(f)
    }

    /// Applies one edit batch atomically and returns the touched (frame, bin) cells.
    pub fn apply_edit(&self, region: &EditRegion) -> Result<BTreeSet<(usize, usize)>> {
        let started = self.generation();
        let guard = self.model.upgradable_read();
        let model = guard
            .as_ref()
            .ok_or_else(|| invalid_state("no recording loaded"))?;

        let changes = collect_changes(
            model,
            region,
            &self.settings.layout,
            &self.settings.edit,
            || self.generation() != started,
        )
        .inspect_err(|e| {
            if *e == SpectralError::Cancelled {
                log::warn!("Edit batch cancelled before drain");
            }
        })?;

        if changes.is_empty() {
            return Ok(BTreeSet::new());
        }

        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        if self.generation() != started {
            log::warn!("Edit batch cancelled before drain");
            return Err(SpectralError::Cancelled);
        }
        let model = guard
            .as_mut()
            .ok_or_else(|| invalid_state("no recording loaded"))?;
        Ok(apply_changes(model, &changes))
    }

    /// Rebuilds the playable buffer from the current model.
    ///
    /// The previous buffer stays in place if synthesis fails or is cancelled.
    /// A pass that finishes after the model moved on to a newer revision is
    /// stale: it returns [`SpectralError::Cancelled`] and commits nothing.
    pub fn synthesize(&self) -> Result<Arc<Vec<f32>>> {
        let started = self.generation();
        let rendered = {
            let guard = self.model.read();
            let model = guard
                .as_ref()
                .ok_or_else(|| invalid_state("no recording loaded; run analysis first"))?;
            let samples = synthesize_until(model.frames(), || self.generation() != started)
                .inspect_err(|e| {
                    if *e == SpectralError::Cancelled {
                        log::warn!("Synthesis cancelled");
                    }
                })?;
            Rendered {
                samples: Arc::new(samples),
                sample_rate: model.sample_rate(),
                revision: model.revision(),
            }
        };

        let samples = Arc::clone(&rendered.samples);
        self.commit(started, rendered)?;
        Ok(samples)
    }

    fn commit(&self, started: u64, rendered: Rendered) -> Result<()> {
        let mut guard = self.model.write();
        if self.generation() != started {
            log::warn!("Synthesis cancelled");
            return Err(SpectralError::Cancelled);
        }
        let Some(model) = guard.as_mut() else {
            return Err(SpectralError::Cancelled);
        };
        if model.revision() != rendered.revision {
            log::warn!(
                "Synthesis of revision {} superseded by revision {}",
                rendered.revision,
                model.revision()
            );
            return Err(SpectralError::Cancelled);
        }
        model.mark_clean();
        *self.rendered.write() = Some(rendered);
        Ok(())
    }

    /// Last successfully synthesised buffer, if any.
    pub fn rendered(&self) -> Option<Rendered> {
        self.rendered.read().clone()
    }
}

//! Short-time spectral analysis, editing and resynthesis of mono audio.
//!
//! A recording is cut into half-overlapping Hann frames, each frame is
//! transformed and kept as magnitude and phase. Magnitudes can then be edited
//! in place through [`SpectralSession`], and the edited spectrum is turned
//! back into samples by overlap-add.

pub mod analysis;
pub mod chunker;
pub mod edit;
pub mod error;
pub mod model;
pub mod playback;
pub mod session;
pub mod synthesis;
pub mod transform;
pub mod window;

pub use analysis::{analyze, AnalysisSettings, SampleBuffer};
pub use edit::{CellChange, DistanceMetric, EditRegion, EditSettings, EditTool};
pub use error::{Result, SpectralError};
pub use model::{SpectralFrames, SpectralModel, SpectrumLayout};
pub use playback::PcmFormat;
pub use session::{Rendered, SessionSettings, SpectralSession};
pub use synthesis::synthesize;
pub use transform::SpectralTransform;
pub use window::{make_window, WindowKind};

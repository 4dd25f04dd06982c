use serde::Deserialize;
use std::path::PathBuf;

use spectra::spectral::{AnalysisSettings, EditSettings, PcmFormat, SpectrumLayout};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub edit: EditSettings,
    #[serde(default)]
    pub layout: SpectrumLayout,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub format: PcmFormat,
}

pub fn load_config(path: &PathBuf) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::warn!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

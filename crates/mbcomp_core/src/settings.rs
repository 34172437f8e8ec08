//! Persistent Settings Management
//!
//! Handles saving/loading the parameter set and analyzer preferences.
//!
//! # Storage Locations
//! - Linux: `~/.config/mbcomp/settings.json`
//! - Windows: `%APPDATA%\mbcomp\settings.json`
//! - macOS: `~/Library/Application Support/com.mbcomp.mbcomp/settings.json`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use mbcomp_dsp::FftOrder;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{EngineError, EngineResult};
use crate::params::{ParameterState, ParameterStore};

/// Spectrum analyzer preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    pub enabled: bool,
    /// Window length: 2048, 4096 or 8192
    pub fft_order: usize,
    pub refresh_hz: f32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fft_order: FftOrder::Order2048.size(),
            refresh_hz: 30.0,
        }
    }
}

impl AnalyzerSettings {
    /// Configured order, falling back to the default for unknown sizes
    pub fn order(&self) -> FftOrder {
        FftOrder::from_size(self.fft_order).unwrap_or_default()
    }
}

/// Root settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MbcompSettings {
    #[serde(default)]
    pub parameters: ParameterState,
    #[serde(default)]
    pub analyzer: AnalyzerSettings,
}

impl MbcompSettings {
    /// Capture the current parameter values
    pub fn from_store(store: &ParameterStore, analyzer: AnalyzerSettings) -> Self {
        Self {
            parameters: store.state(),
            analyzer,
        }
    }

    /// Push the saved parameters into a store
    pub fn apply_to(&self, store: &ParameterStore) -> EngineResult<()> {
        store.restore(&self.parameters)
    }

    /// Load settings from the platform config dir, or defaults if
    /// missing/corrupt
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                info!("Using default settings");
                Self::default()
            }
        }
    }

    /// Load settings from `path`, or defaults if missing/corrupt
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match Self::try_load_from(path) {
                Ok(settings) => {
                    info!("Settings loaded from {:?}", path);
                    return settings;
                }
                Err(e) => {
                    error!("Failed to load settings file {:?}: {}", path, e);
                }
            }
        }

        info!("Using default settings");
        Self::default()
    }

    pub fn try_load_from(path: &Path) -> EngineResult<Self> {
        let file = fs::File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Save settings to the platform config dir
    pub fn save(&self) -> EngineResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| EngineError::ConfigError("Could not determine config path".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> EngineResult<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Get the platform-specific configuration file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "mbcomp", "mbcomp").map(|proj| proj.config_dir().join("settings.json"))
    }
}

//! Scanner configuration.
//!
//! Loaded from config.json at startup and passed by value into the pipeline
//! components. Every field has a default, so a partial file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::capture::ScreenRegion;
use crate::market::ParserConfig;
use crate::ocr::{OcrSettings, PreprocessConfig};

/// Complete scanner configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Append-only market log
    pub output_csv: PathBuf,
    /// Delay between tick starts (milliseconds)
    pub tick_interval_ms: u64,
    /// Screen rectangle to monitor; asked from the operator when absent
    pub region: Option<ScreenRegion>,
    /// Where preprocessed frames of failed recognitions are saved
    pub debug_dir: Option<PathBuf>,
    pub preprocess: PreprocessConfig,
    pub ocr: OcrSettings,
    pub parser: ParserConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            output_csv: PathBuf::from("data/market_scan.csv"),
            tick_interval_ms: 1000,
            region: None,
            debug_dir: None,
            preprocess: PreprocessConfig::default(),
            ocr: OcrSettings::default(),
            parser: ParserConfig::default(),
        }
    }
}

/// Loads configuration from `config_path` or returns defaults.
pub fn load_config(config_path: &Path) -> ScannerConfig {
    log::info!("Looking for config at: {}", config_path.display());

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("Config loaded from {}", config_path.display());
                    return config;
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}. Using defaults.", config_path.display(), e);
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}. Using defaults.", config_path.display(), e);
            }
        }
    } else {
        log::info!("{} not found. Using default config.", config_path.display());
    }

    ScannerConfig::default()
}

use crate::error::{Result, SignError};
use crate::features::storage::{default_data_dir, preferred_temp_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for the signing workspace.
///
/// Loaded once at startup: defaults, then the JSON file named by
/// `SIGNDESK_CONFIG`, then individual environment overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub min_zoom_percent: f64,
    pub max_zoom_percent: f64,
    pub min_size_px: f64,
    pub max_size_px: f64,
    pub default_size_px: f64,
    pub drag_threshold_px: f64,
    pub render_scale: f64,
    pub render_timeout_ms: u64,
    pub url_ttl_secs: u64,
    pub output_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            min_zoom_percent: 25.0,
            max_zoom_percent: 400.0,
            min_size_px: 20.0,
            max_size_px: 300.0,
            default_size_px: 100.0,
            drag_threshold_px: 3.0,
            render_scale: 2.0,
            render_timeout_ms: 10_000,
            url_ttl_secs: 3600,
            output_dir: None,
            data_dir: None,
        }
    }
}

impl SigningConfig {
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("SIGNDESK_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SignError::Config(format!("{}:{e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| SignError::Config(format!("{}:{e}", path.display())))
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("SIGNDESK_TEMP_DIR") {
            self.output_dir = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var("SIGNDESK_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(ms) = std::env::var("SIGNDESK_RENDER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            self.render_timeout_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_zoom_percent > 0.0 && self.min_zoom_percent <= self.max_zoom_percent) {
            return Err(SignError::Config("zoom_bounds".into()));
        }
        if !(self.min_size_px > 0.0
            && self.min_size_px <= self.default_size_px
            && self.default_size_px <= self.max_size_px)
        {
            return Err(SignError::Config("size_bounds".into()));
        }
        if self.render_scale <= 0.0 {
            return Err(SignError::Config("render_scale".into()));
        }
        if self.drag_threshold_px < 0.0 {
            return Err(SignError::Config("drag_threshold".into()));
        }
        if self.render_timeout_ms == 0 {
            return Err(SignError::Config("render_timeout".into()));
        }
        Ok(())
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.url_ttl_secs)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(preferred_temp_dir)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::player::PlayerSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PlayerConfig {
    pub(crate) controls_timeout_ms: u64,
    pub(crate) pointer_leave_hide_ms: u64,
    pub(crate) save_interval_ms: u64,
    pub(crate) min_progress_secs: f64,
    pub(crate) end_threshold_secs: f64,
    pub(crate) seek_step_secs: f64,
    pub(crate) double_tap_window_ms: u64,
    pub(crate) cue_duration_ms: u64,
    pub(crate) default_quality: u32,
    /// Player executable; a bare name is looked up on `PATH`.
    pub(crate) mpv_path: String,
    /// Appended after the IPC flags, e.g. `["--hwdec=auto"]`.
    pub(crate) mpv_args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            controls_timeout_ms: 3000,
            pointer_leave_hide_ms: 500,
            save_interval_ms: 5000,
            min_progress_secs: 5.0,
            end_threshold_secs: 10.0,
            seek_step_secs: 5.0,
            double_tap_window_ms: 300,
            cue_duration_ms: 500,
            default_quality: 720,
            mpv_path: "mpv".to_string(),
            mpv_args: Vec::new(),
        }
    }
}

impl PlayerConfig {
    pub(crate) fn to_settings(&self) -> PlayerSettings {
        PlayerSettings {
            controls_timeout: Duration::from_millis(self.controls_timeout_ms),
            pointer_leave_hide: Duration::from_millis(self.pointer_leave_hide_ms),
            save_interval: Duration::from_millis(self.save_interval_ms),
            min_progress_secs: self.min_progress_secs.max(0.0),
            end_threshold_secs: self.end_threshold_secs.max(0.0),
            seek_step_secs: self.seek_step_secs.max(0.0),
            double_tap_window: Duration::from_millis(self.double_tap_window_ms),
            cue_duration: Duration::from_millis(self.cue_duration_ms),
            default_quality: self.default_quality,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) api_base_url: String,
    pub(crate) request_timeout_ms: u64,
    pub(crate) fetch_attempts: usize,
    pub(crate) player: PlayerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            request_timeout_ms: 8000,
            fetch_attempts: 2,
            player: PlayerConfig::default(),
        }
    }
}

impl Config {
    /// Reads the config file, writing defaults when it doesn't exist yet. A
    /// file that fails to parse is left untouched and defaults are used.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("no config file found, writing defaults to {}", path.display());
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        match serde_json::from_str::<Self>(&raw) {
            Ok(config) => {
                info!("loaded config from {}", path.display());
                Ok(config)
            }
            Err(err) => {
                warn!(
                    "config file {} could not be parsed ({err}), using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    pub(crate) fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub(crate) fn apply_env(&mut self) {
        self.apply_api_base(env::var("DRAMAWATCH_API_BASE").ok());
        self.apply_mpv_path(env::var("DRAMAWATCH_MPV").ok());
    }

    pub(crate) fn apply_mpv_path(&mut self, value: Option<String>) {
        if let Some(value) = value
            && !value.trim().is_empty()
        {
            self.player.mpv_path = value.trim().to_string();
        }
    }

    pub(crate) fn apply_api_base(&mut self, value: Option<String>) {
        if let Some(value) = value
            && !value.trim().is_empty()
        {
            self.api_base_url = value.trim().to_string();
        }
    }
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fretloop_core::{Mode, NoteName};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub voicings: VoicingConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tempo: f64,
    pub master_volume_db: f64,
    pub drums_muted: bool,
    pub metronome_enabled: bool,
    pub key_root: NoteName,
    pub mode: Mode,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tempo: 100.0,
            master_volume_db: -6.0,
            drums_muted: false,
            metronome_enabled: false,
            key_root: NoteName::C,
            mode: Mode::Major,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, Default)]
pub struct VoicingConfig {
    /// JSON file whose entries replace the built-in voicings
    #[serde(default)]
    pub library: Option<PathBuf>,
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fretloop")
        .join("config.toml")
}

/// Missing or unreadable config falls back to defaults
pub fn load_config() -> AppConfig {
    let path = config_path();
    let Ok(text) = std::fs::read_to_string(&path) else {
        return AppConfig::default();
    };
    parse_config(&text).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "Ignoring invalid config");
        AppConfig::default()
    })
}

fn parse_config(text: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(text)
}

pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let path = config_path();
    save_config_to(&path, config)?;
    Ok(path)
}

fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "Config saved");
    Ok(())
}

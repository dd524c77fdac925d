//! Runtime settings with persistence
//!
//! Settings are read from `--config`, or from `~/.config/tessera/settings.toml`.
//! Every section and field is optional; anything missing keeps its default.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_core::{ClockConfig, Color};
use tessera_state::MediaPaths;
use tracing::info;

/// All runtime settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub window: WindowSettings,
    pub media: MediaSettings,
    pub run: RunSettings,
    pub log: LogSettings,
}

impl EngineSettings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tessera"))
    }

    /// Get the default settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    /// Read settings from `path`. A missing file is `Ok(None)`.
    ///
    /// Logging is not up yet when this runs, so the caller reports the outcome.
    pub fn read(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let settings = toml::from_str(&content)?;
        Ok(Some(settings))
    }

    /// Write settings to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Clear color as 0xRRGGBB
    pub clear_color: u32,
}

impl WindowSettings {
    pub fn clear_color(&self) -> Color {
        Color::from_hex(self.clear_color)
    }
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: "Tessera".to_owned(),
            width: 800,
            height: 600,
            clear_color: 0x10_10_18,
        }
    }
}

/// Where content is read from. Folder entries are relative to `root` unless
/// absolute; unset ones use the default layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maps: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systems: Option<PathBuf>,
    /// Key binding file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
}

impl MediaSettings {
    pub fn paths(&self) -> MediaPaths {
        let defaults = MediaPaths::new(&self.root);
        let pick = |setting: &Option<PathBuf>, default: &PathBuf| match setting {
            Some(path) => defaults.resolve(path),
            None => default.clone(),
        };
        MediaPaths {
            states: pick(&self.states, &defaults.states),
            levels: pick(&self.levels, &defaults.levels),
            entities: pick(&self.entities, &defaults.entities),
            maps: pick(&self.maps, &defaults.maps),
            systems: pick(&self.systems, &defaults.systems),
            input: pick(&self.input, &defaults.input),
            root: self.root.clone(),
        }
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("media"),
            states: None,
            levels: None,
            entities: None,
            maps: None,
            systems: None,
            input: None,
        }
    }
}

/// Frame loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// First state pushed on the stack
    pub initial_state: String,
    /// Use this delta every frame instead of wall-clock time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_delta: Option<f32>,
    /// Stop after this many frames
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_frames: Option<u64>,
    pub time_scale: f32,
    /// Longest delta handed to states after a stall, in seconds
    pub max_delta: f32,
    /// Layers of the placeholder tile map
    pub map_layers: u32,
}

impl RunSettings {
    pub fn clock(&self) -> ClockConfig {
        ClockConfig {
            time_scale: self.time_scale.max(0.0),
            max_delta_time: self.max_delta,
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            initial_state: "mainmenu".to_owned(),
            fixed_delta: None,
            max_frames: None,
            time_scale: 1.0,
            max_delta: 0.25,
            map_layers: 2,
        }
    }
}

/// Log settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

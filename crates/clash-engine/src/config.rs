//! Host configuration.
//!
//! Run length, pacing, logging, data paths and the combat tuning table.
//! Loaded from `clash.toml`; a missing or malformed file falls back to
//! defaults so the host always starts.

use clash_gameplay::CombatConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "clash.toml";

/// Host configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Run Settings ===
    /// Frames to simulate
    pub frames: u32,
    /// Pace frames in wall-clock time instead of running flat out
    pub realtime: bool,
    /// Simulation rate when paced
    pub target_fps: u32,
    /// Stocks per fighter
    pub stocks: u8,
    /// Respawn knocked-out fighters automatically
    pub auto_respawn: bool,

    // === Data ===
    /// RON roster; the built-in roster when unset
    pub roster_path: Option<PathBuf>,
    /// RON stage; the proving grounds when unset
    pub stage_path: Option<PathBuf>,

    // === Output ===
    /// Emit a JSON snapshot every this many frames (0 = never)
    pub snapshot_interval: u32,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,

    // === Combat ===
    /// Combat tuning
    pub combat: CombatConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frames: 600,
            realtime: false,
            target_fps: 60,
            stocks: 4,
            auto_respawn: true,

            roster_path: None,
            stage_path: None,

            snapshot_interval: 0,
            log_filter: "clash=info".to_string(),

            combat: CombatConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp host values to sensible ranges.
    ///
    /// Combat tuning is checked separately when the match is created, since
    /// a bad table is an error rather than something to clamp.
    pub fn validate(&mut self) {
        self.target_fps = self.target_fps.clamp(1, 1000);
        self.stocks = self.stocks.clamp(1, 99);
        if self.log_filter.trim().is_empty() {
            self.log_filter = Self::default().log_filter;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.frames, 600);
        assert_eq!(config.stocks, 4);
        assert!(!config.realtime);
        assert_eq!(config.combat, CombatConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig {
            target_fps: 0,
            stocks: 0,
            log_filter: "  ".to_string(),
            ..Default::default()
        };
        config.validate();

        assert_eq!(config.target_fps, 1);
        assert_eq!(config.stocks, 1);
        assert_eq!(config.log_filter, "clash=info");
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("clash.toml");

        let mut config = EngineConfig::default();
        config.frames = 1200;
        config.snapshot_interval = 30;
        config.stage_path = Some(PathBuf::from("data/stage.ron"));
        config.combat.tech_window = 12;

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("clash.toml");
        fs::write(&config_path, "frames = 90\n\n[combat]\nparry_window = 6\n")
            .expect("Failed to write config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded.frames, 90);
        assert_eq!(loaded.combat.parry_window, 6);
        assert_eq!(loaded.combat.grab_cooldown, CombatConfig::default().grab_cooldown);
        assert_eq!(loaded.target_fps, 60);
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load_from("/nonexistent/path/clash.toml");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_config_load_malformed_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("clash.toml");
        fs::write(&config_path, "frames = \"lots\"").expect("Failed to write config");

        assert_eq!(EngineConfig::load_from(&config_path), EngineConfig::default());
    }
}

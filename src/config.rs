use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::autoplay::AutoPlayConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub advance_after_correct_ms: u64,
    pub advance_after_incorrect_ms: u64,
    pub autoplay_debounce_ms: u64,
    pub autoplay_gap_ms: u64,
    pub autoplay_max_plays: u8,
    pub tick_interval_ms: u64,
    pub tts_program: String,
    pub tts_args: Vec<String>,
    pub database_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            advance_after_correct_ms: 1500,
            advance_after_incorrect_ms: 2000,
            autoplay_debounce_ms: 1000,
            autoplay_gap_ms: 1000,
            autoplay_max_plays: 3,
            tick_interval_ms: 1000,
            tts_program: "espeak".to_string(),
            tts_args: Vec::new(),
            database_path: None,
        }
    }
}

impl Config {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            advance_after_correct_ms: self.advance_after_correct_ms,
            advance_after_incorrect_ms: self.advance_after_incorrect_ms,
            tick_interval_ms: self.tick_interval_ms.max(1),
            autoplay: AutoPlayConfig {
                debounce_ms: self.autoplay_debounce_ms,
                gap_ms: self.autoplay_gap_ms,
                max_plays: self.autoplay_max_plays,
            },
        }
    }
}

/// Timing knobs of the practice engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub advance_after_correct_ms: u64,
    pub advance_after_incorrect_ms: u64,
    pub tick_interval_ms: u64,
    pub autoplay: AutoPlayConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Config::default().engine()
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "wordrill") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("wordrill_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ignoring unreadable config"
                ),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = FileConfigStore::with_path(&path);
        let cfg = Config::default();
        store.save(&cfg).unwrap();
        let loaded = store.load();
        assert_eq!(cfg, loaded);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"autoplay_max_plays": 1, "tts_program": "say"}"#).unwrap();

        let cfg = FileConfigStore::with_path(&path).load();
        assert_eq!(cfg.autoplay_max_plays, 1);
        assert_eq!(cfg.tts_program, "say");
        assert_eq!(cfg.advance_after_correct_ms, 1500);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(FileConfigStore::with_path(&path).load(), Config::default());
    }

    #[test]
    fn engine_config_uses_documented_delays() {
        let engine = EngineConfig::default();
        assert_eq!(engine.advance_after_correct_ms, 1500);
        assert_eq!(engine.advance_after_incorrect_ms, 2000);
        assert_eq!(engine.tick_interval_ms, 1000);
        assert_eq!(engine.autoplay, AutoPlayConfig::default());
    }
}

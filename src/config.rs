use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::language::CodeLanguage;

/// Preset session lengths offered by the client
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DurationPreset {
    Short,
    Standard,
    Long,
}

impl DurationPreset {
    pub const ALL: [DurationPreset; 3] = [
        DurationPreset::Short,
        DurationPreset::Standard,
        DurationPreset::Long,
    ];

    pub fn secs(&self) -> u64 {
        match self {
            DurationPreset::Short => 30,
            DurationPreset::Standard => 60,
            DurationPreset::Long => 120,
        }
    }

    /// Next preset, wrapping around
    pub fn cycle(secs: u64) -> u64 {
        let idx = Self::ALL.iter().position(|p| p.secs() == secs);
        match idx {
            Some(i) => Self::ALL[(i + 1) % Self::ALL.len()].secs(),
            None => DurationPreset::Standard.secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub duration_secs: u64,
    pub language: CodeLanguage,
    pub user_name: String,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration_secs: DurationPreset::Standard.secs(),
            language: CodeLanguage::default(),
            user_name: std::env::var("USER").unwrap_or_else(|_| "guest".to_string()),
            log_filter: "info".to_string(),
        }
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
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("codetype_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
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
                Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable config"),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

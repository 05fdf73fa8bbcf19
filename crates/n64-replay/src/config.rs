use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "N64_REPLAY_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {key}")]
    Env { key: String, value: String },
}

/// Savestate and movie behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Directory slot savestates are written to.
    pub saves_dir: PathBuf,
    /// Capture an undo state before every drain containing a load.
    pub undo_on_load: bool,
    pub compress_savestates: bool,
    pub compression_level: u32,
    /// Embed the current frame in savestates.
    pub st_screenshot: bool,
    /// Answer every confirmation prompt with yes.
    pub silent: bool,
    /// Loading a movie savestate continues playback instead of rerecording.
    pub read_only: bool,
    pub increment_slot: bool,
    /// Samples between seek checkpoints; 0 keeps only the start anchor.
    pub seek_savestate_interval: usize,
    pub seek_savestate_max_count: usize,
    pub pause_at_last_sample: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            saves_dir: PathBuf::from("saves"),
            undo_on_load: true,
            compress_savestates: true,
            compression_level: 6,
            st_screenshot: false,
            silent: false,
            read_only: false,
            increment_slot: false,
            seek_savestate_interval: 100,
            seek_savestate_max_count: 32,
            pause_at_last_sample: false,
        }
    }
}

impl ReplayConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load `path` if given, then apply `N64_REPLAY_*` overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::load_from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }

    /// Apply `N64_REPLAY_<FIELD>` pairs; unrelated variables are skipped.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let field = field.to_ascii_lowercase();
            match field.as_str() {
                "saves_dir" => self.saves_dir = PathBuf::from(&value),
                "undo_on_load" => self.undo_on_load = flag(&key, &value)?,
                "compress_savestates" => self.compress_savestates = flag(&key, &value)?,
                "compression_level" => self.compression_level = number(&key, &value)?,
                "st_screenshot" => self.st_screenshot = flag(&key, &value)?,
                "silent" => self.silent = flag(&key, &value)?,
                "read_only" => self.read_only = flag(&key, &value)?,
                "increment_slot" => self.increment_slot = flag(&key, &value)?,
                "seek_savestate_interval" => self.seek_savestate_interval = number(&key, &value)?,
                "seek_savestate_max_count" => {
                    self.seek_savestate_max_count = number(&key, &value)?
                }
                "pause_at_last_sample" => self.pause_at_last_sample = flag(&key, &value)?,
                _ => log::warn!("Ignoring unknown config override {}", key),
            }
        }
        Ok(())
    }
}

fn env_error(key: &str, value: &str) -> ConfigError {
    ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(env_error(key, value)),
    }
}

fn number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| env_error(key, value))
}

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::backend::{self, DEFAULT_BACKEND};
use crate::error::{LoopError, Result};

const CONFIG_FILE: &str = "config.json";

/// Persisted user settings, stored as a small JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LooperConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

fn default_backend() -> String {
    DEFAULT_BACKEND.into()
}

/// `<platform config dir>/auto-looper/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("auto-looper").join(CONFIG_FILE))
}

impl LooperConfig {
    /// Missing file falls back to defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        log::info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Applies one `key=value` assignment.
    pub fn set(&mut self, assignment: &str) -> Result<()> {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| LoopError::Config(format!("expected key=value, got '{}'", assignment)))?;

        match key.trim() {
            "backend" => {
                let value = value.trim();
                backend::backend_for(value)?;
                self.backend = value.to_string();
                Ok(())
            }
            other => Err(LoopError::Config(format!("unknown setting '{}'", other))),
        }
    }
}

impl std::fmt::Display for LooperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backend = {}", self.backend)
    }
}

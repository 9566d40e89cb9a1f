//! Tool configuration
//!
//! Engine-relevant settings persisted as JSON under the XDG config
//! directory. Every field has a serde default so old config files keep
//! loading as fields are added.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use scout_serial::CrlfMode;

/// Persistent settings for the console engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Bauds the prober tries, in order.
    #[serde(default = "default_bauds")]
    pub default_bauds: Vec<u32>,
    /// Outgoing line-ending translation.
    #[serde(default)]
    pub crlf_mode: CrlfMode,
    /// Echo TX locally in the terminal layer.
    #[serde(default)]
    pub local_echo: bool,
    /// Open transcript files for every session.
    #[serde(default)]
    pub log_by_default: bool,
    /// BREAK duration in milliseconds.
    #[serde(default = "default_break_ms")]
    pub break_ms: u64,
    /// Permit safe probes while the prompt shows configuration mode.
    #[serde(default)]
    pub allow_probe_in_config_mode: bool,
}

fn default_bauds() -> Vec<u32> {
    vec![9600, 115_200]
}

fn default_break_ms() -> u64 {
    250
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_bauds: default_bauds(),
            crlf_mode: CrlfMode::Crlf,
            local_echo: false,
            log_by_default: false,
            break_ms: default_break_ms(),
            allow_probe_in_config_mode: false,
        }
    }
}

impl Config {
    /// XDG config directory: `$XDG_CONFIG_HOME/lanscout`, falling back
    /// to `~/.config/lanscout`.
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("lanscout"));
            }
        }
        dirs::home_dir().map(|h| h.join(".config").join("lanscout"))
    }

    /// Path of the config file.
    pub fn path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        Self::path()
            .and_then(|path| Self::load_from(&path).ok())
            .unwrap_or_default()
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save to the default location.
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::path().ok_or_else(|| anyhow::anyhow!("no config directory available"))?;
        self.save_to(&path)
    }

    /// Save to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

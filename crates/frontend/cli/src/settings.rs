use emu_c64::CartridgeKind;
use emu_core::logging::{LogCategory, LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Level applied to every category without an override
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    /// Per-category overrides
    #[serde(default)]
    pub log_categories: HashMap<LogCategory, LogLevel>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Messages per second per category
    #[serde(default = "default_rate_limit")]
    pub log_rate_limit: usize,
    /// Kind assumed for bare ROM dumps (CRT images carry their own)
    #[serde(default = "default_kind")]
    pub default_kind: CartridgeKind,
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_rate_limit() -> usize {
    60
}

fn default_kind() -> CartridgeKind {
    CartridgeKind::Final3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_categories: HashMap::new(),
            log_file: None,
            log_rate_limit: default_rate_limit(),
            default_kind: default_kind(),
        }
    }
}

impl Settings {
    /// `c64cart.json` next to the executable
    pub fn default_path() -> PathBuf {
        let mut path = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        path.push("c64cart.json");
        path
    }

    /// Load settings, falling back to defaults when the file is missing or unparsable
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!(
                        "Failed to parse {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Push the logging settings into the global core configuration
    pub fn apply_logging(&self, config: &LogConfig) -> std::io::Result<()> {
        config.set_global_level(self.log_level);
        for (&category, &level) in &self.log_categories {
            config.set_level(category, level);
        }
        config.set_rate_limit(self.log_rate_limit);
        if let Some(path) = &self.log_file {
            config.set_log_file(path.clone())?;
        }
        Ok(())
    }
}

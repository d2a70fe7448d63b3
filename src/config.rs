//! Editor launch configuration.
//!
//! Lookup order (later wins):
//! 1. Built-in defaults
//! 2. `config.json` in the user config directory (`~/.config/nvim-tui/` on Linux)
//! 3. `NVIM_TUI_BIN` / `NVIM_TUI_ARGS` environment variables

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rpc::REDRAW_METHOD;

/// Environment variable overriding the editor executable.
pub const PROGRAM_ENV: &str = "NVIM_TUI_BIN";
/// Environment variable overriding the editor arguments (whitespace separated).
pub const ARGS_ENV: &str = "NVIM_TUI_ARGS";
/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "nvim_tui=info";

const APP_DIR: &str = "nvim-tui";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Editor executable, looked up on `PATH` when not absolute.
    pub program: String,
    /// Arguments passed to the editor; must put it in embedded mode.
    pub args: Vec<String>,
    /// Initial grid width in cells.
    pub width: u16,
    /// Initial grid height in cells.
    pub height: u16,
    /// Ask for 24-bit colour.
    pub rgb: bool,
    /// Notification method carrying screen updates.
    pub redraw_method: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            program: "nvim".to_string(),
            args: vec!["--embed".to_string()],
            width: 80,
            height: 24,
            rgb: true,
            redraw_method: REDRAW_METHOD.to_string(),
        }
    }
}

impl EditorConfig {
    /// Defaults, then the user config file, then the environment.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_json::from_str(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps a variable name to its
    /// value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(program) = lookup(PROGRAM_ENV).filter(|p| !p.trim().is_empty()) {
            info!("Using editor from {}: {}", PROGRAM_ENV, program);
            self.program = program;
        }
        if let Some(args) = lookup(ARGS_ENV) {
            self.args = args.split_whitespace().map(str::to_string).collect();
        }
    }
}

/// `<config dir>/nvim-tui/config.json`, if the platform has a config dir.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// `<cache dir>/nvim-tui/`, where the binary writes its log.
pub fn log_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.program, "nvim");
        assert_eq!(config.args, vec!["--embed".to_string()]);
        assert_eq!((config.width, config.height), (80, 24));
        assert!(config.rgb);
        assert_eq!(config.redraw_method, "redraw");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{"width": 120}"#).unwrap();
        assert_eq!(config.width, 120);
        assert_eq!(config.height, 24);
        assert_eq!(config.program, "nvim");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EditorConfig::default();
        config.apply_env(env(&[
            (PROGRAM_ENV, "/opt/nvim/bin/nvim"),
            (ARGS_ENV, "--embed  --headless -u NONE"),
        ]));
        assert_eq!(config.program, "/opt/nvim/bin/nvim");
        assert_eq!(config.args, vec!["--embed", "--headless", "-u", "NONE"]);
    }

    #[test]
    fn test_blank_program_env_is_ignored() {
        let mut config = EditorConfig::default();
        config.apply_env(env(&[(PROGRAM_ENV, "  ")]));
        assert_eq!(config.program, "nvim");
    }

    #[test]
    fn test_from_file_errors_carry_path() {
        let path = std::env::temp_dir().join(format!("nvim-tui-bad-{}.json", std::process::id()));
        std::fs::write(&path, "{ not json").unwrap();
        let err = EditorConfig::from_file(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);
        assert!(err.to_string().contains("Invalid config"));
    }
}

//! TOML-based configuration for lmat.
//!
//! Supports a config file (lmat.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [worker]
//! mode = "source"            # or "executable"
//! root = "${HOME}/.local/share/lmat"
//! python = "python"
//! venv = ".venv"
//! script = "sympy-client/SympyClient.py"
//!
//! [worker.timeouts]
//! connect_secs = 30
//! request_secs = 120         # 0 waits forever
//! shutdown_secs = 5
//!
//! [environment]
//! block_language = "lmat"
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Worker process configuration.
    pub worker: WorkerSettings,

    /// Environment resolution configuration.
    pub environment: EnvironmentSettings,
}

/// How the worker process is started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnMode {
    /// Run the packaged executable for the current platform.
    #[default]
    Executable,
    /// Run the client sources with a virtual-environment interpreter.
    Source,
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Spawn strategy.
    pub mode: SpawnMode,

    /// Directory holding `bin/` (executables) or the client sources.
    pub root: String,

    /// Explicit executable path, overriding the platform default.
    pub executable: Option<String>,

    /// Interpreter name inside the virtual environment.
    pub python: String,

    /// Virtual environment directory, relative to `root`.
    pub venv: String,

    /// Client entry script, relative to `root`.
    pub script: String,

    /// Time limits.
    pub timeouts: TimeoutSettings,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            mode: SpawnMode::Executable,
            root: ".".to_string(),
            executable: None,
            python: "python".to_string(),
            venv: ".venv".to_string(),
            script: "sympy-client/SympyClient.py".to_string(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

/// Time limits in seconds; `0` disables the connect and request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub connect_secs: u64,
    pub request_secs: u64,
    pub shutdown_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect_secs: 30,
            request_secs: 120,
            shutdown_secs: 5,
        }
    }
}

/// Environment resolution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// Language tag of the fenced block holding the declarative environment.
    pub block_language: String,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            block_language: "lmat".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `LMAT_CONFIG`
    /// 2. `./lmat.toml`
    /// 3. `~/.config/lmat/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("LMAT_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("lmat.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("lmat").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        // Return defaults if no config file found
        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}

//! Configuration module for lmat.
//!
//! Handles worker launch settings, timeouts and environment resolution
//! settings.

mod settings;

pub use settings::{
    expand_env_vars, EnvironmentSettings, Settings, SettingsError, SpawnMode, TimeoutSettings,
    WorkerSettings,
};

use std::{
    fs,
    path::{Path, PathBuf},
};

use authstate_session::SessionConfig;
use authstate_storage::crypto::DEFAULT_PBKDF2_ITERATIONS;
use color_eyre::Result;
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// User-level configuration loaded from `~/.config/authstate/config.toml` (platform-specific).
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Override for data directory (encrypted store).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub session: SessionSettings,
    pub crypto: CryptoSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionSettings {
    pub max_duration_minutes: u64,
    pub inactivity_timeout_minutes: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_duration_minutes: 30,
            inactivity_timeout_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CryptoSettings {
    pub pbkdf2_iterations: u32,
}

impl Default for CryptoSettings {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl CryptoSettings {
    /// Key-derivation rounds for the data store. Values below the default are
    /// refused; records do not carry their round count.
    pub fn checked_iterations(&self) -> Result<u32> {
        if self.pbkdf2_iterations < DEFAULT_PBKDF2_ITERATIONS {
            color_eyre::eyre::bail!(
                "crypto.pbkdf2_iterations must be at least {DEFAULT_PBKDF2_ITERATIONS} (got {})",
                self.pbkdf2_iterations
            );
        }
        Ok(self.pbkdf2_iterations)
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.crypto.checked_iterations()?;
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from_minutes(
            self.session.max_duration_minutes,
            self.session.inactivity_timeout_minutes,
        )
    }
}

/// Load config from the default path; if missing, return defaults.
pub fn load() -> Result<Config> {
    let path = default_path()?;
    load_from_path(path)
}

/// Load config from a given path; if missing or empty, return defaults.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let cfg: Config = toml::from_str(&contents)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolve the default config path (platform aware).
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| color_eyre::eyre::eyre!("no config dir available"))?;
    Ok(base.join("authstate").join("config.toml"))
}

/// Write the given config to the default path unless a file already exists there.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_to_path_if_missing(config, &default_path()?)
}

fn write_to_path_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

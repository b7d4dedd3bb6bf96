use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Permanent business profile printed on invoices and message summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessInfo {
    #[serde(default = "default_business_name")]
    pub name: String,
    #[serde(default = "default_business_address")]
    pub address: String,
    #[serde(default = "default_business_phone")]
    pub phone: String,
    #[serde(default = "default_business_website")]
    pub website: String,
    #[serde(default = "default_business_ein")]
    pub ein: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Sales tax rate applied to invoice subtotals (Kentucky: 6%)
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
    #[serde(default)]
    pub business: BusinessInfo,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

impl Default for BusinessInfo {
    fn default() -> Self {
        Self {
            name: default_business_name(),
            address: default_business_address(),
            phone: default_business_phone(),
            website: default_business_website(),
            ein: default_business_ein(),
            email: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            tax_rate: default_tax_rate(),
            business: BusinessInfo::default(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

// Default value functions
fn default_database_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    if let Some(data_dir) = utils::get_data_dir(utils::Profile::Prod) {
        data_dir.join("app.db").to_string_lossy().to_string()
    } else {
        "~/.local/share/omc/app.db".to_string()
    }
}

fn default_tax_rate() -> f64 {
    0.06
}

fn default_business_name() -> String {
    "Owensboro Mowing Company".to_string()
}

fn default_business_address() -> String {
    "Owensboro, Kentucky 42303".to_string()
}

fn default_business_phone() -> String {
    "270.222.9613 or 270.499.7758".to_string()
}

fn default_business_website() -> String {
    "https://owensboromowingcompany.com".to_string()
}

fn default_business_ein() -> String {
    "EIN 93-2058075".to_string()
}

fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine config and database paths
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;

            // Ensure database path matches profile (in case config was manually edited)
            config.database_path = Self::default_database_path_for_profile(profile);

            Ok(config)
        } else {
            // Create default config and save it
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            config.save_with_profile(profile)?;
            Ok(config)
        }
    }

    /// Load configuration from file, using production profile
    /// Use load_with_profile() to specify a different profile
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_profile(utils::Profile::Prod)
    }

    /// Save configuration to file
    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        let config_path = Self::get_config_path(profile)?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, toml_string)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Save configuration to file, using production profile
    pub fn save(&mut self) -> Result<(), ConfigError> {
        self.save_with_profile(utils::Profile::Prod)
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile).ok_or_else(|| {
            ConfigError::ConfigDirError("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("app.db").to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => "~/.local/share/omc-dev/app.db".to_string(),
                utils::Profile::Prod => "~/.local/share/omc/app.db".to_string(),
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }
}


use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::database::Role;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 128;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub connect_timeout_seconds: u64,
    /// Attempts made when opening a connection before giving up
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub roles: RoleCredentials,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5433,
            name: "ear_db".to_string(),
            connect_timeout_seconds: 10,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            roles: RoleCredentials::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoleCredentials {
    pub gatekeeper: Credentials,
    pub user: Credentials,
    pub admin: Credentials,
}

impl Default for RoleCredentials {
    fn default() -> Self {
        Self {
            gatekeeper: Credentials::named("clinic_gatekeeper"),
            user: Credentials::named("clinic_user"),
            admin: Credentials::named("clinic_admin"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    #[inline]
    pub fn named(username: &str) -> Self {
        Self {
            username: username.to_string(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatcherConfig {
    pub embedding_dimension: u32,
    /// Cosine distance above which the nearest neighbour is rejected
    pub max_distance: Option<f64>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            max_distance: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditMode {
    /// Activity entry is written in the same transaction as the mutation
    #[default]
    Transactional,
    /// Activity entry is written after commit; failures are only logged
    BestEffort,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AuditConfig {
    pub mode: AuditMode,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid host: {0} (cannot be empty)")]
    InvalidHost(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid database name: {0} (cannot be empty)")]
    InvalidDatabaseName(String),
    #[error("Missing username for the {0} role")]
    MissingUsername(Role),
    #[error("Invalid connect timeout: {0} (must be between 1 and 120 seconds)")]
    InvalidConnectTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid embedding dimension: {0} (must be between 2 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid max distance: {0} (cosine distance must be between 0 and 2)")]
    InvalidMaxDistance(f64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            matcher: MatcherConfig::default(),
            audit: AuditConfig::default(),
            base_dir: Self::config_dir().unwrap_or_else(|_| PathBuf::from(".clinic-registry")),
        }
    }
}

impl Config {
    /// Platform configuration directory for the registry
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("clinic-registry"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the platform configuration directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let config_dir = Self::config_dir().context("Failed to locate configuration directory")?;
        Self::load(config_dir)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.matcher.validate()?;
        Ok(())
    }
}

impl DatabaseConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(self.host.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidDatabaseName(self.name.clone()));
        }

        if !(1..=120).contains(&self.connect_timeout_seconds) {
            return Err(ConfigError::InvalidConnectTimeout(
                self.connect_timeout_seconds,
            ));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        for role in Role::ALL {
            if self.credentials(role).username.trim().is_empty() {
                return Err(ConfigError::MissingUsername(role));
            }
        }

        Ok(())
    }

    #[inline]
    pub fn credentials(&self, role: Role) -> &Credentials {
        match role {
            Role::Gatekeeper => &self.roles.gatekeeper,
            Role::User => &self.roles.user,
            Role::Admin => &self.roles.admin,
        }
    }

    #[inline]
    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    #[inline]
    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        if host.trim().is_empty() {
            return Err(ConfigError::InvalidHost(host));
        }
        self.host = host;
        Ok(())
    }
}

impl MatcherConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if let Some(max_distance) = self.max_distance {
            if !(0.0..=2.0).contains(&max_distance) {
                return Err(ConfigError::InvalidMaxDistance(max_distance));
            }
        }

        Ok(())
    }

    pub fn set_max_distance(&mut self, max_distance: Option<f64>) -> Result<(), ConfigError> {
        if let Some(value) = max_distance {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::InvalidMaxDistance(value));
            }
        }
        self.max_distance = max_distance;
        Ok(())
    }
}

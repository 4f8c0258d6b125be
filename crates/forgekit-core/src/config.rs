//! Configuration management for forgekit.
//!
//! Handles loading and saving configuration from TOML files.
//! Config files are stored in platform-specific locations:
//!
//! - **macOS/Linux**: `~/.config/forgekit/config.toml`
//! - **Windows**: `%APPDATA%\forgekit\config.toml`
//!
//! # Example
//!
//! ```ignore
//! use forgekit_core::config::{Config, GiteaConfig};
//!
//! let mut config = Config::load()?;
//! config.gitea = Some(GiteaConfig {
//!     url: "https://try.gitea.io".to_string(),
//!     token: Some("secret".to_string()),
//! });
//! config.save()?;
//!
//! let provider = config.provider()?;
//! ```

use crate::capability::ProviderKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "forgekit";

// =============================================================================
// Configuration structures
// =============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Gitea configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitea: Option<GiteaConfig>,

    /// Bitbucket Server configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stash: Option<StashConfig>,

    /// GitLab configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitlab: Option<GitLabConfig>,

    /// HTTP client settings shared by every provider
    #[serde(default, skip_serializing_if = "HttpConfig::is_default")]
    pub http: HttpConfig,
}

/// Gitea provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiteaConfig {
    /// Gitea instance URL
    pub url: String,
    /// Access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Bitbucket Server provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashConfig {
    /// Bitbucket Server instance URL
    pub url: String,
    /// Personal access token, or password when `username` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Switches to basic auth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// GitLab provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitLabConfig {
    /// GitLab instance URL
    #[serde(default = "default_gitlab_url")]
    pub url: String,
    /// Personal access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// HTTP client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds (none by default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Overrides the `forgekit/<version>` user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl HttpConfig {
    fn is_default(&self) -> bool {
        self == &Self::default()
    }
}

/// One provider's settings, selecting which driver to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    Gitea(GiteaConfig),
    Stash(StashConfig),
    GitLab(GitLabConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderConfig::Gitea(_) => ProviderKind::Gitea,
            ProviderConfig::Stash(_) => ProviderKind::Stash,
            ProviderConfig::GitLab(_) => ProviderKind::GitLab,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ProviderConfig::Gitea(c) => &c.url,
            ProviderConfig::Stash(c) => &c.url,
            ProviderConfig::GitLab(c) => &c.url,
        }
    }
}

fn default_gitlab_url() -> String {
    "https://gitlab.com".to_string()
}

// =============================================================================
// Config implementation
// =============================================================================

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        debug!(path = ?path, "Saving config");

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved successfully");
        Ok(())
    }

    /// Get a list of configured provider names.
    pub fn configured_providers(&self) -> Vec<&'static str> {
        let mut providers = Vec::new();
        if self.gitea.is_some() {
            providers.push("gitea");
        }
        if self.stash.is_some() {
            providers.push("stash");
        }
        if self.gitlab.is_some() {
            providers.push("gitlab");
        }
        providers
    }

    /// The single configured provider.
    ///
    /// Fails when none or more than one section is present; use
    /// [`Config::provider_named`] to pick one explicitly.
    pub fn provider(&self) -> Result<ProviderConfig> {
        match self.configured_providers().as_slice() {
            [] => Err(Error::Config("No provider configured".to_string())),
            [name] => self.provider_named(name),
            many => Err(Error::Config(format!(
                "Several providers configured ({}), pick one by name",
                many.join(", ")
            ))),
        }
    }

    /// The provider configured under `name` (`gitea`, `stash`, `gitlab`).
    pub fn provider_named(&self, name: &str) -> Result<ProviderConfig> {
        let kind: ProviderKind = name.parse()?;
        let missing = || Error::Config(format!("Provider '{}' is not configured", kind.name()));
        match kind {
            ProviderKind::Gitea => self.gitea.clone().map(ProviderConfig::Gitea).ok_or_else(missing),
            ProviderKind::Stash => self.stash.clone().map(ProviderConfig::Stash).ok_or_else(missing),
            ProviderKind::GitLab => self
                .gitlab
                .clone()
                .map(ProviderConfig::GitLab)
                .ok_or_else(missing),
        }
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g., `gitea.url`, `http.timeout_secs`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, field) = split_key(key)?;

        match section {
            "gitea" => {
                let config = self.gitea.get_or_insert_with(|| GiteaConfig {
                    url: String::new(),
                    token: None,
                });
                match field {
                    "url" => config.url = value.to_string(),
                    "token" => config.token = Some(value.to_string()),
                    _ => return Err(unknown_field("Gitea", field)),
                }
            }
            "stash" => {
                let config = self.stash.get_or_insert_with(|| StashConfig {
                    url: String::new(),
                    token: None,
                    username: None,
                });
                match field {
                    "url" => config.url = value.to_string(),
                    "token" | "password" => config.token = Some(value.to_string()),
                    "username" | "user" => config.username = Some(value.to_string()),
                    _ => return Err(unknown_field("Stash", field)),
                }
            }
            "gitlab" => {
                let config = self.gitlab.get_or_insert_with(|| GitLabConfig {
                    url: default_gitlab_url(),
                    token: None,
                });
                match field {
                    "url" => config.url = value.to_string(),
                    "token" => config.token = Some(value.to_string()),
                    _ => return Err(unknown_field("GitLab", field)),
                }
            }
            "http" => match field {
                "timeout_secs" | "timeout" => {
                    let secs = value.parse::<u64>().map_err(|_| {
                        Error::Config(format!("Invalid timeout '{}': expected seconds", value))
                    })?;
                    self.http.timeout_secs = Some(secs);
                }
                "user_agent" => self.http.user_agent = Some(value.to_string()),
                _ => return Err(unknown_field("HTTP", field)),
            },
            _ => {
                return Err(Error::Config(format!("Unknown provider: {}", section)));
            }
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    ///
    /// Key format: `section.field` (e.g., `gitea.url`, `http.timeout_secs`)
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let (section, field) = split_key(key)?;

        match section {
            "gitea" => {
                let Some(config) = &self.gitea else {
                    return Ok(None);
                };
                match field {
                    "url" => Ok(Some(config.url.clone())),
                    "token" => Ok(config.token.clone()),
                    _ => Err(unknown_field("Gitea", field)),
                }
            }
            "stash" => {
                let Some(config) = &self.stash else {
                    return Ok(None);
                };
                match field {
                    "url" => Ok(Some(config.url.clone())),
                    "token" | "password" => Ok(config.token.clone()),
                    "username" | "user" => Ok(config.username.clone()),
                    _ => Err(unknown_field("Stash", field)),
                }
            }
            "gitlab" => {
                let Some(config) = &self.gitlab else {
                    return Ok(None);
                };
                match field {
                    "url" => Ok(Some(config.url.clone())),
                    "token" => Ok(config.token.clone()),
                    _ => Err(unknown_field("GitLab", field)),
                }
            }
            "http" => match field {
                "timeout_secs" | "timeout" => Ok(self.http.timeout_secs.map(|s| s.to_string())),
                "user_agent" => Ok(self.http.user_agent.clone()),
                _ => Err(unknown_field("HTTP", field)),
            },
            _ => Err(Error::Config(format!("Unknown provider: {}", section))),
        }
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.len() != 2 {
        return Err(Error::Config(format!(
            "Invalid config key '{}'. Expected format: section.field",
            key
        )));
    }
    Ok((parts[0], parts[1]))
}

fn unknown_field(section: &str, field: &str) -> Error {
    Error::Config(format!("Unknown {} config field: {}", section, field))
}

// =============================================================================
// Tests
// =============================================================================

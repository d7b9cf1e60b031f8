//! Runtime configuration
//!
//! Loaded from an optional JSON file, then overridden from `MSIGFLOW_*`
//! environment variables. Missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Default token key. Deployments sharing tokens must agree on the key.
pub const DEFAULT_TOKEN_KEY: &str = "multisig-flow/token/v1";

/// Label given to generated change addresses
pub const DEFAULT_CHANGE_LABEL: &str = "multisig_change_address";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Wallet node JSON-RPC endpoint
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8332".to_string(),
            user: String::new(),
            password: String::new(),
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for RpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Process-wide settings
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Key of the token keystream
    pub token_key: String,
    /// Label for generated change addresses
    pub change_label: String,
    /// Minimum confirmations used when a request gives none
    pub default_min_confirmations: u32,
    pub rpc: RpcConfig,
    pub api_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            change_label: DEFAULT_CHANGE_LABEL.to_string(),
            default_min_confirmations: 0,
            rpc: RpcConfig::default(),
            api_port: 3000,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token_key", &"<redacted>")
            .field("change_label", &self.change_label)
            .field("default_min_confirmations", &self.default_min_confirmations)
            .field("rpc", &self.rpc)
            .field("api_port", &self.api_port)
            .finish()
    }
}

impl Config {
    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, otherwise defaults; then apply the
    /// process environment
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Override fields from environment variables looked up through `var`
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = var("MSIGFLOW_TOKEN_KEY") {
            self.token_key = key;
        }
        if let Some(label) = var("MSIGFLOW_CHANGE_LABEL") {
            self.change_label = label;
        }
        if let Some(url) = var("MSIGFLOW_RPC_URL") {
            self.rpc.url = url;
        }
        if let Some(user) = var("MSIGFLOW_RPC_USER") {
            self.rpc.user = user;
        }
        if let Some(password) = var("MSIGFLOW_RPC_PASSWORD") {
            self.rpc.password = password;
        }
        if let Some(timeout) = var("MSIGFLOW_RPC_TIMEOUT_SECS") {
            self.rpc.timeout_secs = timeout.parse().map_err(|_| {
                ConfigError::Invalid(format!("MSIGFLOW_RPC_TIMEOUT_SECS: {}", timeout))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_key.is_empty() {
            return Err(ConfigError::Invalid("token_key must not be empty".to_string()));
        }
        if self.change_label.is_empty() {
            return Err(ConfigError::Invalid(
                "change_label must not be empty".to_string(),
            ));
        }
        if self.rpc.url.is_empty() {
            return Err(ConfigError::Invalid("rpc.url must not be empty".to_string()));
        }
        if self.rpc.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "rpc.timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

//! Broker configuration file.
//!
//! ```toml
//! [vault]
//! enabled = true
//! client_identifier = "csb"
//!
//! [[services]]
//! id = "5f2e7f0c-mysql"
//! name = "cloud-mysql"
//! plan_updateable = true
//! non_updatable_parameters = ["region"]
//!
//! [services.provision_defaults]
//! region = "us-central1"
//!
//! [[services.plans]]
//! id = "b1a0-small"
//! name = "small"
//! properties = { tier = "db-n1-standard-1" }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::definition::ServiceDefinition;

/// Environment variable that overrides `vault.client_identifier`.
pub const CLIENT_IDENTIFIER_ENV: &str = "BROKER_VAULT_CLIENT_IDENTIFIER";

const DEFAULT_CLIENT_IDENTIFIER: &str = "csb";

fn default_client_identifier() -> String {
    DEFAULT_CLIENT_IDENTIFIER.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse broker configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Types ─────────────────────────────────────────────────────────────────────

/// `[vault]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub enabled: bool,
    /// First path segment of every vaulted credential name.
    #[serde(default = "default_client_identifier")]
    pub client_identifier: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            client_identifier: default_client_identifier(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BrokerConfig {
    /// Parse a configuration document. Environment overrides are not applied.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Read and parse the file at `path`, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides looked up through `lookup`. Empty values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(id) = lookup(CLIENT_IDENTIFIER_ENV).filter(|v| !v.trim().is_empty()) {
            self.vault.client_identifier = id;
        }
    }

    pub fn service(&self, service_id: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.id == service_id)
    }

    /// Every problem found in the configuration. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.id.as_str()) {
                problems.push(format!("service id {} is defined more than once", service.id));
            }
            problems.extend(service.validate());
        }
        if self.vault.enabled && self.vault.client_identifier.trim().is_empty() {
            problems.push("vault.client_identifier must not be empty".to_string());
        }
        problems
    }
}

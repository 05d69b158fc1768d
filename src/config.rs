//! Driver-layer configuration file support.

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::auditor::SecurityModel;
use crate::fusefs::Fusebox;
use crate::pseudo;

/// Security model spelling used in configuration files.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Whitelist,
    Blacklist,
}

impl From<ModelChoice> for SecurityModel {
    fn from(choice: ModelChoice) -> Self {
        match choice {
            ModelChoice::Whitelist => SecurityModel::Whitelist,
            ModelChoice::Blacklist => SecurityModel::Blacklist,
        }
    }
}

/// Startup configuration for a sandbox run.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Overlay source directory.
    pub source: PathBuf,
    /// Host directory the overlay is attached at.
    pub mountpoint: PathBuf,
    /// Base path for the access-log export, if wanted.
    #[serde(default)]
    pub logfile: Option<PathBuf>,
    #[serde(default)]
    pub security_model: ModelChoice,
    /// Initial state of the auditor master switch.
    #[serde(default = "default_enabled")]
    pub acl_enabled: bool,
    /// Initial rules, one ACL command line each, applied in order.
    #[serde(default)]
    pub rules: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

/// Configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "cannot read configuration: {err}"),
            ConfigError::Parse(err) => write!(f, "cannot parse configuration: {err}"),
        }
    }
}

impl Config {
    /// Read and parse a TOML configuration file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path).await.map_err(ConfigError::Io)?;
        toml::from_str(&text).map_err(ConfigError::Parse)
    }

    /// Apply the policy portion of the configuration to a freshly built
    /// filesystem instance.
    pub fn apply(&self, fusebox: &mut Fusebox) {
        fusebox.auditor.security_model = self.security_model.into();
        fusebox.auditor.enabled = self.acl_enabled;
        for rule in &self.rules {
            pseudo::apply_commands(&mut fusebox.auditor, rule);
        }
    }
}

//! # Configuration
//!
//! One TOML file composed of flat settings structs per concern. Every section
//! and field is optional and falls back to its default.
//!
//! ```toml
//! [system]
//! handler_instances = 4
//! shutdown_timeout_ms = 3000
//!
//! [launcher]
//! clustered = false
//!
//! [launcher.blocks]
//! default = ["ping", "storage"]
//! edge = ["ping"]
//!
//! [launcher.remotes]
//! "edge-01.example.com" = "edge"
//!
//! [security]
//! hmac_algorithm = "HmacSHA512"
//! signature_algorithm = "Ed25519"
//!
//! [security.keystores.node]
//! private_key = "conf/keys/node.key"
//!
//! [dependencies.storage]
//! secrets = ["secret"]
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `CHORUS_CONFIG` | configuration file path |
//! | `CHORUS_SHUTDOWN_TIMEOUT_MS` | `system.shutdown_timeout_ms` |
//! | `CHORUS_HANDLER_INSTANCES` | `system.handler_instances` |

use crate::generator::AuthenticationDependency;
use serde::{Deserialize, Serialize};
use shared_crypto::{CryptoError, SecuritySettings};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Default configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "conf/system.toml";

/// Name of the block used when no identifier matches.
pub const DEFAULT_BLOCK: &str = "default";

/// Environment variable naming the configuration file.
pub const ENV_CONFIG: &str = "CHORUS_CONFIG";

/// Environment override for the shutdown timeout.
pub const ENV_SHUTDOWN_TIMEOUT_MS: &str = "CHORUS_SHUTDOWN_TIMEOUT_MS";

/// Environment override for handler instances.
pub const ENV_HANDLER_INSTANCES: &str = "CHORUS_HANDLER_INSTANCES";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Security settings name an unusable algorithm.
    #[error("Invalid security settings: {0}")]
    Security(#[from] CryptoError),
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Process-wide runtime settings.
    pub system: SystemSettings,
    /// Which nodes to deploy.
    pub launcher: LauncherSettings,
    /// Token trust settings.
    pub security: SecuritySettings,
    /// Secrets and tokens to generate, keyed by configuration file name.
    pub dependencies: BTreeMap<String, AuthenticationDependency>,
}

impl Configuration {
    /// Parse from a TOML string and validate.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Load the file named by `CHORUS_CONFIG` (or the default path), falling
    /// back to defaults when it does not exist, then apply environment
    /// overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            info!(path = %path, "Loading configuration");
            Self::load(&path)?
        } else {
            warn!(path = %path, "Configuration file not found, using defaults");
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(ENV_SHUTDOWN_TIMEOUT_MS) {
            match value.parse() {
                Ok(ms) => self.system.shutdown_timeout_ms = ms,
                Err(_) => warn!(value = %value, "{ENV_SHUTDOWN_TIMEOUT_MS} is not a number"),
            }
        }
        if let Some(value) = lookup(ENV_HANDLER_INSTANCES) {
            match value.parse() {
                Ok(instances) => self.system.handler_instances = instances,
                Err(_) => warn!(value = %value, "{ENV_HANDLER_INSTANCES} is not a number"),
            }
        }
    }

    /// Check value ranges and algorithm names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system.handler_instances == 0 {
            return Err(ConfigError::Invalid(
                "system.handler_instances must be positive".into(),
            ));
        }
        if self.system.shutdown_poll_ms == 0 {
            return Err(ConfigError::Invalid(
                "system.shutdown_poll_ms must be positive".into(),
            ));
        }
        if self.launcher.clustered && self.system.cluster_secret.is_empty() {
            return Err(ConfigError::Invalid(
                "system.cluster_secret is required when launcher.clustered is set".into(),
            ));
        }
        for (host, block) in &self.launcher.remotes {
            if !self.launcher.blocks.contains_key(block) {
                return Err(ConfigError::Invalid(format!(
                    "remote {host} references unknown block {block}"
                )));
            }
        }
        self.security.validate()?;
        Ok(())
    }
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    /// Identity of this process on the bus.
    pub node_id: String,
    /// Host name announced to the cluster.
    pub host: String,
    /// Consumers deployed per node.
    pub handler_instances: usize,
    /// Maximum time to wait for nodes to stop.
    pub shutdown_timeout_ms: u64,
    /// Interval between shutdown progress checks.
    pub shutdown_poll_ms: u64,
    /// Default timeout for bus requests.
    pub request_timeout_ms: u64,
    /// Base64 HMAC secret for tokens issued by this process. Generated at
    /// startup when empty.
    pub secret: String,
    /// Pre-shared secret required to join the cluster.
    pub cluster_secret: String,
    /// Directory scanned by the secret and token generator.
    pub config_directory: PathBuf,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            node_id: "chorus".into(),
            host: "localhost".into(),
            handler_instances: num_cpus::get(),
            shutdown_timeout_ms: 3000,
            shutdown_poll_ms: 50,
            request_timeout_ms: 3000,
            secret: String::new(),
            cluster_secret: String::new(),
            config_directory: PathBuf::from("conf"),
        }
    }
}

impl SystemSettings {
    /// Shutdown timeout as a duration.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Shutdown poll interval as a duration.
    pub fn shutdown_poll(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms)
    }

    /// Default request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Launcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    /// Application name shown at startup.
    pub application: String,
    /// Join a cluster instead of running standalone.
    pub clustered: bool,
    /// Named lists of node identifiers, deployed in order.
    pub blocks: BTreeMap<String, Vec<String>>,
    /// Host name → block name.
    pub remotes: BTreeMap<String, String>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        let mut blocks = BTreeMap::new();
        blocks.insert(
            DEFAULT_BLOCK.to_string(),
            vec!["ping".to_string(), "storage".to_string()],
        );
        Self {
            application: "chorus".into(),
            clustered: false,
            blocks,
            remotes: BTreeMap::new(),
        }
    }
}

impl LauncherSettings {
    /// Resolve the node list for an identifier.
    ///
    /// Remotes are checked first, then blocks. Anything else, including no
    /// identifier at all, falls back to the default block.
    pub fn block(&self, identifier: Option<&str>) -> Option<(&str, &[String])> {
        let name = match identifier {
            Some(id) if self.remotes.contains_key(id) => self.remotes.get(id).map(String::as_str),
            Some(id) if self.blocks.contains_key(id) => Some(id),
            _ => None,
        }
        .unwrap_or(DEFAULT_BLOCK);

        self.blocks
            .get_key_value(name)
            .map(|(name, nodes)| (name.as_str(), nodes.as_slice()))
    }
}

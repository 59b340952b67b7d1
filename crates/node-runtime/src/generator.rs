//! # Authentication Generator
//!
//! Writes secrets and tokens into service configuration files.
//!
//! Each entry under `[dependencies]` is keyed by a configuration file name;
//! every `*.toml` file in the configuration directory whose path ends in
//! `<key>.toml` receives:
//!
//! - `secrets`: fresh random secrets, one per listed field
//! - `preshare`: a secret shared by every file naming the same field
//! - `tokens`: a token issued by another service, HMAC-signed with that
//!   service's secret and scoped to this service's identity
//!
//! ```toml
//! [dependencies.authentication]
//! secrets = ["client_secret"]
//! preshare = ["cluster_secret"]
//!
//! [dependencies.storage.tokens.auth_token]
//! service = "authentication"
//! secret = "client_secret"
//! ```

use serde::{Deserialize, Serialize};
use shared_crypto::{CryptoError, SecretFactory, SecuritySettings, TokenFactory};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};
use tracing::{info, warn};

/// Table holding a service's identity.
pub const ID_IDENTITY: &str = "identity";

const CONFIG_EXTENSION: &str = ".toml";

/// Generator errors.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// File could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML.
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Token issuer has no configuration file.
    #[error("No configuration found for issuing service {0}")]
    IssuerNotFound(String),

    /// Token issuer configuration lacks the named secret.
    #[error("Service {service} has no secret '{secret}'")]
    SecretNotFound {
        /// Issuing service
        service: String,
        /// Secret field
        secret: String,
    },

    /// Token signing failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// What to generate for one configuration file key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationDependency {
    /// Fields receiving fresh secrets.
    pub secrets: Vec<String>,
    /// Fields receiving secrets shared across files.
    pub preshare: Vec<String>,
    /// Fields receiving tokens, keyed by field name.
    pub tokens: BTreeMap<String, TokenIdentifier>,
}

/// The service and secret that issue a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenIdentifier {
    /// Issuing service's configuration key.
    pub service: String,
    /// Secret field in the issuer's configuration.
    pub secret: String,
}

/// Service identity used as the token domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteIdentity {
    /// Node name.
    pub node: String,
    /// Host name.
    pub host: String,
}

/// Generates secrets, pre-shared secrets and tokens into configuration files.
pub struct AuthenticationGenerator {
    directory: PathBuf,
    security: SecuritySettings,
    dependencies: BTreeMap<String, AuthenticationDependency>,
}

impl AuthenticationGenerator {
    /// Create a generator over `directory`.
    pub fn new(
        directory: impl Into<PathBuf>,
        security: SecuritySettings,
        dependencies: BTreeMap<String, AuthenticationDependency>,
    ) -> Self {
        Self {
            directory: directory.into(),
            security,
            dependencies,
        }
    }

    /// Secrets, then pre-shared secrets, then tokens.
    pub fn all(&self) -> Result<(), GeneratorError> {
        self.secrets()?;
        self.preshare()?;
        self.tokens()
    }

    /// Generate fresh secrets.
    pub fn secrets(&self) -> Result<(), GeneratorError> {
        self.each_configuration(|dependency, config, path| {
            for field in &dependency.secrets {
                info!(field = %field, path = %path.display(), "Generating secret");
                config.insert(
                    field.clone(),
                    Value::String(SecretFactory::generate(self.security.secret_bytes)),
                );
            }
            Ok(())
        })
    }

    /// Generate secrets shared by every file naming the same field.
    pub fn preshare(&self) -> Result<(), GeneratorError> {
        let mut shared: HashMap<String, String> = HashMap::new();
        self.each_configuration(|dependency, config, path| {
            for field in &dependency.preshare {
                let secret = shared
                    .entry(field.clone())
                    .or_insert_with(|| SecretFactory::generate(self.security.secret_bytes));
                info!(field = %field, path = %path.display(), "Generating pre-shared secret");
                config.insert(field.clone(), Value::String(secret.clone()));
            }
            Ok(())
        })
    }

    /// Issue tokens signed by their configured issuers.
    pub fn tokens(&self) -> Result<(), GeneratorError> {
        self.each_configuration(|dependency, config, path| {
            for (field, identifier) in &dependency.tokens {
                let factory = self.issuer(identifier)?;
                let identity = identity(config, path);
                info!(
                    service = %identifier.service,
                    field = %field,
                    path = %path.display(),
                    "Generating token"
                );
                let token = factory.issue(identity.node)?;
                let value = Value::try_from(&token).map_err(|e| GeneratorError::Parse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
                config.insert(field.clone(), value);
            }
            Ok(())
        })
    }

    fn issuer(&self, identifier: &TokenIdentifier) -> Result<TokenFactory, GeneratorError> {
        let path = self
            .configurations()?
            .into_iter()
            .find(|path| matches_key(path, &identifier.service))
            .ok_or_else(|| GeneratorError::IssuerNotFound(identifier.service.clone()))?;
        let issuer = read_table(&path)?;
        let encoded = issuer
            .get(&identifier.secret)
            .and_then(Value::as_str)
            .ok_or_else(|| GeneratorError::SecretNotFound {
                service: identifier.service.clone(),
                secret: identifier.secret.clone(),
            })?;
        let secret = SecretFactory::decode(encoded)?;
        Ok(TokenFactory::new(&secret, &self.security)?)
    }

    /// Run `process` for every (file, dependency) pair whose key matches the
    /// file path, writing each file back once.
    fn each_configuration<F>(&self, mut process: F) -> Result<(), GeneratorError>
    where
        F: FnMut(&AuthenticationDependency, &mut Table, &Path) -> Result<(), GeneratorError>,
    {
        for path in self.configurations()? {
            let matching: Vec<_> = self
                .dependencies
                .iter()
                .filter(|(key, _)| matches_key(&path, key))
                .map(|(_, dependency)| dependency)
                .collect();
            if matching.is_empty() {
                continue;
            }

            let mut config = read_table(&path)?;
            for dependency in matching {
                process(dependency, &mut config, &path)?;
            }
            write_table(&path, &config)?;
        }
        Ok(())
    }

    /// Every configuration file under the directory, sorted.
    fn configurations(&self) -> Result<Vec<PathBuf>, GeneratorError> {
        let mut found = Vec::new();
        collect(&self.directory, &mut found)?;
        found.sort();
        Ok(found)
    }
}

fn collect(directory: &Path, found: &mut Vec<PathBuf>) -> Result<(), GeneratorError> {
    let io = |source| GeneratorError::Io {
        path: directory.to_path_buf(),
        source,
    };
    for entry in std::fs::read_dir(directory).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_dir() {
            collect(&path, found)?;
        } else if path.to_string_lossy().ends_with(CONFIG_EXTENSION) {
            found.push(path);
        }
    }
    Ok(())
}

fn matches_key(path: &Path, key: &str) -> bool {
    path.to_string_lossy()
        .ends_with(&format!("{key}{CONFIG_EXTENSION}"))
}

/// The service identity in `config`, created from the file name if absent.
fn identity(config: &mut Table, path: &Path) -> RemoteIdentity {
    let configured = config
        .get(ID_IDENTITY)
        .cloned()
        .and_then(|value| value.try_into::<RemoteIdentity>().ok());
    if let Some(identity) = configured {
        return identity;
    }

    let node = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let identity = RemoteIdentity {
        node,
        host: "localhost".into(),
    };
    warn!(path = %path.display(), node = %identity.node, "Identity not configured, generated default");
    if let Ok(value) = Value::try_from(&identity) {
        config.insert(ID_IDENTITY.to_string(), value);
    }
    identity
}

fn read_table(path: &Path) -> Result<Table, GeneratorError> {
    let text = std::fs::read_to_string(path).map_err(|source| GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    text.parse::<Table>().map_err(|e| GeneratorError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn write_table(path: &Path, table: &Table) -> Result<(), GeneratorError> {
    let text = toml::to_string_pretty(table).map_err(|e| GeneratorError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    std::fs::write(path, text).map_err(|source| GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

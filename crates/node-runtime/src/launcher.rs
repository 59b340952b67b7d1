//! # Launcher
//!
//! Brings up the bus and context, then deploys one block of nodes in
//! declared order.
//!
//! ```text
//!  identifier ──> remotes[identifier] | blocks[identifier] | blocks["default"]
//!                                   │
//!                                   ▼
//!         [n1] ──ok──> [n2] ──ok──> [n3] ──ok──> publish_startup
//!           │            │            │
//!           └─── err ────┴─── err ────┴──> LaunchError::Deployment { node }
//! ```
//!
//! Shutdown undeploys in reverse order, publishes shutdown to the context
//! listeners, and polls until that work finishes or the configured timeout
//! elapses.

use crate::config::{ConfigError, Configuration};
use crate::context::CoreContext;
use crate::deployment::Deployment;
use crate::errors::NodeError;
use crate::registry::NodeRegistry;
use parking_lot::Mutex;
use shared_bus::{BusError, MessageBus};
use shared_crypto::{CryptoError, SecretFactory, TokenFactory};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Fatal launcher errors.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Neither the identifier nor the default block resolves.
    #[error("No block or remote named '{0}' and no default block")]
    BlockNotFound(String),

    /// A block names a node missing from the registry.
    #[error("Node '{0}' is not registered")]
    UnknownNode(String),

    /// A node failed to deploy.
    #[error("Failed to deploy node '{node}': {source}")]
    Deployment {
        node: String,
        #[source]
        source: NodeError,
    },

    /// The local node is not a cluster member.
    #[error("Failed to join cluster: {0}")]
    Cluster(#[from] BusError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Secret or keystore could not be loaded.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Cleanup did not finish in time.
    #[error("Shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}

/// Deploys blocks of nodes and tears them down again.
pub struct Launcher {
    context: CoreContext,
    registry: NodeRegistry,
    deployments: Mutex<Vec<Deployment>>,
}

impl Launcher {
    /// Validate `config`, create the bus, token factory and context.
    ///
    /// An empty `system.secret` is replaced by a freshly generated one for
    /// this process only.
    ///
    /// # Errors
    ///
    /// Invalid configuration, undecodable secret, keystore load failure, or a
    /// failed cluster join.
    pub fn new(config: Configuration, registry: NodeRegistry) -> Result<Self, LaunchError> {
        config.validate()?;

        let secret = if config.system.secret.is_empty() {
            warn!("[Launcher] No secret configured, generating one for this process");
            SecretFactory::generate(config.security.secret_bytes)
        } else {
            config.system.secret.clone()
        };
        let secret = SecretFactory::decode(&secret)?;
        let keystores = config.security.load_keystores()?;
        info!(keystores = keystores.len(), "[Launcher] Keystores loaded");

        let tokens = TokenFactory::new(&secret, &config.security)?.with_keystores(Arc::new(keystores));
        let bus = connect(&config)?;
        let context = CoreContext::new(bus, Arc::new(config), Arc::new(tokens));
        Ok(Self::with_context(context, registry))
    }

    /// Use an existing context.
    pub fn with_context(context: CoreContext, registry: NodeRegistry) -> Self {
        Self {
            context,
            registry,
            deployments: Mutex::new(Vec::new()),
        }
    }

    /// The launcher's context.
    pub fn context(&self) -> &CoreContext {
        &self.context
    }

    /// Deploy the block resolved from `identifier`, one node at a time.
    ///
    /// Stops at the first failing node; nodes after it are never deployed.
    /// Returns the deployed node identifiers.
    pub async fn start(&self, identifier: Option<&str>) -> Result<Vec<String>, LaunchError> {
        let config = Arc::clone(self.context.config());
        let (block, nodes) = config.launcher.block(identifier).ok_or_else(|| {
            LaunchError::BlockNotFound(identifier.unwrap_or(crate::config::DEFAULT_BLOCK).to_string())
        })?;
        info!(
            application = %config.launcher.application,
            block = %block,
            nodes = nodes.len(),
            "[Launcher] Deploying block"
        );

        let instances = config.system.handler_instances;
        let mut deployed = Vec::with_capacity(nodes.len());
        for node in nodes {
            let factory = self
                .registry
                .get(node)
                .ok_or_else(|| LaunchError::UnknownNode(node.clone()))?;
            let deployment = Deployment::deploy(&self.context, node, &factory, instances)
                .await
                .map_err(|source| LaunchError::Deployment {
                    node: node.clone(),
                    source,
                })?;
            self.deployments.lock().push(deployment);
            deployed.push(node.clone());
        }

        self.context.publish_startup();
        info!(block = %block, "[Launcher] Block deployed");
        Ok(deployed)
    }

    /// Identifiers of the currently deployed nodes, in deployment order.
    pub fn deployed(&self) -> Vec<String> {
        self.deployments
            .lock()
            .iter()
            .map(|deployment| deployment.node().to_string())
            .collect()
    }

    /// Undeploy everything and run shutdown listeners, bounded by
    /// `system.shutdown_timeout_ms`.
    ///
    /// # Errors
    ///
    /// `LaunchError::ShutdownTimeout` when cleanup is still running at the
    /// deadline; the remaining work is abandoned.
    pub async fn shutdown(&self) -> Result<(), LaunchError> {
        let system = &self.context.config().system;
        let timeout = system.shutdown_timeout();
        let deployments = std::mem::take(&mut *self.deployments.lock());
        info!(deployments = deployments.len(), "[Launcher] Shutting down");

        let context = self.context.clone();
        let cleanup = tokio::spawn(async move {
            for deployment in deployments.into_iter().rev() {
                deployment.undeploy().await;
            }
            context.publish_shutdown().await;
        });

        let deadline = Instant::now() + timeout;
        let mut poll = tokio::time::interval(system.shutdown_poll());
        loop {
            poll.tick().await;
            if cleanup.is_finished() {
                info!("[Launcher] Shutdown complete");
                return Ok(());
            }
            if Instant::now() >= deadline {
                cleanup.abort();
                error!(timeout = ?timeout, "[Launcher] Shutdown timed out");
                return Err(LaunchError::ShutdownTimeout(timeout));
            }
        }
    }
}

fn connect(config: &Configuration) -> Result<MessageBus, LaunchError> {
    let system = &config.system;
    if !config.launcher.clustered {
        return Ok(MessageBus::new(system.node_id.clone()));
    }

    let bus = MessageBus::clustered(
        system.node_id.clone(),
        system.host.clone(),
        system.cluster_secret.as_bytes(),
    )?;
    let members = bus.members()?;
    info!(members = members.len(), host = %system.host, "[Launcher] Joined cluster");
    Ok(bus)
}

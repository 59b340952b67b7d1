//! # Node Registry
//!
//! Tagged table of node identifier to factory. Block entries in the
//! launcher configuration name nodes by these identifiers.
//!
//! ```rust,ignore
//! let mut registry = NodeRegistry::new();
//! registry.register("ping", |_ctx| Ok(Arc::new(PingNode::new()) as Arc<dyn CoreHandler>));
//! ```

use crate::context::CoreContext;
use crate::errors::NodeError;
use crate::handler::CoreHandler;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds one handler instance.
pub type NodeFactory =
    Arc<dyn Fn(&CoreContext) -> Result<Arc<dyn CoreHandler>, NodeError> + Send + Sync>;

/// Lifecycle state of a deployed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Instances constructed.
    Created,
    /// `init` completed on every instance; none started yet.
    Initialized,
    /// Consuming requests.
    Started,
    /// Undeployed.
    Stopped,
    /// Deployment failed.
    Failed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Initialized => "Initialized",
            Self::Started => "Started",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Known node factories.
#[derive(Default, Clone)]
pub struct NodeRegistry {
    factories: BTreeMap<String, NodeFactory>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `identifier`, replacing any previous entry.
    pub fn register<F>(&mut self, identifier: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&CoreContext) -> Result<Arc<dyn CoreHandler>, NodeError> + Send + Sync + 'static,
    {
        let identifier = identifier.into();
        debug!(node = %identifier, "[Registry] Node registered");
        self.factories.insert(identifier, Arc::new(factory));
        self
    }

    /// Factory for `identifier`.
    pub fn get(&self, identifier: &str) -> Option<NodeFactory> {
        self.factories.get(identifier).cloned()
    }

    /// True when `identifier` is registered.
    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Registered identifiers, sorted.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

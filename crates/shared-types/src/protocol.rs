//! # Protocol Router
//!
//! Maps an action name to a handler and the minimum access level required
//! to invoke it.
//!
//! ```rust,ignore
//! let mut protocol = Protocol::new();
//! protocol
//!     .use_route("ping", ping, Access::Public)
//!     .use_route("clear", clear, Access::Admin)
//!     .route("put", put); // Access::Authorized
//!
//! let handler = protocol.get(caller_access, &request.action)?;
//! ```
//!
//! The table is built once when a handler instance is constructed and only
//! read afterwards, so lookups take `&self` and need no locking.

use crate::access::Access;
use crate::errors::ProtocolError;
use std::collections::HashMap;
use tracing::debug;

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route<H> {
    /// Minimum access level.
    pub access: Access,
    /// The handler value.
    pub handler: H,
}

/// Action routing table.
#[derive(Debug, Clone)]
pub struct Protocol<H> {
    routes: HashMap<String, Route<H>>,
}

impl<H: Clone> Protocol<H> {
    /// Create an empty routing table.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register `handler` for `action` at `access`.
    ///
    /// Registering an existing action replaces the previous route.
    pub fn use_route(&mut self, action: impl Into<String>, handler: H, access: Access) -> &mut Self {
        let action = action.into();
        if self.routes.contains_key(&action) {
            debug!(action = %action, "Replacing existing route");
        }
        self.routes.insert(action, Route { access, handler });
        self
    }

    /// Register `handler` for `action` at [`Access::Authorized`].
    pub fn route(&mut self, action: impl Into<String>, handler: H) -> &mut Self {
        self.use_route(action, handler, Access::Authorized)
    }

    /// Resolve the handler for `action` given the caller's `access`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::RouteNotFound` - no route for the action
    /// - `ProtocolError::AuthorizationRequired` - caller access is below the route minimum
    pub fn get(&self, access: Access, action: &str) -> Result<H, ProtocolError> {
        let route = self
            .routes
            .get(action)
            .ok_or_else(|| ProtocolError::RouteNotFound {
                action: action.to_string(),
            })?;

        if access.satisfies(route.access) {
            Ok(route.handler.clone())
        } else {
            Err(ProtocolError::AuthorizationRequired {
                action: action.to_string(),
                required: route.access,
                provided: access,
            })
        }
    }

    /// Minimum access for `action`, if registered.
    pub fn access(&self, action: &str) -> Option<Access> {
        self.routes.get(action).map(|route| route.access)
    }

    /// True when `action` is registered.
    pub fn contains(&self, action: &str) -> bool {
        self.routes.contains_key(action)
    }

    /// Registered action names.
    pub fn actions(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no route is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<H: Clone> Default for Protocol<H> {
    fn default() -> Self {
        Self::new()
    }
}

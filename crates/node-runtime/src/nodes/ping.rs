//! Liveness node.

use crate::errors::NodeError;
use crate::handler::{dispatch, route, CoreHandler, RouteFn};
use crate::request::Request;
use async_trait::async_trait;
use shared_types::{Access, Payload, Protocol};

/// Bus address and registry identifier.
pub const ADDRESS: &str = "ping";

/// Answers `ping` for any caller, echoing the caller's sender id and access.
pub struct PingNode {
    protocol: Protocol<RouteFn>,
}

impl PingNode {
    pub fn new() -> Self {
        let mut protocol = Protocol::new();
        protocol.use_route(
            "ping",
            route(|request: Request| async move {
                let mut payload = Payload::new();
                payload.insert("sender".into(), request.sender().into());
                payload.insert("access".into(), request.access().to_string().into());
                request.write(payload);
                Ok(())
            }),
            Access::Public,
        );
        Self { protocol }
    }
}

impl Default for PingNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoreHandler for PingNode {
    fn address(&self) -> &str {
        ADDRESS
    }

    async fn handle(&self, request: Request) -> Result<(), NodeError> {
        dispatch(&self.protocol, request).await
    }
}

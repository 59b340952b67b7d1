//! # Core Handler
//!
//! A node is a [`CoreHandler`]: one bus address, a lifecycle, and a
//! `handle` entry point. Most handlers route by action through a
//! [`Protocol`] of [`RouteFn`] closures:
//!
//! ```rust,ignore
//! let mut protocol = Protocol::new();
//! protocol.use_route("ping", route(|request| async move {
//!     request.accept();
//!     Ok(())
//! }), Access::Public);
//!
//! // in handle():
//! dispatch(&self.protocol, request).await
//! ```
//!
//! Errors returned from `handle` are turned into the reply by [`process`];
//! handlers only reply themselves on success.

use crate::context::CoreContext;
use crate::errors::NodeError;
use crate::request::Request;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use shared_types::Protocol;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Deployable request handler.
#[async_trait]
pub trait CoreHandler: Send + Sync + 'static {
    /// Bus address this handler consumes.
    fn address(&self) -> &str;

    /// True when the handler can only run on a clustered bus.
    fn requires_cluster(&self) -> bool {
        false
    }

    /// Synchronous setup, called once per instance before `start`.
    fn init(&self, _context: &CoreContext) -> Result<(), NodeError> {
        Ok(())
    }

    /// Async startup, called after `init` and before the first request.
    async fn start(&self) -> Result<(), NodeError> {
        Ok(())
    }

    /// Called once when the instance is undeployed.
    async fn stop(&self) {}

    /// Handle one request.
    ///
    /// On `Ok` the handler must have replied. On `Err` the error becomes
    /// the reply.
    async fn handle(&self, request: Request) -> Result<(), NodeError>;
}

/// Routed action handler.
pub type RouteFn = Arc<dyn Fn(Request) -> BoxFuture<'static, Result<(), NodeError>> + Send + Sync>;

/// Box an async closure into a [`RouteFn`].
pub fn route<F, Fut>(f: F) -> RouteFn
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), NodeError>> + Send + 'static,
{
    Arc::new(move |request| f(request).boxed())
}

/// Resolve the request's action against `protocol` and run the route.
///
/// # Errors
///
/// Routing errors from [`Protocol::get`] and whatever the route returns.
pub async fn dispatch(protocol: &Protocol<RouteFn>, request: Request) -> Result<(), NodeError> {
    let handler = protocol.get(request.access(), request.action())?;
    handler(request).await
}

/// Run `handler` for `request`, replying with the error status on failure.
pub async fn process(handler: &dyn CoreHandler, request: Request) {
    let Err(error) = handler.handle(request.clone()).await else {
        return;
    };

    if error.is_handler_missing() {
        warn!(
            address = %handler.address(),
            action = %request.action(),
            "Handler missing for action"
        );
    } else {
        debug!(
            address = %handler.address(),
            action = %request.action(),
            error = %error,
            "Request failed"
        );
    }
    request.error(&error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::tests::request;
    use shared_types::{Access, InboundMessage, ResponseStatus};

    struct Echo {
        protocol: Protocol<RouteFn>,
    }

    impl Echo {
        fn new() -> Self {
            let mut protocol = Protocol::new();
            protocol
                .use_route(
                    "ping",
                    route(|request: Request| async move {
                        request.accept();
                        Ok(())
                    }),
                    Access::Public,
                )
                .route(
                    "fail",
                    route(|_request: Request| async move {
                        Err(NodeError::Handler("boom".into()))
                    }),
                );
            Self { protocol }
        }
    }

    #[async_trait]
    impl CoreHandler for Echo {
        fn address(&self) -> &str {
            "echo"
        }

        async fn handle(&self, request: Request) -> Result<(), NodeError> {
            dispatch(&self.protocol, request).await
        }
    }

    #[tokio::test]
    async fn test_public_route() {
        let (request, rx) = request(InboundMessage::new("ping"), Access::Public);
        process(&Echo::new(), request).await;
        assert!(rx.await.unwrap().is(ResponseStatus::Accepted));
    }

    #[tokio::test]
    async fn test_authorized_route_rejects_public() {
        let (request, rx) = request(InboundMessage::new("fail"), Access::Public);
        process(&Echo::new(), request).await;
        assert!(rx.await.unwrap().is(ResponseStatus::Unauthorized));
    }

    #[tokio::test]
    async fn test_unknown_action_missing() {
        let (request, rx) = request(InboundMessage::new("B"), Access::Admin);
        process(&Echo::new(), request).await;
        assert!(rx.await.unwrap().is(ResponseStatus::Missing));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_reply() {
        let (request, rx) = request(InboundMessage::new("fail"), Access::Authorized);
        process(&Echo::new(), request).await;

        let reply = rx.await.unwrap();
        assert!(reply.is(ResponseStatus::Error));
        assert_eq!(reply.message.as_deref(), Some("boom"));
    }
}

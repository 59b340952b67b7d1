//! # Launcher Flows
//!
//! A launcher with the built-in block plus test nodes, driven through the
//! bus the way a remote caller would.
//!
//! ```text
//! caller ──request──> MessageBus ──rr──> worker ──authorize──> node ──reply──> caller
//! ```

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use node_runtime::handler::{dispatch, route, CoreHandler, RouteFn};
    use node_runtime::{
        nodes, Configuration, CoreContext, LaunchError, Launcher, NodeError, NodeRegistry, Request,
    };
    use serde_json::json;
    use shared_bus::BusError;
    use shared_types::{Access, InboundMessage, Payload, Protocol, ResponseStatus, Token};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    // =========================================================================
    // FIXTURES
    // =========================================================================

    fn config() -> Configuration {
        let mut config = Configuration::default();
        config.system.handler_instances = 4;
        config.system.shutdown_timeout_ms = 1_000;
        config.system.shutdown_poll_ms = 10;
        config
    }

    /// Replies with the caller's token domain after a short delay.
    struct EchoNode {
        protocol: Protocol<RouteFn>,
    }

    impl EchoNode {
        fn new() -> Self {
            let mut protocol = Protocol::new();
            protocol
                .route(
                    "echo",
                    route(|request: Request| async move {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        let domain = request.token().map(|t| t.domain.clone()).unwrap_or_default();
                        let mut payload = Payload::new();
                        payload.insert("domain".into(), domain.into());
                        request.write(payload);
                        Ok(())
                    }),
                )
                .use_route(
                    "silent",
                    route(|_request: Request| async move { Ok(()) }),
                    Access::Public,
                )
                .use_route(
                    "slow",
                    route(|request: Request| async move {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        request.accept();
                        Ok(())
                    }),
                    Access::Public,
                );
            Self { protocol }
        }
    }

    #[async_trait]
    impl CoreHandler for EchoNode {
        fn address(&self) -> &str {
            "echo"
        }

        async fn handle(&self, request: Request) -> Result<(), NodeError> {
            dispatch(&self.protocol, request).await
        }
    }

    /// Fails in `start`.
    struct BrokenNode;

    #[async_trait]
    impl CoreHandler for BrokenNode {
        fn address(&self) -> &str {
            "broken"
        }

        async fn start(&self) -> Result<(), NodeError> {
            Err(NodeError::Handler("storage backend unreachable".into()))
        }

        async fn handle(&self, request: Request) -> Result<(), NodeError> {
            request.accept();
            Ok(())
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = nodes::builtin();
        registry.register("echo", |_ctx: &CoreContext| {
            Ok(Arc::new(EchoNode::new()) as Arc<dyn CoreHandler>)
        });
        registry
    }

    async fn started(block: Option<&str>, config: Configuration) -> Launcher {
        let launcher = Launcher::new(config, registry()).unwrap();
        launcher.start(block).await.unwrap();
        launcher
    }

    fn put(key: &str, value: serde_json::Value) -> InboundMessage {
        InboundMessage::new("put")
            .with_field("key", key)
            .with_field("value", value)
    }

    // =========================================================================
    // STORAGE THROUGH THE BUS
    // =========================================================================

    #[tokio::test]
    async fn test_storage_put_get_conflict() {
        let launcher = started(None, config()).await;
        let ctx = launcher.context().clone();
        let token = ctx.tokens().issue("storage").unwrap();

        let reply = ctx
            .request("storage", put("greeting", json!("hello")).with_token(token.clone()))
            .await
            .unwrap();
        assert!(reply.is(ResponseStatus::Accepted));

        let reply = ctx
            .request("storage", InboundMessage::new("get").with_field("key", "greeting"))
            .await
            .unwrap();
        assert_eq!(reply.get("value"), Some(&json!("hello")));

        let reply = ctx
            .request("storage", put("greeting", json!("again")).with_token(token))
            .await
            .unwrap();
        assert!(reply.is(ResponseStatus::Conflict));

        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_storage_is_shared_between_instances() {
        let launcher = started(None, config()).await;
        let ctx = launcher.context().clone();
        let token = ctx.tokens().issue("storage").unwrap();

        for i in 0..8 {
            let reply = ctx
                .request("storage", put(&format!("k{i}"), json!(i)).with_token(token.clone()))
                .await
                .unwrap();
            assert!(reply.is(ResponseStatus::Accepted));
        }

        let reply = ctx.request("storage", InboundMessage::new("size")).await.unwrap();
        assert_eq!(reply.get("size"), Some(&json!(8)));

        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_public_route_accepts_invalid_token() {
        let launcher = started(None, config()).await;
        let ctx = launcher.context().clone();
        let mut forged = Token::new("auth", u64::MAX).with_property("type", "HmacSHA512");
        forged.key = "bm90IGEgbWFj".into();

        let reply = ctx
            .request("ping", InboundMessage::new("ping").with_token(forged.clone()))
            .await
            .unwrap();
        assert!(reply.is(ResponseStatus::Accepted));
        assert_eq!(reply.get("access"), Some(&json!("PUBLIC")));

        let reply = ctx
            .request("storage", put("a", json!(1)).with_token(forged))
            .await
            .unwrap();
        assert!(reply.is(ResponseStatus::Unauthorized));

        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_action_is_missing() {
        let launcher = started(None, config()).await;
        let reply = launcher
            .context()
            .request("ping", InboundMessage::new("pong"))
            .await
            .unwrap();

        assert!(reply.is(ResponseStatus::Missing));
        assert!(reply.message.unwrap().contains("pong"));
        launcher.shutdown().await.unwrap();
    }

    // =========================================================================
    // CONCURRENCY AND REPLIES
    // =========================================================================

    #[tokio::test]
    async fn test_concurrent_requests_get_their_own_reply() {
        let mut config = config();
        config.launcher.blocks.insert("echo".into(), vec!["echo".into()]);
        let launcher = started(Some("echo"), config).await;
        let ctx = launcher.context().clone();

        let mut calls = Vec::new();
        for domain in ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"] {
            let ctx = ctx.clone();
            let token = ctx.tokens().issue(domain).unwrap();
            calls.push(tokio::spawn(async move {
                let reply = ctx
                    .request("echo", InboundMessage::new("echo").with_token(token))
                    .await
                    .unwrap();
                (domain, reply)
            }));
        }

        for call in calls {
            let (domain, reply) = call.await.unwrap();
            assert!(reply.is(ResponseStatus::Accepted));
            assert_eq!(reply.get("domain"), Some(&json!(domain)));
        }
        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_unanswered_and_slow_requests() {
        let mut config = config();
        config.launcher.blocks.insert("echo".into(), vec!["echo".into()]);
        let launcher = started(Some("echo"), config).await;
        let bus = launcher.context().bus().clone();

        let result = bus
            .request("echo", InboundMessage::new("silent"), "test", Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(BusError::NoReply { .. })));

        let result = bus
            .request("echo", InboundMessage::new("slow"), "test", Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(BusError::Timeout { .. })));

        launcher.shutdown().await.unwrap();
    }

    // =========================================================================
    // DEPLOYMENT ORDER
    // =========================================================================

    #[tokio::test]
    async fn test_failing_node_aborts_remaining_block() {
        let after_built = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&after_built);

        let mut registry = registry();
        registry
            .register("broken", |_ctx: &CoreContext| {
                Ok(Arc::new(BrokenNode) as Arc<dyn CoreHandler>)
            })
            .register("after", move |_ctx: &CoreContext| {
                flag.store(true, Ordering::SeqCst);
                Ok(Arc::new(EchoNode::new()) as Arc<dyn CoreHandler>)
            });

        let mut config = config();
        config.launcher.blocks.insert(
            "ordered".into(),
            vec!["ping".into(), "broken".into(), "after".into()],
        );

        let launcher = Launcher::new(config, registry).unwrap();
        let error = launcher.start(Some("ordered")).await.unwrap_err();

        match &error {
            LaunchError::Deployment { node, source } => {
                assert_eq!(node, "broken");
                assert!(source.to_string().contains("unreachable"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!after_built.load(Ordering::SeqCst));
        assert_eq!(launcher.deployed(), vec!["ping"]);
        assert_eq!(launcher.context().bus().handlers("broken"), 0);

        launcher.shutdown().await.unwrap();
        assert_eq!(launcher.context().bus().handlers("ping"), 0);
    }

    #[tokio::test]
    async fn test_remote_resolves_to_block() {
        let mut config = config();
        config.launcher.blocks.insert("edge".into(), vec!["ping".into()]);
        config.launcher.remotes.insert("edge.local".into(), "edge".into());

        let launcher = started(Some("edge.local"), config).await;
        assert_eq!(launcher.deployed(), vec!["ping"]);
        launcher.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_runs_context_listeners() {
        let launcher = started(None, config()).await;
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        launcher.context().on_shutdown(move || async move {
            flag.store(true, Ordering::SeqCst);
        });

        launcher.shutdown().await.unwrap();
        assert!(stopped.load(Ordering::SeqCst));
        assert!(launcher.context().is_shutting_down());
    }
}

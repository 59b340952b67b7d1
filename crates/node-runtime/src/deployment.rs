//! # Deployment
//!
//! One node deployed with N instances on the same bus address:
//!
//! ```text
//!            ┌──────────── Deployment("storage") ────────────┐
//! bus ──rr──>│ Consumer ─> worker ─> authorize ─> handle     │  instance 0
//!      ──rr──>│ Consumer ─> worker ─> authorize ─> handle     │  instance 1
//!            │                      ...                      │
//!            └───────────── watch<bool> shutdown ────────────┘
//! ```
//!
//! Each worker finishes the request it holds before it looks at the next
//! delivery or the shutdown signal.

use crate::context::CoreContext;
use crate::errors::NodeError;
use crate::handler::{process, CoreHandler};
use crate::registry::{NodeFactory, NodeState};
use crate::request::Request;
use shared_bus::Consumer;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

struct Instance {
    handler: Arc<dyn CoreHandler>,
    worker: JoinHandle<()>,
}

/// A deployed node.
pub struct Deployment {
    id: Uuid,
    node: String,
    address: String,
    state: NodeState,
    instances: Vec<Instance>,
    shutdown: watch::Sender<bool>,
}

impl Deployment {
    /// Build and initialize `instances` handlers from `factory`, then start
    /// each and attach it to the bus.
    ///
    /// On failure every instance started so far is stopped again.
    ///
    /// # Errors
    ///
    /// - `NodeError::ClusterRequired` - the node needs a clustered bus
    /// - any error returned by the factory, `init` or `start`
    pub async fn deploy(
        context: &CoreContext,
        node: &str,
        factory: &NodeFactory,
        instances: usize,
    ) -> Result<Self, NodeError> {
        let (shutdown, _) = watch::channel(false);
        let mut deployment = Self {
            id: Uuid::new_v4(),
            node: node.to_string(),
            address: String::new(),
            state: NodeState::Created,
            instances: Vec::with_capacity(instances),
            shutdown,
        };

        let handlers = match deployment.initialize(context, factory, instances.max(1)) {
            Ok(handlers) => handlers,
            Err(e) => {
                warn!(node = %node, error = %e, "[Deployment] Initialization failed");
                deployment.state = NodeState::Failed;
                return Err(e);
            }
        };
        deployment.state = NodeState::Initialized;

        for (index, handler) in handlers.into_iter().enumerate() {
            if let Err(e) = handler.start().await {
                warn!(node = %node, instance = index, error = %e, "[Deployment] Instance failed");
                deployment.state = NodeState::Failed;
                deployment.stop_instances().await;
                return Err(e);
            }
            deployment.attach(context, handler, index);
        }

        deployment.state = NodeState::Started;
        info!(
            node = %node,
            address = %deployment.address,
            instances = deployment.instances.len(),
            id = %deployment.id,
            "[Deployment] Node deployed"
        );
        Ok(deployment)
    }

    fn initialize(
        &mut self,
        context: &CoreContext,
        factory: &NodeFactory,
        instances: usize,
    ) -> Result<Vec<Arc<dyn CoreHandler>>, NodeError> {
        let mut handlers = Vec::with_capacity(instances);
        for _ in 0..instances {
            let handler = factory(context)?;
            if handler.requires_cluster() && !context.bus().is_clustered() {
                return Err(NodeError::ClusterRequired(self.node.clone()));
            }
            handler.init(context)?;
            if self.address.is_empty() {
                self.address = handler.address().to_string();
            }
            handlers.push(handler);
        }
        Ok(handlers)
    }

    fn attach(&mut self, context: &CoreContext, handler: Arc<dyn CoreHandler>, index: usize) {
        let consumer = context.bus().consumer(handler.address());
        let worker = tokio::spawn(worker(
            context.clone(),
            Arc::clone(&handler),
            consumer,
            self.shutdown.subscribe(),
            index,
        ));
        self.instances.push(Instance { handler, worker });
    }

    /// Stop consuming, wait for in-flight requests, then call `stop` on
    /// every instance.
    pub async fn undeploy(mut self) {
        self.stop_instances().await;
        self.state = NodeState::Stopped;
        info!(node = %self.node, id = %self.id, "[Deployment] Node undeployed");
    }

    async fn stop_instances(&mut self) {
        self.shutdown.send_replace(true);
        for instance in self.instances.drain(..) {
            if let Err(e) = instance.worker.await {
                warn!(node = %self.node, error = %e, "[Deployment] Worker ended abnormally");
            }
            instance.handler.stop().await;
        }
    }

    /// Deployment id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Node identifier.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Bus address consumed by the instances.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Number of running instances.
    pub fn instances(&self) -> usize {
        self.instances.len()
    }
}

impl std::fmt::Debug for Deployment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployment")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("address", &self.address)
            .field("state", &self.state)
            .field("instances", &self.instances.len())
            .finish()
    }
}

#[instrument(name = "worker", skip_all, fields(address = %consumer.address(), instance = index))]
async fn worker(
    context: CoreContext,
    handler: Arc<dyn CoreHandler>,
    mut consumer: Consumer,
    mut shutdown: watch::Receiver<bool>,
    index: usize,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            delivery = consumer.recv() => {
                let Some(delivery) = delivery else { break };
                let access = context.authorize(delivery.message.token.as_ref()).await;
                let request = Request::from_delivery(delivery, access);
                process(handler.as_ref(), request).await;
            }
            _ = shutdown.changed() => break,
        }
    }
    debug!("Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::context;
    use crate::handler::{dispatch, route, RouteFn};
    use async_trait::async_trait;
    use shared_bus::BusError;
    use shared_types::{Access, InboundMessage, Protocol, ResponseStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counter {
        started: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
        clustered: bool,
        protocol: Protocol<RouteFn>,
    }

    #[async_trait]
    impl CoreHandler for Counter {
        fn address(&self) -> &str {
            "counter"
        }

        fn requires_cluster(&self) -> bool {
            self.clustered
        }

        async fn start(&self) -> Result<(), NodeError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        async fn handle(&self, request: Request) -> Result<(), NodeError> {
            dispatch(&self.protocol, request).await
        }
    }

    fn factory(
        started: &Arc<AtomicUsize>,
        stopped: &Arc<AtomicUsize>,
        clustered: bool,
    ) -> NodeFactory {
        let started = Arc::clone(started);
        let stopped = Arc::clone(stopped);
        Arc::new(move |_ctx: &CoreContext| -> Result<Arc<dyn CoreHandler>, NodeError> {
            let mut protocol = Protocol::new();
            protocol.use_route(
                "whoami",
                route(|request: Request| async move {
                    let mut payload = shared_types::Payload::new();
                    payload.insert("access".into(), request.access().to_string().into());
                    request.write(payload);
                    Ok(())
                }),
                Access::Public,
            );
            Ok(Arc::new(Counter {
                started: Arc::clone(&started),
                stopped: Arc::clone(&stopped),
                clustered,
                protocol,
            }) as Arc<dyn CoreHandler>)
        })
    }

    #[tokio::test]
    async fn test_deploy_instances_and_undeploy() {
        let ctx = context();
        let started = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));

        let deployment = Deployment::deploy(&ctx, "counter", &factory(&started, &stopped, false), 3)
            .await
            .unwrap();
        assert_eq!(deployment.state(), NodeState::Started);
        assert_eq!(deployment.instances(), 3);
        assert_eq!(deployment.address(), "counter");
        assert_eq!(ctx.bus().handlers("counter"), 3);
        assert_eq!(started.load(Ordering::SeqCst), 3);

        deployment.undeploy().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
        assert_eq!(ctx.bus().handlers("counter"), 0);
    }

    #[tokio::test]
    async fn test_worker_authorizes_token() {
        let ctx = context();
        let counters = Arc::new(AtomicUsize::new(0));
        let deployment = Deployment::deploy(&ctx, "counter", &factory(&counters, &counters, false), 1)
            .await
            .unwrap();

        let token = ctx.tokens().issue("auth").unwrap();
        let reply = ctx
            .request("counter", InboundMessage::new("whoami").with_token(token))
            .await
            .unwrap();
        assert_eq!(reply.get("access").and_then(|v| v.as_str()), Some("AUTHORIZED"));

        let reply = ctx.request("counter", InboundMessage::new("whoami")).await.unwrap();
        assert_eq!(reply.get("access").and_then(|v| v.as_str()), Some("PUBLIC"));

        let reply = ctx.request("counter", InboundMessage::new("nope")).await.unwrap();
        assert!(reply.is(ResponseStatus::Missing));

        deployment.undeploy().await;
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            ctx.request("counter", InboundMessage::new("whoami")),
        )
        .await
        .unwrap();
        assert!(matches!(result, Err(NodeError::Bus(BusError::NoHandlers { .. }))));
    }

    #[tokio::test]
    async fn test_cluster_required_on_standalone_bus() {
        let ctx = context();
        let started = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));

        let result = Deployment::deploy(&ctx, "counter", &factory(&started, &stopped, true), 2).await;
        assert!(matches!(result, Err(NodeError::ClusterRequired(node)) if node == "counter"));
        assert_eq!(started.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.bus().handlers("counter"), 0);
    }

    #[tokio::test]
    async fn test_failed_construction_starts_nothing() {
        let ctx = context();
        let built = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));
        let inner = factory(&built, &stopped, false);
        let calls = Arc::new(AtomicUsize::new(0));
        let flaky: NodeFactory = Arc::new(move |ctx: &CoreContext| -> Result<Arc<dyn CoreHandler>, NodeError> {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(NodeError::Handler("second instance".into()));
            }
            inner(ctx)
        });

        let result = Deployment::deploy(&ctx, "counter", &flaky, 3).await;
        assert!(result.is_err());
        assert_eq!(built.load(Ordering::SeqCst), 0);
        assert_eq!(stopped.load(Ordering::SeqCst), 0);
        assert_eq!(ctx.bus().handlers("counter"), 0);
    }

    struct Staged {
        initialized: Arc<AtomicUsize>,
        started: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CoreHandler for Staged {
        fn address(&self) -> &str {
            "staged"
        }

        fn init(&self, _context: &CoreContext) -> Result<(), NodeError> {
            self.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn start(&self) -> Result<(), NodeError> {
            if self.started.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(NodeError::Handler("port in use".into()));
            }
            Ok(())
        }

        async fn stop(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }

        async fn handle(&self, request: Request) -> Result<(), NodeError> {
            request.accept();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_every_instance_initialized_before_start() {
        let ctx = context();
        let initialized = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));
        let (i, s, t) = (
            Arc::clone(&initialized),
            Arc::clone(&started),
            Arc::clone(&stopped),
        );
        let staged: NodeFactory = Arc::new(move |_ctx: &CoreContext| -> Result<Arc<dyn CoreHandler>, NodeError> {
            Ok(Arc::new(Staged {
                initialized: Arc::clone(&i),
                started: Arc::clone(&s),
                stopped: Arc::clone(&t),
            }) as Arc<dyn CoreHandler>)
        });

        let result = Deployment::deploy(&ctx, "staged", &staged, 3).await;
        assert!(matches!(result, Err(NodeError::Handler(_))));
        assert_eq!(initialized.load(Ordering::SeqCst), 3);
        assert_eq!(started.load(Ordering::SeqCst), 2);
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.bus().handlers("staged"), 0);
    }
}

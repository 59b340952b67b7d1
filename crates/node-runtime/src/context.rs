//! # Core Context
//!
//! The handle every node receives. It owns the process-wide pieces a handler
//! needs and nothing else:
//!
//! ```text
//! ┌───────────────────────────── CoreContext ─────────────────────────────┐
//! │  MessageBus      Configuration      TokenFactory      SharedMap(name) │
//! │                                                                       │
//! │  ContextListeners                   shutdown signal (watch)           │
//! │   ├─ startup:  FnOnce(&CoreContext) called once                       │
//! │   └─ shutdown: async, awaited in registration order                   │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cloning is cheap; clones share state. Listeners are scoped to the context
//! they were registered on, there is no global subscriber list.

use crate::config::Configuration;
use crate::errors::NodeError;
use crate::storage::SharedMap;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use shared_bus::MessageBus;
use shared_crypto::TokenFactory;
use shared_types::token::PROPERTY_ROLE;
use shared_types::{Access, InboundMessage, Reply, Token};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Role property value that grants [`Access::Admin`].
pub const ROLE_ADMIN: &str = "admin";

type StartupListener = Box<dyn FnOnce(&CoreContext) + Send>;
type ShutdownListener = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct StartupListeners {
    started: bool,
    pending: Vec<StartupListener>,
}

/// Startup and shutdown subscribers of one context.
#[derive(Default)]
pub struct ContextListeners {
    startup: Mutex<StartupListeners>,
    shutdown: Mutex<Vec<ShutdownListener>>,
}

impl ContextListeners {
    /// Number of shutdown listeners not yet run.
    pub fn shutdown_pending(&self) -> usize {
        self.shutdown.lock().len()
    }
}

struct ContextInner {
    bus: MessageBus,
    config: Arc<Configuration>,
    tokens: Arc<TokenFactory>,
    listeners: ContextListeners,
    shutdown: watch::Sender<bool>,
    maps: DashMap<String, Arc<SharedMap>>,
}

/// Shared runtime handle passed to every node.
#[derive(Clone)]
pub struct CoreContext {
    inner: Arc<ContextInner>,
}

impl CoreContext {
    /// Create a context around an existing bus and token factory.
    pub fn new(bus: MessageBus, config: Arc<Configuration>, tokens: Arc<TokenFactory>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(ContextInner {
                bus,
                config,
                tokens,
                listeners: ContextListeners::default(),
                shutdown,
                maps: DashMap::new(),
            }),
        }
    }

    /// The message bus.
    pub fn bus(&self) -> &MessageBus {
        &self.inner.bus
    }

    /// The loaded configuration.
    pub fn config(&self) -> &Arc<Configuration> {
        &self.inner.config
    }

    /// The node's token factory.
    pub fn tokens(&self) -> &Arc<TokenFactory> {
        &self.inner.tokens
    }

    /// Id of the local node.
    pub fn node_id(&self) -> &str {
        self.inner.bus.node_id()
    }

    /// Listener lists of this context.
    pub fn listeners(&self) -> &ContextListeners {
        &self.inner.listeners
    }

    /// Named in-memory map shared by every node of this context.
    pub fn storage(&self, name: &str) -> Arc<SharedMap> {
        self.inner
            .maps
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(SharedMap::new(name)))
            .clone()
    }

    /// Access level granted by `token`.
    ///
    /// A missing or invalid token grants [`Access::Public`]; a valid token
    /// grants [`Access::Authorized`], or [`Access::Admin`] when it carries
    /// `role = admin`. Verification runs on the blocking pool.
    pub async fn authorize(&self, token: Option<&Token>) -> Access {
        let Some(token) = token else {
            return Access::Public;
        };
        match self.inner.tokens.verify_async(token.clone()).await {
            Ok(()) if token.property(PROPERTY_ROLE) == Some(ROLE_ADMIN) => Access::Admin,
            Ok(()) => Access::Authorized,
            Err(_) => Access::Public,
        }
    }

    /// Send `message` to `address` as this node, with the default timeout.
    pub async fn request(&self, address: &str, message: InboundMessage) -> Result<Reply, NodeError> {
        let timeout = self.inner.config.system.request_timeout();
        let reply = self
            .inner
            .bus
            .request(address, message, self.node_id(), timeout)
            .await?;
        Ok(reply)
    }

    /// Run `f` on the blocking pool.
    ///
    /// # Errors
    ///
    /// `NodeError::Worker` when the task panics or is cancelled.
    pub async fn blocking<F, T>(&self, f: F) -> Result<T, NodeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| NodeError::Worker(e.to_string()))
    }

    /// Wait for `delay`.
    ///
    /// Returns `false` when shutdown started before the delay elapsed.
    pub async fn timer(&self, delay: Duration) -> bool {
        let mut shutdown = self.shutdown_signal();
        if *shutdown.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = shutdown.changed() => false,
        }
    }

    /// Call `f` every `interval` until shutdown. The first call happens one
    /// interval after scheduling.
    pub fn periodic<F, Fut>(&self, interval: Duration, mut f: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown = self.shutdown_signal();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => f().await,
                    _ = shutdown.changed() => break,
                }
            }
        })
    }

    /// Call `listener` once the context has started, immediately if it
    /// already has.
    pub fn on_startup<F>(&self, listener: F)
    where
        F: FnOnce(&CoreContext) + Send + 'static,
    {
        {
            let mut startup = self.inner.listeners.startup.lock();
            if !startup.started {
                startup.pending.push(Box::new(listener));
                return;
            }
        }
        listener(self);
    }

    /// Await `listener` during shutdown.
    pub fn on_shutdown<F, Fut>(&self, listener: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner
            .listeners
            .shutdown
            .lock()
            .push(Box::new(move || listener().boxed()));
    }

    /// Mark the context started and run pending startup listeners.
    pub fn publish_startup(&self) {
        let pending = {
            let mut startup = self.inner.listeners.startup.lock();
            if startup.started {
                return;
            }
            startup.started = true;
            std::mem::take(&mut startup.pending)
        };
        debug!(listeners = pending.len(), "[Context] Publishing startup");
        for listener in pending {
            listener(self);
        }
    }

    /// True once [`publish_startup`](Self::publish_startup) ran.
    pub fn is_started(&self) -> bool {
        self.inner.listeners.startup.lock().started
    }

    /// Signal shutdown and await every shutdown listener in registration order.
    pub async fn publish_shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        let listeners = std::mem::take(&mut *self.inner.listeners.shutdown.lock());
        info!(listeners = listeners.len(), "[Context] Publishing shutdown");
        for listener in listeners {
            listener().await;
        }
    }

    /// Receiver that flips to `true` when shutdown starts.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// True once shutdown started.
    pub fn is_shutting_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }
}

impl std::fmt::Debug for CoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreContext")
            .field("node_id", &self.node_id())
            .field("maps", &self.inner.maps.len())
            .finish_non_exhaustive()
    }
}

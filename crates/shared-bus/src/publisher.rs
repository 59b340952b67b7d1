//! # Message Bus
//!
//! The sending side of the bus plus the consumer registry it dispatches
//! through.

use crate::cluster::{Cluster, Member};
use crate::delivery::Delivery;
use crate::subscriber::Consumer;
use crate::{BusError, DEFAULT_CHANNEL_CAPACITY};
use dashmap::DashMap;
use shared_types::{InboundMessage, Reply};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Consumers of one address, rotated round-robin.
#[derive(Default)]
struct Group {
    consumers: Vec<(u64, mpsc::Sender<Delivery>)>,
    cursor: usize,
}

/// Address → consumers.
#[derive(Default)]
pub(crate) struct Registry {
    groups: DashMap<String, Group>,
    next_id: AtomicU64,
}

impl Registry {
    fn register(&self, address: &str, sender: mpsc::Sender<Delivery>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.groups
            .entry(address.to_string())
            .or_default()
            .consumers
            .push((id, sender));
        id
    }

    pub(crate) fn unregister(&self, address: &str, id: u64) {
        let empty = match self.groups.get_mut(address) {
            Some(mut group) => {
                group.consumers.retain(|(consumer, _)| *consumer != id);
                group.consumers.is_empty()
            }
            None => false,
        };
        if empty {
            self.groups.remove_if(address, |_, group| group.consumers.is_empty());
        }
    }

    /// Next open consumer for `address`.
    fn next(&self, address: &str) -> Option<mpsc::Sender<Delivery>> {
        let mut group = self.groups.get_mut(address)?;
        group.consumers.retain(|(_, sender)| !sender.is_closed());
        if group.consumers.is_empty() {
            return None;
        }
        let index = group.cursor % group.consumers.len();
        group.cursor = group.cursor.wrapping_add(1);
        Some(group.consumers[index].1.clone())
    }

    fn count(&self, address: &str) -> usize {
        self.groups
            .get(address)
            .map(|group| group.consumers.len())
            .unwrap_or(0)
    }
}

struct BusInner {
    node_id: String,
    registry: Arc<Registry>,
    cluster: Option<Cluster>,
    capacity: usize,
    requests_sent: AtomicU64,
}

/// Request/reply bus shared by every node deployed in a process.
///
/// Cheap to clone; clones share the same consumers and cluster.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Create a standalone (non-clustered) bus.
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self::build(node_id.into(), None, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a clustered bus guarded by `secret`.
    ///
    /// The local node is the first member.
    ///
    /// # Errors
    ///
    /// - `BusError::EmptySecret` - no pre-shared secret
    /// - any error from the local node's join
    pub fn clustered(
        node_id: impl Into<String>,
        host: impl Into<String>,
        secret: &[u8],
    ) -> Result<Self, BusError> {
        let node_id = node_id.into();
        let cluster = Cluster::new(secret)?;
        cluster.join(Member::new(node_id.clone(), host), secret)?;
        Ok(Self::build(node_id, Some(cluster), DEFAULT_CHANNEL_CAPACITY))
    }

    fn build(node_id: String, cluster: Option<Cluster>, capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                node_id,
                registry: Arc::new(Registry::default()),
                cluster,
                capacity,
                requests_sent: AtomicU64::new(0),
            }),
        }
    }

    /// Id of the local node.
    #[must_use]
    pub fn node_id(&self) -> &str {
        &self.inner.node_id
    }

    /// True when the bus is part of a cluster.
    #[must_use]
    pub fn is_clustered(&self) -> bool {
        self.inner.cluster.is_some()
    }

    /// Register a new consumer on `address`.
    #[must_use]
    pub fn consumer(&self, address: &str) -> Consumer {
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        let id = self.inner.registry.register(address, sender);
        debug!(address = %address, id, "Consumer registered");
        Consumer::new(
            receiver,
            address.to_string(),
            id,
            Arc::downgrade(&self.inner.registry),
        )
    }

    /// Number of consumers registered on `address`.
    #[must_use]
    pub fn handlers(&self, address: &str) -> usize {
        self.inner.registry.count(address)
    }

    /// Addresses with at least one consumer, sorted.
    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .inner
            .registry
            .groups
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        addresses.sort();
        addresses
    }

    /// Send `message` to one consumer of `address` and wait for its reply.
    ///
    /// # Errors
    ///
    /// - `BusError::NoHandlers` - nothing consumes the address
    /// - `BusError::Timeout` - no reply within `timeout`
    /// - `BusError::NoReply` - the delivery was dropped unanswered
    pub async fn request(
        &self,
        address: &str,
        message: InboundMessage,
        sender: &str,
        timeout: Duration,
    ) -> Result<Reply, BusError> {
        let no_handlers = || BusError::NoHandlers {
            address: address.to_string(),
        };
        let consumer = self.inner.registry.next(address).ok_or_else(no_handlers)?;
        let (delivery, reply) = Delivery::new(address, sender, message, timeout);
        debug!(address = %address, sender = %sender, id = %delivery.id, "Request sent");
        self.inner.requests_sent.fetch_add(1, Ordering::Relaxed);

        let exchange = async {
            consumer.send(delivery).await.map_err(|_| no_handlers())?;
            reply.await.map_err(|_| BusError::NoReply {
                address: address.to_string(),
            })
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout {
                address: address.to_string(),
                timeout,
            }),
        }
    }

    /// Admit a member to the cluster.
    ///
    /// # Errors
    ///
    /// `BusError::NotClustered` on a standalone bus, otherwise see
    /// [`Cluster::join`].
    pub fn join(&self, member: Member, secret: &[u8]) -> Result<(), BusError> {
        self.cluster()?.join(member, secret)
    }

    /// Remove a member from the cluster.
    pub fn leave(&self, id: &str) -> Result<bool, BusError> {
        Ok(self.cluster()?.leave(id))
    }

    /// Current cluster members.
    pub fn members(&self) -> Result<Vec<Member>, BusError> {
        Ok(self.cluster()?.members())
    }

    fn cluster(&self) -> Result<&Cluster, BusError> {
        self.inner.cluster.as_ref().ok_or(BusError::NotClustered)
    }

    /// Total requests dispatched.
    #[must_use]
    pub fn requests_sent(&self) -> u64 {
        self.inner.requests_sent.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("node_id", &self.inner.node_id)
            .field("clustered", &self.is_clustered())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ResponseStatus;

    const WAIT: Duration = Duration::from_secs(1);

    /// Answer every delivery with `{status: ACCEPTED, consumer: <tag>, echo: <sender>}`.
    fn spawn_echo(mut consumer: Consumer, tag: &'static str) {
        tokio::spawn(async move {
            while let Some(delivery) = consumer.recv().await {
                let reply = Reply::accepted()
                    .with_field("consumer", tag)
                    .with_field("echo", delivery.sender.clone());
                let _ = delivery.reply.send(reply);
            }
        });
    }

    #[tokio::test]
    async fn test_request_reply() {
        let bus = MessageBus::new("node");
        spawn_echo(bus.consumer("echo"), "a");

        let reply = bus
            .request("echo", InboundMessage::new("ping"), "caller", WAIT)
            .await
            .unwrap();

        assert!(reply.is(ResponseStatus::Accepted));
        assert_eq!(reply.get("echo"), Some(&serde_json::json!("caller")));
        assert_eq!(bus.requests_sent(), 1);
    }

    #[tokio::test]
    async fn test_no_handlers() {
        let bus = MessageBus::new("node");
        let result = bus
            .request("nobody", InboundMessage::new("ping"), "caller", WAIT)
            .await;

        assert_eq!(
            result,
            Err(BusError::NoHandlers {
                address: "nobody".into()
            })
        );
    }

    #[tokio::test]
    async fn test_round_robin() {
        let bus = MessageBus::new("node");
        spawn_echo(bus.consumer("echo"), "a");
        spawn_echo(bus.consumer("echo"), "b");
        assert_eq!(bus.handlers("echo"), 2);

        let mut seen = Vec::new();
        for _ in 0..4 {
            let reply = bus
                .request("echo", InboundMessage::new("ping"), "caller", WAIT)
                .await
                .unwrap();
            seen.push(reply.get("consumer").cloned().unwrap());
        }
        assert_eq!(seen[0], seen[2]);
        assert_eq!(seen[1], seen[3]);
        assert_ne!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn test_timeout() {
        let bus = MessageBus::new("node");
        // Held but never read
        let _consumer = bus.consumer("slow");

        let result = bus
            .request(
                "slow",
                InboundMessage::new("ping"),
                "caller",
                Duration::from_millis(50),
            )
            .await;

        assert!(matches!(result, Err(BusError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_dropped_delivery_is_no_reply() {
        let bus = MessageBus::new("node");
        let mut consumer = bus.consumer("drop");
        tokio::spawn(async move {
            while let Some(delivery) = consumer.recv().await {
                drop(delivery);
            }
        });

        let result = bus
            .request("drop", InboundMessage::new("ping"), "caller", WAIT)
            .await;

        assert_eq!(
            result,
            Err(BusError::NoReply {
                address: "drop".into()
            })
        );
    }

    #[tokio::test]
    async fn test_consumer_drop_unregisters() {
        let bus = MessageBus::new("node");
        let consumer = bus.consumer("gone");
        assert_eq!(bus.addresses(), vec!["gone".to_string()]);

        drop(consumer);
        assert_eq!(bus.handlers("gone"), 0);
        assert!(bus.addresses().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let bus = MessageBus::new("node");
        spawn_echo(bus.consumer("echo"), "a");

        let (first, second) = tokio::join!(
            bus.request("echo", InboundMessage::new("ping"), "alice", WAIT),
            bus.request("echo", InboundMessage::new("ping"), "bob", WAIT),
        );

        assert_eq!(first.unwrap().get("echo"), Some(&serde_json::json!("alice")));
        assert_eq!(second.unwrap().get("echo"), Some(&serde_json::json!("bob")));
    }

    #[test]
    fn test_standalone_has_no_cluster() {
        let bus = MessageBus::new("node");

        assert!(!bus.is_clustered());
        assert_eq!(bus.members(), Err(BusError::NotClustered));
        assert_eq!(
            bus.join(Member::new("x", "h"), b"s"),
            Err(BusError::NotClustered)
        );
    }

    #[test]
    fn test_clustered_join() {
        let bus = MessageBus::clustered("node", "localhost", b"preshared").unwrap();
        assert_eq!(bus.members().unwrap().len(), 1);

        bus.join(Member::new("peer", "10.0.0.2"), b"preshared").unwrap();
        assert_eq!(bus.members().unwrap().len(), 2);
        assert_eq!(bus.leave("peer"), Ok(true));
    }

    #[test]
    fn test_clustered_requires_secret() {
        let result = MessageBus::clustered("node", "localhost", b"");
        assert!(matches!(result, Err(BusError::EmptySecret)));
    }
}

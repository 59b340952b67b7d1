//! # Consumer
//!
//! The receiving side of an address. When dropped, the consumer is removed
//! from the address's rotation.

use crate::delivery::Delivery;
use crate::publisher::Registry;
use std::sync::Weak;
use tokio::sync::mpsc;
use tracing::debug;

/// A registered consumer of one address.
pub struct Consumer {
    receiver: mpsc::Receiver<Delivery>,
    address: String,
    id: u64,
    registry: Weak<Registry>,
}

impl Consumer {
    pub(crate) fn new(
        receiver: mpsc::Receiver<Delivery>,
        address: String,
        id: u64,
        registry: Weak<Registry>,
    ) -> Self {
        Self {
            receiver,
            address,
            id,
            registry,
        }
    }

    /// Receive the next delivery.
    ///
    /// # Returns
    ///
    /// - `Some(delivery)` - The next delivery
    /// - `None` - The bus was dropped
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Address this consumer is registered on.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("address", &self.address)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(&self.address, self.id);
        }
        debug!(address = %self.address, id = self.id, "Consumer dropped");
    }
}

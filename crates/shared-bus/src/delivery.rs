//! # Delivery
//!
//! A message handed to one consumer together with the channel its reply goes
//! back on.

use shared_types::{InboundMessage, Reply};
use std::time::Duration;
use tokio::sync::oneshot;
use uuid::Uuid;

/// One request as seen by the consumer that received it.
#[derive(Debug)]
pub struct Delivery {
    /// Unique delivery id, for log correlation.
    pub id: Uuid,
    /// Address the request was sent to.
    pub address: String,
    /// Sender identity from the envelope.
    pub sender: String,
    /// Decoded message.
    pub message: InboundMessage,
    /// Time the caller is prepared to wait.
    pub timeout: Duration,
    /// Reply channel back to the caller.
    pub reply: ReplySender,
}

impl Delivery {
    /// Create a delivery and the receiver its reply arrives on.
    ///
    /// The bus builds these for [`MessageBus::request`](crate::MessageBus::request);
    /// handlers under test can build one directly.
    pub fn new(
        address: &str,
        sender: &str,
        message: InboundMessage,
        timeout: Duration,
    ) -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        let delivery = Self {
            id: Uuid::new_v4(),
            address: address.to_string(),
            sender: sender.to_string(),
            message,
            timeout,
            reply: ReplySender(tx),
        };
        (delivery, rx)
    }
}

/// Sending half of a delivery's reply channel.
///
/// Consumed by the first reply.
#[derive(Debug)]
pub struct ReplySender(oneshot::Sender<Reply>);

impl ReplySender {
    /// Send the reply.
    ///
    /// Returns the reply back when the caller has stopped waiting.
    pub fn send(self, reply: Reply) -> Result<(), Reply> {
        self.0.send(reply)
    }

    /// True when the caller has stopped waiting.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

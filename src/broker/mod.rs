//! Message broker transport
//!
//! The dispatcher and the RPC client only see [`Channel`] and
//! [`Consumer`]. [`MemoryBroker`] implements them in process;
//! `AmqpChannel` (feature `amqp`) speaks AMQP 0-9-1 through `lapin`.

#[cfg(feature = "amqp")]
mod amqp;
mod memory;

#[cfg(feature = "amqp")]
pub use amqp::{AmqpChannel, AmqpConnection};
pub use memory::{MemoryBroker, MemoryChannel};

use crate::error::Result;
use async_trait::async_trait;

/// One message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-scoped tag used to acknowledge the message.
    pub delivery_tag: u64,
    pub body: Vec<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
}

/// A message to publish on the default exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: Vec<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
}

impl OutboundMessage {
    #[must_use]
    pub const fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            correlation_id: None,
            reply_to: None,
        }
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }
}

/// A broker channel. Implementations deliver at most one
/// unacknowledged message per consumer at a time.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Declare a queue and return its name. An empty name asks the
    /// broker for a private, generated queue.
    async fn declare_queue(&self, name: &str) -> Result<String>;

    async fn consume(&self, queue: &str) -> Result<Box<dyn Consumer>>;

    async fn publish(&self, queue: &str, message: OutboundMessage) -> Result<()>;

    async fn ack(&self, delivery_tag: u64) -> Result<()>;
}

#[async_trait]
pub trait Consumer: Send {
    /// Next delivery. `None` once the consumer is cancelled, `Err` when
    /// the connection is gone.
    async fn next(&mut self) -> Option<Result<Delivery>>;
}

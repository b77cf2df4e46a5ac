//! In-process broker
//!
//! Named queues shared by every channel of one [`MemoryBroker`].
//! Consumers on the same queue compete for messages, each channel holds
//! at most one unacknowledged delivery (prefetch 1), and publishing to a
//! queue nobody declared drops the message like the AMQP default
//! exchange does.

use super::{Channel, Consumer, Delivery, OutboundMessage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
struct Message {
    body: Vec<u8>,
    correlation_id: Option<String>,
    reply_to: Option<String>,
}

#[derive(Debug)]
struct Queue {
    tx: mpsc::UnboundedSender<Message>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Message>>,
    depth: AtomicUsize,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            depth: AtomicUsize::new(0),
        }
    }
}

#[derive(Debug, Default)]
struct BrokerState {
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    delivered: AtomicU64,
    acked: AtomicU64,
    /// Connection loss: consumers yield `Err`, publishes fail.
    closed: CancellationToken,
    /// Graceful consumer cancellation: consumers yield `None`.
    cancelled: CancellationToken,
}

impl BrokerState {
    fn queue(&self, name: &str) -> Option<Arc<Queue>> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.is_cancelled() {
            Err(Error::ConnectionLost("memory broker closed".into()))
        } else {
            Ok(())
        }
    }
}

/// An in-process broker; cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new channel with its own delivery tags and prefetch window.
    #[must_use]
    pub fn channel(&self) -> MemoryChannel {
        MemoryChannel {
            state: Arc::clone(&self.state),
            unacked: Arc::new(Mutex::new(HashSet::new())),
            credit: Arc::new(Semaphore::new(1)),
            next_tag: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Messages waiting in `queue` (published, not yet delivered).
    #[must_use]
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.state
            .queue(queue)
            .map_or(0, |q| q.depth.load(Ordering::SeqCst))
    }

    /// Total deliveries handed to consumers.
    #[must_use]
    pub fn delivered_count(&self) -> u64 {
        self.state.delivered.load(Ordering::SeqCst)
    }

    /// Total successful acknowledgments.
    #[must_use]
    pub fn acked_count(&self) -> u64 {
        self.state.acked.load(Ordering::SeqCst)
    }

    /// Simulate losing the connection.
    pub fn close(&self) {
        self.state.closed.cancel();
    }

    /// Cancel every consumer; their `next()` returns `None`.
    pub fn cancel_consumers(&self) {
        self.state.cancelled.cancel();
    }
}

/// A channel on a [`MemoryBroker`].
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    state: Arc<BrokerState>,
    unacked: Arc<Mutex<HashSet<u64>>>,
    credit: Arc<Semaphore>,
    next_tag: Arc<AtomicU64>,
}

impl MemoryChannel {
    /// Deliveries on this channel still waiting for an ack.
    #[must_use]
    pub fn unacked_count(&self) -> usize {
        self.unacked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn declare_queue(&self, name: &str) -> Result<String> {
        self.state.ensure_open()?;
        let name = if name.is_empty() {
            format!("amq.gen-{}", uuid::Uuid::new_v4())
        } else {
            name.to_string()
        };
        self.state
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Queue::new()));
        Ok(name)
    }

    async fn consume(&self, queue: &str) -> Result<Box<dyn Consumer>> {
        self.state.ensure_open()?;
        let queue = self
            .state
            .queue(queue)
            .ok_or_else(|| Error::Broker(format!("no queue '{queue}'")))?;
        Ok(Box::new(MemoryConsumer {
            channel: self.clone(),
            queue,
        }))
    }

    async fn publish(&self, queue: &str, message: OutboundMessage) -> Result<()> {
        self.state.ensure_open()?;
        let Some(target) = self.state.queue(queue) else {
            debug!(queue, "Dropping message for undeclared queue");
            return Ok(());
        };
        target.depth.fetch_add(1, Ordering::SeqCst);
        target
            .tx
            .send(Message {
                body: message.body,
                correlation_id: message.correlation_id,
                reply_to: message.reply_to,
            })
            .map_err(|_| Error::Broker(format!("queue '{queue}' is gone")))
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        self.state.ensure_open()?;
        let removed = self
            .unacked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&delivery_tag);
        if !removed {
            return Err(Error::Broker(format!(
                "PRECONDITION_FAILED - unknown delivery tag {delivery_tag}"
            )));
        }
        self.state.acked.fetch_add(1, Ordering::SeqCst);
        self.credit.add_permits(1);
        Ok(())
    }
}

struct MemoryConsumer {
    channel: MemoryChannel,
    queue: Arc<Queue>,
}

impl MemoryConsumer {
    async fn receive(&self) -> Option<Delivery> {
        let permit = self.channel.credit.acquire().await.ok()?;
        let message = self.queue.rx.lock().await.recv().await?;
        permit.forget();
        self.queue.depth.fetch_sub(1, Ordering::SeqCst);

        let delivery_tag = self.channel.next_tag.fetch_add(1, Ordering::SeqCst) + 1;
        self.channel
            .unacked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(delivery_tag);
        self.channel.state.delivered.fetch_add(1, Ordering::SeqCst);

        Some(Delivery {
            delivery_tag,
            body: message.body,
            correlation_id: message.correlation_id,
            reply_to: message.reply_to,
        })
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn next(&mut self) -> Option<Result<Delivery>> {
        let state = Arc::clone(&self.channel.state);
        tokio::select! {
            biased;
            () = state.closed.cancelled() => {
                Some(Err(Error::ConnectionLost("memory broker closed".into())))
            }
            () = state.cancelled.cancelled() => None,
            delivery = self.receive() => delivery.map(Ok),
        }
    }
}

//! RPC dispatcher
//!
//! Turns each inbound delivery into exactly one reply and exactly one
//! acknowledgment. The delivery is acknowledged after the handler has
//! returned and the reply has been attempted; it is never requeued.

use crate::broker::{Channel, Delivery, OutboundMessage};
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::{OperationError, Result};
use crate::registry::OperationRegistry;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(registry: Arc<OperationRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Run one request through its handler. Never fails: unknown
    /// operations, handler errors and handler panics all come back as
    /// failure envelopes.
    pub async fn dispatch(&self, request: RequestEnvelope) -> ResponseEnvelope {
        let RequestEnvelope {
            operation,
            arguments,
        } = request;

        let Some(handler) = self.registry.get(&operation) else {
            warn!(operation = %operation, "Unknown operation");
            return ResponseEnvelope::failure(&OperationError::UnknownOperation(operation));
        };

        let outcome = AssertUnwindSafe(handler(arguments)).catch_unwind().await;
        let result = outcome.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(operation = %operation, panic = %message, "Handler panicked");
            Err(OperationError::Internal(message))
        });

        if let Err(e) = &result {
            warn!(operation = %operation, error = %e, "Operation failed");
        }
        ResponseEnvelope::from_result(result)
    }

    /// Decode, dispatch, reply and acknowledge one delivery.
    ///
    /// # Errors
    ///
    /// Only a failed acknowledgment is returned; reply publication
    /// failures are logged.
    pub async fn handle_delivery(&self, channel: &dyn Channel, delivery: Delivery) -> Result<()> {
        let Delivery {
            delivery_tag,
            body,
            correlation_id,
            reply_to,
        } = delivery;

        let response = match RequestEnvelope::from_slice(&body) {
            Ok(request) => {
                debug!(
                    operation = %request.operation,
                    correlation_id = correlation_id.as_deref().unwrap_or(""),
                    delivery_tag,
                    "Request received"
                );
                self.dispatch(request).await
            }
            Err(e) => {
                warn!(delivery_tag, error = %e, "Malformed request");
                ResponseEnvelope::failure(&e)
            }
        };

        match reply_to.as_deref().filter(|queue| !queue.is_empty()) {
            Some(queue) => {
                let mut reply = OutboundMessage::new(response.to_vec());
                reply.correlation_id.clone_from(&correlation_id);
                match channel.publish(queue, reply).await {
                    Ok(()) => debug!(
                        queue,
                        correlation_id = correlation_id.as_deref().unwrap_or(""),
                        success = response.success,
                        "Reply sent"
                    ),
                    Err(e) => error!(queue, error = %e, "Failed to publish reply"),
                }
            }
            None => debug!(delivery_tag, "No reply_to; reply discarded"),
        }

        channel.ack(delivery_tag).await
    }

    /// Consume `queue` one message at a time until the consumer is
    /// cancelled (`Ok`) or the transport fails (`Err`).
    ///
    /// # Errors
    ///
    /// Returns the transport error that ended the loop.
    pub async fn consume_loop(&self, channel: &dyn Channel, queue: &str) -> Result<()> {
        let queue = channel.declare_queue(queue).await?;
        let mut consumer = channel.consume(&queue).await?;
        info!(queue = %queue, "Awaiting RPC requests");

        while let Some(next) = consumer.next().await {
            let delivery = next.inspect_err(|e| error!(error = %e, "Consumer transport failed"))?;
            self.handle_delivery(channel, delivery)
                .await
                .inspect_err(|e| error!(error = %e, "Acknowledgment failed"))?;
        }

        info!(queue = %queue, "Consumer cancelled");
        Ok(())
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

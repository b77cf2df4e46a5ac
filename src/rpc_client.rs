//! Caller side of the queue RPC

use crate::arguments::Arguments;
use crate::broker::{Channel, Consumer, OutboundMessage};
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

/// Publishes requests and waits for the correlated replies on a
/// private reply queue.
pub struct RpcClient {
    channel: Arc<dyn Channel>,
    request_queue: String,
    reply_queue: String,
    replies: Mutex<Box<dyn Consumer>>,
}

impl RpcClient {
    /// Declare a private reply queue on `channel` and start consuming it.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the queue cannot be declared or
    /// consumed.
    pub async fn connect(
        channel: Arc<dyn Channel>,
        request_queue: impl Into<String>,
    ) -> Result<Self> {
        let reply_queue = channel.declare_queue("").await?;
        let replies = channel.consume(&reply_queue).await?;
        debug!(reply_queue = %reply_queue, "RPC client ready");
        Ok(Self {
            channel,
            request_queue: request_queue.into(),
            reply_queue,
            replies: Mutex::new(replies),
        })
    }

    #[must_use]
    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// Call `operation` and wait up to `timeout` for its reply.
    ///
    /// Calls made through one client are serialized; replies carrying
    /// a different correlation id are acknowledged and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Broker`] on timeout or an undecodable reply, and
    /// the transport error if the reply consumer fails.
    pub async fn call(
        &self,
        operation: &str,
        arguments: Arguments,
        timeout: Duration,
    ) -> Result<ResponseEnvelope> {
        let mut replies = self.replies.lock().await;

        let correlation_id = Uuid::new_v4().to_string();
        let body = RequestEnvelope::new(operation, arguments).to_vec()?;
        self.channel
            .publish(
                &self.request_queue,
                OutboundMessage::new(body)
                    .with_correlation_id(correlation_id.clone())
                    .with_reply_to(self.reply_queue.clone()),
            )
            .await?;
        debug!(operation, correlation_id = %correlation_id, "Request published");

        let wait = async {
            loop {
                let delivery = replies
                    .next()
                    .await
                    .ok_or_else(|| Error::Broker("reply consumer cancelled".into()))??;
                self.channel.ack(delivery.delivery_tag).await?;
                if delivery.correlation_id.as_deref() == Some(correlation_id.as_str()) {
                    return ResponseEnvelope::from_slice(&delivery.body)
                        .map_err(|e| Error::Broker(format!("Malformed reply: {e}")));
                }
                warn!(
                    correlation_id = delivery.correlation_id.as_deref().unwrap_or(""),
                    "Discarding uncorrelated reply"
                );
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            Error::Broker(format!(
                "timed out after {}s waiting for reply to {operation}",
                timeout.as_secs_f32()
            ))
        })?
    }
}

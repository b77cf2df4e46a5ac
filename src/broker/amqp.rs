//! AMQP 0-9-1 transport over `lapin`

use super::{Channel, Consumer, Delivery, OutboundMessage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    QueueDeclareOptions,
};
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Connection, ConnectionProperties};
use tracing::{debug, info};

fn broker_error(context: &str, e: &lapin::Error) -> Error {
    Error::Broker(format!("{context} failed: {e}"))
}

/// One AMQP connection; channels are opened from it.
pub struct AmqpConnection {
    connection: Connection,
}

impl AmqpConnection {
    /// Connect to `url` (e.g. `amqp://127.0.0.1:5672/%2f`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Broker`] if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        debug!("Connecting to AMQP broker");
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| broker_error("AMQP connect", &e))?;
        info!("Connected to AMQP broker");
        Ok(Self { connection })
    }

    /// Open a channel limited to one unacknowledged delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Broker`] if the channel or QoS setup fails.
    pub async fn channel(&self) -> Result<AmqpChannel> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| broker_error("Channel open", &e))?;
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| broker_error("basic.qos", &e))?;
        Ok(AmqpChannel { channel })
    }

    /// # Errors
    ///
    /// Returns [`Error::Broker`] if the close handshake fails.
    pub async fn close(&self) -> Result<()> {
        self.connection
            .close(200, "bye")
            .await
            .map_err(|e| broker_error("Connection close", &e))
    }
}

/// A `lapin` channel with prefetch 1.
pub struct AmqpChannel {
    channel: lapin::Channel,
}

#[async_trait]
impl Channel for AmqpChannel {
    async fn declare_queue(&self, name: &str) -> Result<String> {
        let options = if name.is_empty() {
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..QueueDeclareOptions::default()
            }
        } else {
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            }
        };
        let queue = self
            .channel
            .queue_declare(name, options, FieldTable::default())
            .await
            .map_err(|e| broker_error("queue.declare", &e))?;
        Ok(queue.name().as_str().to_string())
    }

    async fn consume(&self, queue: &str) -> Result<Box<dyn Consumer>> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| broker_error("basic.consume", &e))?;
        Ok(Box::new(AmqpConsumer { consumer }))
    }

    async fn publish(&self, queue: &str, message: OutboundMessage) -> Result<()> {
        let mut properties = BasicProperties::default();
        if let Some(id) = message.correlation_id {
            properties = properties.with_correlation_id(ShortString::from(id));
        }
        if let Some(reply_to) = message.reply_to {
            properties = properties.with_reply_to(ShortString::from(reply_to));
        }
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &message.body,
                properties,
            )
            .await
            .map_err(|e| broker_error("basic.publish", &e))?
            .await
            .map_err(|e| broker_error("Publisher confirm", &e))?;
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<()> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| broker_error("basic.ack", &e))
    }
}

struct AmqpConsumer {
    consumer: lapin::Consumer,
}

#[async_trait]
impl Consumer for AmqpConsumer {
    async fn next(&mut self) -> Option<Result<Delivery>> {
        let delivery = match self.consumer.next().await? {
            Ok(delivery) => delivery,
            Err(e) => return Some(Err(Error::ConnectionLost(e.to_string()))),
        };
        let properties = &delivery.properties;
        Some(Ok(Delivery {
            delivery_tag: delivery.delivery_tag,
            correlation_id: properties
                .correlation_id()
                .as_ref()
                .map(|id| id.as_str().to_string()),
            reply_to: properties
                .reply_to()
                .as_ref()
                .map(|queue| queue.as_str().to_string()),
            body: delivery.data,
        }))
    }
}

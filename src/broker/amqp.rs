//! RabbitMQ connection manager.
//!
//! Owns the process's single AMQP connection and its one channel. Every
//! declare, bind, publish, and consumer setup runs while holding the
//! channel mutex, so operations from different workers never interleave on
//! the wire. Closing takes the link out of the mutex, which makes a second
//! close a no-op.

use std::fmt;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;

use super::{Broker, CONTENT_TYPE_JSON, InboundStream};
use crate::config::BrokerConfig;
use crate::domain::QueueName;
use crate::error::RelayError;

const REPLY_SUCCESS: u16 = 200;

struct Link {
    connection: Connection,
    channel: Channel,
}

impl Link {
    fn usable(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

/// AMQP broker over one connection and one channel.
pub struct AmqpBroker {
    exchange: String,
    link: Mutex<Option<Link>>,
}

impl AmqpBroker {
    /// Opens the connection and channel, declaring the fan-out exchange
    /// when configured to.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connection`] if the broker is unreachable,
    /// the handshake fails, or the exchange cannot be declared.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, RelayError> {
        tracing::info!(host = %config.host, port = config.port, "connecting to broker");

        let connection =
            Connection::connect_uri(config.amqp_uri(), ConnectionProperties::default())
                .await
                .map_err(|e| RelayError::Connection(format!("broker: {e}")))?;
        if !connection.status().connected() {
            return Err(RelayError::Connection(
                "broker connection closed during handshake".to_string(),
            ));
        }

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| RelayError::Connection(format!("broker channel: {e}")))?;

        if config.declare_exchange {
            channel
                .exchange_declare(
                    &config.exchange,
                    ExchangeKind::Fanout,
                    ExchangeDeclareOptions {
                        durable: true,
                        ..Default::default()
                    },
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    RelayError::Connection(format!(
                        "failed to declare exchange {}: {e}",
                        config.exchange
                    ))
                })?;
        }

        tracing::info!(exchange = %config.exchange, "connected to broker");
        Ok(Self {
            exchange: config.exchange.clone(),
            link: Mutex::new(Some(Link {
                connection,
                channel,
            })),
        })
    }
}

fn usable_channel(link: &Option<Link>) -> Result<&Channel, RelayError> {
    match link {
        Some(link) if link.usable() => Ok(&link.channel),
        _ => Err(RelayError::Closed),
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    fn exchange(&self) -> &str {
        &self.exchange
    }

    async fn declare_queue(&self, queue: &QueueName) -> Result<(), RelayError> {
        let link = self.link.lock().await;
        let channel = usable_channel(&link)?;
        channel
            .queue_declare(
                queue.as_str(),
                QueueDeclareOptions {
                    passive: false,
                    durable: false,
                    exclusive: true,
                    auto_delete: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| RelayError::Declare {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn bind_queue(&self, queue: &QueueName) -> Result<(), RelayError> {
        let link = self.link.lock().await;
        let channel = usable_channel(&link)?;
        channel
            .queue_bind(
                queue.as_str(),
                &self.exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| RelayError::Bind {
                queue: queue.to_string(),
                reason: e.to_string(),
            })
    }

    async fn publish(&self, body: &[u8]) -> Result<(), RelayError> {
        let link = self.link.lock().await;
        let channel = usable_channel(&link)?;
        channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_content_type(CONTENT_TYPE_JSON.into()),
            )
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn consume(&self, queue: &QueueName) -> Result<InboundStream, RelayError> {
        let link = self.link.lock().await;
        let channel = usable_channel(&link)?;
        let consumer = channel
            .basic_consume(
                queue.as_str(),
                &format!("fanout-relay.{queue}"),
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: true,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| RelayError::Consume {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;

        let queue = queue.to_string();
        Ok(consumer
            .map(move |delivery| {
                delivery
                    .map(|d| d.data)
                    .map_err(|e| RelayError::Consume {
                        queue: queue.clone(),
                        reason: e.to_string(),
                    })
            })
            .boxed())
    }

    async fn close(&self) -> bool {
        let Some(link) = self.link.lock().await.take() else {
            tracing::debug!("broker connection already closed");
            return false;
        };

        if link.channel.status().connected() {
            match link.channel.close(REPLY_SUCCESS, "relay shutting down").await {
                Ok(()) => tracing::info!("broker channel closed"),
                Err(e) => tracing::error!(error = %e, "failed to close broker channel"),
            }
        }
        if link.connection.status().connected() {
            match link
                .connection
                .close(REPLY_SUCCESS, "relay shutting down")
                .await
            {
                Ok(()) => tracing::info!("broker connection closed"),
                Err(e) => tracing::error!(error = %e, "failed to close broker connection"),
            }
        }
        true
    }

    async fn is_closed(&self) -> bool {
        self.link.lock().await.as_ref().is_none_or(|link| !link.usable())
    }
}

impl fmt::Debug for AmqpBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmqpBroker")
            .field("exchange", &self.exchange)
            .finish_non_exhaustive()
    }
}

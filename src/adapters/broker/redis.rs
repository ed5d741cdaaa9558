//! Redis pub/sub adapters.
//!
//! `RedisBrokerClient` holds one dedicated Redis connection in subscriber
//! mode. The connection is owned by a driver task that forwards messages to
//! the subscription's receiver and executes unsubscribe requests, so the
//! message stream is never rebuilt while data may be buffered in it.
//!
//! `RedisChannelPublisher` is the shared publishing connection. It is
//! process-scoped: obtained through [`RedisChannelPublisher::global`],
//! connected on first publish, and never torn down.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{MultiplexedConnection, PubSub};
use redis::AsyncCommands;
use tokio::sync::{mpsc, oneshot, OnceCell};
use tokio::task::JoinHandle;

use crate::domain::notification::Channel;
use crate::ports::{
    BrokerClient, BrokerClientFactory, BrokerError, ChannelPublisher, Delivery, DeliveryReceiver,
};

/// Requests sent from the client handle to its driver task.
enum DriverCommand {
    Unsubscribe {
        ack: oneshot::Sender<Result<(), BrokerError>>,
    },
}

struct Driver {
    commands: mpsc::Sender<DriverCommand>,
    task: JoinHandle<()>,
}

/// Dedicated Redis subscriber connection for one stream.
pub struct RedisBrokerClient {
    client: redis::Client,
    timeout: Duration,
    buffer: usize,
    channel: Option<Channel>,
    driver: Option<Driver>,
    closed: bool,
}

impl RedisBrokerClient {
    pub fn new(client: redis::Client, timeout: Duration, buffer: usize) -> Self {
        Self {
            client,
            timeout,
            buffer: buffer.max(1),
            channel: None,
            driver: None,
            closed: false,
        }
    }

    async fn connect(&self) -> Result<PubSub, BrokerError> {
        let connection = tokio::time::timeout(self.timeout, self.client.get_async_connection())
            .await
            .map_err(|_| BrokerError::Connect("connection timed out".to_string()))?
            .map_err(|e: redis::RedisError| BrokerError::Connect(e.to_string()))?;
        Ok(connection.into_pubsub())
    }
}

#[async_trait]
impl BrokerClient for RedisBrokerClient {
    async fn subscribe(&mut self, channel: &Channel) -> Result<DeliveryReceiver, BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed);
        }
        if let Some(current) = &self.channel {
            return Err(BrokerError::AlreadySubscribed(current.to_string()));
        }

        let mut pubsub = self.connect().await?;
        tokio::time::timeout(self.timeout, pubsub.subscribe(channel.as_str()))
            .await
            .map_err(|_| BrokerError::Subscribe {
                channel: channel.to_string(),
                reason: "subscribe timed out".to_string(),
            })?
            .map_err(|e: redis::RedisError| BrokerError::Subscribe {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;

        let (deliveries, receiver) = mpsc::channel(self.buffer);
        let (commands, command_rx) = mpsc::channel(1);
        let task = tokio::spawn(drive(pubsub, channel.clone(), deliveries, command_rx));

        tracing::debug!(channel = %channel, "redis subscription established");
        self.channel = Some(channel.clone());
        self.driver = Some(Driver { commands, task });
        Ok(receiver)
    }

    async fn unsubscribe(&mut self, channel: &Channel) -> Result<(), BrokerError> {
        if self.channel.as_ref() != Some(channel) {
            return Ok(());
        }
        self.channel = None;

        let Some(driver) = &self.driver else {
            return Ok(());
        };
        let (ack, done) = oneshot::channel();
        if driver
            .commands
            .send(DriverCommand::Unsubscribe { ack })
            .await
            .is_err()
        {
            // Driver already gone; the connection is released with it.
            return Ok(());
        }
        done.await.unwrap_or(Ok(()))
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        self.closed = true;
        self.channel = None;
        if let Some(Driver { commands, task }) = self.driver.take() {
            drop(commands);
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "redis subscriber task failed");
                }
            }
        }
        Ok(())
    }
}

impl Drop for RedisBrokerClient {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.task.abort();
        }
    }
}

/// Owns the subscriber connection until the client handle lets go of it.
async fn drive(
    mut pubsub: PubSub,
    channel: Channel,
    deliveries: mpsc::Sender<Delivery>,
    mut commands: mpsc::Receiver<DriverCommand>,
) {
    let mut next = forward_messages(&mut pubsub, &channel, &deliveries, &mut commands).await;
    drop(deliveries);

    while let Some(command) = next {
        match command {
            DriverCommand::Unsubscribe { ack } => {
                let result = pubsub.unsubscribe(channel.as_str()).await.map_err(
                    |e: redis::RedisError| BrokerError::Unsubscribe {
                        channel: channel.to_string(),
                        reason: e.to_string(),
                    },
                );
                let _ = ack.send(result);
            }
        }
        next = commands.recv().await;
    }

    tracing::debug!(channel = %channel, "redis subscriber connection released");
}

/// Forwards messages until a command arrives, the subscription ends, or
/// nobody is reading. Returns the first pending command, if any.
async fn forward_messages(
    pubsub: &mut PubSub,
    channel: &Channel,
    deliveries: &mpsc::Sender<Delivery>,
    commands: &mut mpsc::Receiver<DriverCommand>,
) -> Option<DriverCommand> {
    let mut messages = pubsub.on_message();
    loop {
        tokio::select! {
            command = commands.recv() => return command,
            message = messages.next() => {
                let Some(message) = message else {
                    let _ = deliveries
                        .send(Err(BrokerError::ConnectionLost(
                            "subscription stream ended".to_string(),
                        )))
                        .await;
                    break;
                };
                let payload = match message.get_payload::<String>() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "non-text payload skipped");
                        continue;
                    }
                };
                if deliveries.send(Ok(payload)).await.is_err() {
                    break;
                }
            }
        }
    }
    drop(messages);
    commands.recv().await
}

/// Creates `RedisBrokerClient`s that share connection settings.
#[derive(Clone)]
pub struct RedisBrokerFactory {
    client: redis::Client,
    timeout: Duration,
    buffer: usize,
}

impl RedisBrokerFactory {
    /// Parses `url` without connecting.
    pub fn new(url: &str, timeout: Duration, buffer: usize) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url)
            .map_err(|e: redis::RedisError| BrokerError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            timeout,
            buffer,
        })
    }
}

impl BrokerClientFactory for RedisBrokerFactory {
    fn create(&self) -> Box<dyn BrokerClient> {
        Box::new(RedisBrokerClient::new(
            self.client.clone(),
            self.timeout,
            self.buffer,
        ))
    }
}

static PUBLISHER: OnceLock<Arc<RedisChannelPublisher>> = OnceLock::new();

/// Process-wide publishing connection.
///
/// There is one per process, reached through [`RedisChannelPublisher::global`].
/// It has no teardown: the multiplexed connection opens on the first publish
/// and is released only when the process exits. It never subscribes; every
/// stream gets its own [`RedisBrokerClient`].
pub struct RedisChannelPublisher {
    client: redis::Client,
    timeout: Duration,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisChannelPublisher {
    /// Returns the process publisher, creating it on the first call.
    ///
    /// Creation only parses `url`; nothing connects until the first publish.
    /// Once created, later calls return the same instance and ignore their
    /// arguments.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Connect` if the publisher does not exist yet and
    /// `url` does not parse.
    pub fn global(url: &str, timeout: Duration) -> Result<Arc<Self>, BrokerError> {
        if let Some(publisher) = PUBLISHER.get() {
            return Ok(Arc::clone(publisher));
        }
        let publisher = Arc::new(Self::new(url, timeout)?);
        Ok(Arc::clone(PUBLISHER.get_or_init(|| publisher)))
    }

    fn new(url: &str, timeout: Duration) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url)
            .map_err(|e: redis::RedisError| BrokerError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            timeout,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, BrokerError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                tokio::time::timeout(self.timeout, self.client.get_multiplexed_tokio_connection())
                    .await
                    .map_err(|_| BrokerError::Connect("connection timed out".to_string()))?
                    .map_err(|e: redis::RedisError| BrokerError::Connect(e.to_string()))
            })
            .await?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl ChannelPublisher for RedisChannelPublisher {
    async fn publish(&self, channel: &Channel, payload: &str) -> Result<usize, BrokerError> {
        let mut connection = self.connection().await?;
        let receivers: usize = connection
            .publish(channel.as_str(), payload)
            .await
            .map_err(|e: redis::RedisError| BrokerError::Publish {
                channel: channel.to_string(),
                reason: e.to_string(),
            })?;
        tracing::debug!(channel = %channel, receivers, "payment event published");
        Ok(receivers)
    }
}

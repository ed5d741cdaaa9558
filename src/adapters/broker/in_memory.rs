//! In-process message bus.
//!
//! Fans each publish out to the channel's current subscribers and forgets
//! it. Used by tests and by local development (`redis.url = memory://`).
//!
//! # Architecture
//!
//! ```text
//! channel payment:U1    channel payment:U2
//! ├── subscriber 1      └── subscriber 3
//! └── subscriber 2
//! ```
//!
//! Each subscriber is one `InMemoryBrokerClient`, i.e. one open stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::notification::Channel;
use crate::ports::{
    BrokerClient, BrokerClientFactory, BrokerError, ChannelPublisher, Delivery, DeliveryReceiver,
};

/// Default per-subscriber buffer.
const DEFAULT_BUFFER: usize = 64;

struct Subscriber {
    id: u64,
    sender: mpsc::Sender<Delivery>,
}

struct BusInner {
    channels: RwLock<HashMap<Channel, Vec<Subscriber>>>,
    next_id: AtomicU64,
    buffer: usize,
    reject_subscribe: AtomicBool,
    connections_opened: AtomicUsize,
}

impl BusInner {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Channel, Vec<Subscriber>>> {
        self.channels.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Channel, Vec<Subscriber>>> {
        self.channels.write().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, channel: &Channel, id: u64) -> bool {
        let mut channels = self.write();
        let Some(subscribers) = channels.get_mut(channel) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        let removed = subscribers.len() != before;
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        removed
    }
}

/// In-process publish/subscribe bus.
///
/// Cloning shares the same bus.
#[derive(Clone)]
pub struct InMemoryMessageBus {
    inner: Arc<BusInner>,
}

impl InMemoryMessageBus {
    /// Creates a bus with the default per-subscriber buffer.
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    /// Creates a bus whose subscribers buffer up to `buffer` undelivered
    /// messages. A full subscriber misses further messages.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                reject_subscribe: AtomicBool::new(false),
                connections_opened: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of live subscriptions on `channel`.
    pub fn subscriber_count(&self, channel: &Channel) -> usize {
        self.inner.read().get(channel).map(Vec::len).unwrap_or(0)
    }

    /// Total number of subscriber connections ever opened.
    pub fn connections_opened(&self) -> usize {
        self.inner.connections_opened.load(Ordering::SeqCst)
    }

    /// Makes subsequent subscribe calls fail (or succeed again).
    pub fn reject_subscriptions(&self, reject: bool) {
        self.inner.reject_subscribe.store(reject, Ordering::SeqCst);
    }

    /// Drops every subscription on `channel` with a delivery error, as if
    /// the bus connection behind them was lost. Returns how many were hit.
    pub fn fail_channel(&self, channel: &Channel, reason: &str) -> usize {
        let subscribers = self.inner.write().remove(channel).unwrap_or_default();
        for subscriber in &subscribers {
            let _ = subscriber
                .sender
                .try_send(Err(BrokerError::ConnectionLost(reason.to_string())));
        }
        subscribers.len()
    }

    fn deliver(&self, channel: &Channel, payload: &str) -> usize {
        let channels = self.inner.read();
        let Some(subscribers) = channels.get(channel) else {
            return 0;
        };
        let mut delivered = 0;
        for subscriber in subscribers {
            match subscriber.sender.try_send(Ok(payload.to_string())) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        channel = %channel,
                        subscriber = subscriber.id,
                        "subscriber buffer full, message dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
        delivered
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerClientFactory for InMemoryMessageBus {
    fn create(&self) -> Box<dyn BrokerClient> {
        Box::new(InMemoryBrokerClient {
            bus: self.inner.clone(),
            subscription: None,
            closed: false,
        })
    }
}

#[async_trait]
impl ChannelPublisher for InMemoryMessageBus {
    async fn publish(&self, channel: &Channel, payload: &str) -> Result<usize, BrokerError> {
        Ok(self.deliver(channel, payload))
    }
}

/// Subscriber connection on an `InMemoryMessageBus`.
pub struct InMemoryBrokerClient {
    bus: Arc<BusInner>,
    subscription: Option<(Channel, u64)>,
    closed: bool,
}

#[async_trait]
impl BrokerClient for InMemoryBrokerClient {
    async fn subscribe(&mut self, channel: &Channel) -> Result<DeliveryReceiver, BrokerError> {
        if self.closed {
            return Err(BrokerError::Closed);
        }
        if let Some((current, _)) = &self.subscription {
            return Err(BrokerError::AlreadySubscribed(current.to_string()));
        }
        if self.bus.reject_subscribe.load(Ordering::SeqCst) {
            return Err(BrokerError::Subscribe {
                channel: channel.to_string(),
                reason: "subscriptions rejected".to_string(),
            });
        }

        self.bus.connections_opened.fetch_add(1, Ordering::SeqCst);
        let id = self.bus.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(self.bus.buffer);
        self.bus
            .write()
            .entry(channel.clone())
            .or_default()
            .push(Subscriber { id, sender });
        self.subscription = Some((channel.clone(), id));
        Ok(receiver)
    }

    async fn unsubscribe(&mut self, channel: &Channel) -> Result<(), BrokerError> {
        if let Some((current, id)) = self.subscription.take() {
            if &current == channel {
                self.bus.remove(&current, id);
            } else {
                self.subscription = Some((current, id));
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BrokerError> {
        if let Some((channel, id)) = self.subscription.take() {
            self.bus.remove(&channel, id);
        }
        self.closed = true;
        Ok(())
    }
}

impl Drop for InMemoryBrokerClient {
    fn drop(&mut self) {
        if let Some((channel, id)) = self.subscription.take() {
            self.bus.remove(&channel, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    fn channel(id: &str) -> Channel {
        Channel::for_recipient(&UserId::new(id).unwrap())
    }

    #[tokio::test]
    async fn publish_reaches_current_subscriber() {
        let bus = InMemoryMessageBus::new();
        let mut client = bus.create();
        let mut rx = client.subscribe(&channel("U1")).await.unwrap();

        let delivered = bus.publish(&channel("U1"), "hello").await.unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(rx.recv().await.unwrap().unwrap(), "hello");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_lost() {
        let bus = InMemoryMessageBus::new();
        assert_eq!(bus.publish(&channel("U1"), "nobody").await.unwrap(), 0);

        let mut client = bus.create();
        let mut rx = client.subscribe(&channel("U1")).await.unwrap();
        bus.publish(&channel("U1"), "later").await.unwrap();
        assert_eq!(rx.recv().await.unwrap().unwrap(), "later");
    }

    #[tokio::test]
    async fn publish_fans_out_to_every_subscriber() {
        let bus = InMemoryMessageBus::new();
        let mut a = bus.create();
        let mut b = bus.create();
        let mut rx_a = a.subscribe(&channel("U1")).await.unwrap();
        let mut rx_b = b.subscribe(&channel("U1")).await.unwrap();

        assert_eq!(bus.publish(&channel("U1"), "m").await.unwrap(), 2);
        assert_eq!(rx_a.recv().await.unwrap().unwrap(), "m");
        assert_eq!(rx_b.recv().await.unwrap().unwrap(), "m");
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = InMemoryMessageBus::new();
        let mut client = bus.create();
        let mut rx = client.subscribe(&channel("U1")).await.unwrap();

        bus.publish(&channel("U2"), "other").await.unwrap();
        bus.publish(&channel("U1"), "mine").await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), "mine");
    }

    #[tokio::test]
    async fn preserves_publish_order() {
        let bus = InMemoryMessageBus::new();
        let mut client = bus.create();
        let mut rx = client.subscribe(&channel("U1")).await.unwrap();
        for i in 0..10 {
            bus.publish(&channel("U1"), &i.to_string()).await.unwrap();
        }
        for i in 0..10 {
            assert_eq!(rx.recv().await.unwrap().unwrap(), i.to_string());
        }
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let bus = InMemoryMessageBus::new();
        let mut client = bus.create();
        let _rx = client.subscribe(&channel("U1")).await.unwrap();

        client.unsubscribe(&channel("U1")).await.unwrap();
        client.unsubscribe(&channel("U1")).await.unwrap();
        client.unsubscribe(&channel("never")).await.unwrap();

        assert_eq!(bus.subscriber_count(&channel("U1")), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_resubscribe() {
        let bus = InMemoryMessageBus::new();
        let mut client = bus.create();
        let _rx = client.subscribe(&channel("U1")).await.unwrap();

        client.close().await.unwrap();
        client.close().await.unwrap();

        assert_eq!(bus.subscriber_count(&channel("U1")), 0);
        assert!(matches!(
            client.subscribe(&channel("U1")).await,
            Err(BrokerError::Closed)
        ));
    }

    #[tokio::test]
    async fn dropping_client_releases_subscription() {
        let bus = InMemoryMessageBus::new();
        {
            let mut client = bus.create();
            let _rx = client.subscribe(&channel("U1")).await.unwrap();
            assert_eq!(bus.subscriber_count(&channel("U1")), 1);
        }
        assert_eq!(bus.subscriber_count(&channel("U1")), 0);
    }

    #[tokio::test]
    async fn rejected_subscription_returns_error() {
        let bus = InMemoryMessageBus::new();
        bus.reject_subscriptions(true);
        let mut client = bus.create();

        assert!(matches!(
            client.subscribe(&channel("U1")).await,
            Err(BrokerError::Subscribe { .. })
        ));
        assert_eq!(bus.subscriber_count(&channel("U1")), 0);
    }

    #[tokio::test]
    async fn second_subscribe_on_same_client_is_refused() {
        let bus = InMemoryMessageBus::new();
        let mut client = bus.create();
        let _rx = client.subscribe(&channel("U1")).await.unwrap();

        assert!(matches!(
            client.subscribe(&channel("U2")).await,
            Err(BrokerError::AlreadySubscribed(_))
        ));
    }

    #[tokio::test]
    async fn fail_channel_delivers_error_and_drops_subscribers() {
        let bus = InMemoryMessageBus::new();
        let mut client = bus.create();
        let mut rx = client.subscribe(&channel("U1")).await.unwrap();

        assert_eq!(bus.fail_channel(&channel("U1"), "reset"), 1);

        assert!(matches!(
            rx.recv().await,
            Some(Err(BrokerError::ConnectionLost(_)))
        ));
        assert!(rx.recv().await.is_none());
        assert_eq!(bus.subscriber_count(&channel("U1")), 0);
    }

    #[tokio::test]
    async fn full_subscriber_misses_messages_without_blocking_others() {
        let bus = InMemoryMessageBus::with_buffer(1);
        let mut slow = bus.create();
        let mut fast = bus.create();
        let _slow_rx = slow.subscribe(&channel("U1")).await.unwrap();
        let mut fast_rx = fast.subscribe(&channel("U1")).await.unwrap();

        assert_eq!(bus.publish(&channel("U1"), "1").await.unwrap(), 2);
        assert_eq!(fast_rx.recv().await.unwrap().unwrap(), "1");
        assert_eq!(bus.publish(&channel("U1"), "2").await.unwrap(), 1);
        assert_eq!(fast_rx.recv().await.unwrap().unwrap(), "2");
    }
}

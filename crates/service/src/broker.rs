//! Message broker: publishes committed events on their channels and feeds
//! subscribed channels back to the consumer.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::Event;
use tokio::sync::Mutex;

use crate::error::BrokerError;

/// One message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub channel: String,
    pub payload: serde_json::Value,
}

impl Delivery {
    /// Rebuilds the event carried by this delivery.
    pub fn decode(self) -> Result<Event, domain::DomainError> {
        Event::decode(&self.channel, self.payload)
    }
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes the event's flat record on `channel`.
    async fn publish(&self, channel: &str, event: &Event) -> Result<(), BrokerError>;

    async fn subscribe(&self, channel: &str) -> Result<(), BrokerError>;

    /// Waits for the next delivery on a subscribed channel.
    ///
    /// `None` means the broker will deliver nothing more.
    async fn receive(&self) -> Result<Option<Delivery>, BrokerError>;
}

/// A record of one publication.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub channel: String,
    pub event: Event,
}

#[derive(Debug, Default)]
struct InMemoryBrokerState {
    published: Vec<Publication>,
    subscriptions: HashSet<String>,
    inbox: VecDeque<Delivery>,
}

/// In-memory broker for testing.
///
/// Publications are recorded; those on a subscribed channel are also queued
/// for [`MessageBroker::receive`], which returns `None` once the queue is
/// empty.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<InMemoryBrokerState>>,
    fail_on_publish: Arc<AtomicBool>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every following publish to fail until switched off.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.fail_on_publish.store(fail, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<Publication> {
        self.state.lock().await.published.clone()
    }

    /// Channels of every publication, in order.
    pub async fn published_channels(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .published
            .iter()
            .map(|p| p.channel.clone())
            .collect()
    }

    /// Queues a raw delivery as if it had arrived from outside.
    pub async fn inject(&self, delivery: Delivery) {
        self.state.lock().await.inbox.push_back(delivery);
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, channel: &str, event: &Event) -> Result<(), BrokerError> {
        if self.fail_on_publish.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish {
                channel: channel.to_string(),
                reason: "in-memory publish failure injected".to_string(),
            });
        }

        let payload = event.to_record()?;
        let mut state = self.state.lock().await;
        state.published.push(Publication {
            channel: channel.to_string(),
            event: event.clone(),
        });
        if state.subscriptions.contains(channel) {
            state.inbox.push_back(Delivery {
                channel: channel.to_string(),
                payload,
            });
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.state
            .lock()
            .await
            .subscriptions
            .insert(channel.to_string());
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, BrokerError> {
        Ok(self.state.lock().await.inbox.pop_front())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_pubsub::RedisBroker;

#[cfg(feature = "redis")]
mod redis_pubsub {
    //! Redis pub/sub broker.
    //!
    //! Pub/sub is not durable: deliveries published while no consumer is
    //! subscribed are lost.

    use async_trait::async_trait;
    use domain::Event;
    use futures_util::StreamExt;
    use redis::AsyncCommands;
    use tokio::sync::Mutex;

    use super::{Delivery, MessageBroker};
    use crate::error::BrokerError;

    pub struct RedisBroker {
        publisher: Mutex<redis::aio::MultiplexedConnection>,
        subscriber: Mutex<redis::aio::PubSub>,
    }

    impl RedisBroker {
        /// Connects a publishing and a subscribing connection.
        pub async fn connect(redis_url: &str) -> Result<Self, BrokerError> {
            let client = redis::Client::open(redis_url)?;
            let publisher = client.get_multiplexed_async_connection().await?;
            let subscriber = client.get_async_pubsub().await?;
            Ok(Self {
                publisher: Mutex::new(publisher),
                subscriber: Mutex::new(subscriber),
            })
        }
    }

    #[async_trait]
    impl MessageBroker for RedisBroker {
        async fn publish(&self, channel: &str, event: &Event) -> Result<(), BrokerError> {
            let payload = serde_json::to_string(&event.to_record()?)?;
            let mut conn = self.publisher.lock().await;
            let _receivers: i64 = conn.publish(channel, payload).await?;
            Ok(())
        }

        async fn subscribe(&self, channel: &str) -> Result<(), BrokerError> {
            self.subscriber
                .lock()
                .await
                .subscribe(channel)
                .await
                .map_err(|e| BrokerError::Subscribe {
                    channel: channel.to_string(),
                    reason: e.to_string(),
                })
        }

        async fn receive(&self) -> Result<Option<Delivery>, BrokerError> {
            let mut subscriber = self.subscriber.lock().await;
            let Some(msg) = subscriber.on_message().next().await else {
                return Ok(None);
            };
            let payload: String = msg.get_payload()?;
            Ok(Some(Delivery {
                channel: msg.get_channel_name().to_string(),
                payload: serde_json::from_str(&payload)?,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::events::RoleCreated;

    use super::*;

    fn role_created() -> Event {
        Event::RoleCreated(RoleCreated {
            role: "admin".to_string(),
            permissions: vec![],
        })
    }

    #[tokio::test]
    async fn only_subscribed_channels_reach_the_inbox() {
        let broker = InMemoryBroker::new();
        broker.subscribe("role_created").await.unwrap();

        broker.publish("role_created", &role_created()).await.unwrap();
        broker.publish("role_deleted", &role_created()).await.unwrap();

        assert_eq!(
            broker.published_channels().await,
            vec!["role_created", "role_deleted"]
        );
        let delivery = broker.receive().await.unwrap().unwrap();
        assert_eq!(delivery.channel, "role_created");
        assert_eq!(delivery.decode().unwrap(), role_created());
        assert!(broker.receive().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn injected_publish_failure() {
        let broker = InMemoryBroker::new();
        broker.set_fail_on_publish(true);

        let result = broker.publish("role_created", &role_created()).await;

        assert!(matches!(result, Err(BrokerError::Publish { .. })));
        assert!(broker.published().await.is_empty());
    }
}

//! Feeds broker deliveries back into a message bus.

use std::sync::Arc;

use domain::EventKind;

use crate::broker::{Delivery, MessageBroker};
use crate::bus::MessageBus;
use crate::error::{BrokerError, BusError};

/// Subscribes to every event channel and hands each delivery to its bus.
///
/// The bus given to a consumer should carry notification handlers only, so
/// a consumed event is never published again.
pub struct EventConsumer {
    bus: Arc<MessageBus>,
    broker: Arc<dyn MessageBroker>,
}

impl EventConsumer {
    pub fn new(bus: Arc<MessageBus>, broker: Arc<dyn MessageBroker>) -> Self {
        Self { bus, broker }
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    /// Subscribes to the channel of every event kind.
    #[tracing::instrument(skip(self))]
    pub async fn subscribe_all(&self) -> Result<(), BrokerError> {
        for kind in EventKind::ALL {
            self.broker.subscribe(kind.channel()).await?;
        }
        tracing::info!(channels = EventKind::ALL.len(), "subscribed to event channels");
        Ok(())
    }

    /// Decodes one delivery and runs it through the bus.
    #[tracing::instrument(skip(self, delivery), fields(channel = %delivery.channel))]
    pub async fn handle(&self, delivery: Delivery) -> Result<(), BusError> {
        let event = delivery.decode()?;
        self.bus.handle(event).await
    }

    /// Processes deliveries until the broker has nothing more to deliver.
    ///
    /// A delivery that fails is logged and skipped. A broker error ends the
    /// loop. Returns the number of deliveries received.
    pub async fn run(&self) -> Result<u64, BrokerError> {
        let mut received: u64 = 0;

        while let Some(delivery) = self.broker.receive().await? {
            received += 1;
            metrics::counter!("consumer_deliveries_total").increment(1);
            if let Err(e) = self.handle(delivery).await {
                metrics::counter!("consumer_failures_total").increment(1);
                tracing::error!(error = %e, "delivery failed");
            }
        }

        tracing::info!(received, "consumer stopped");
        Ok(received)
    }
}

//! Outbound notices to people: administrators and account owners.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::NotificationError;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, destination: &str, message: &str) -> Result<(), NotificationError>;

    /// Sends the same message to every destination, stopping at the first
    /// failure.
    async fn broadcast(
        &self,
        destinations: &[String],
        message: &str,
    ) -> Result<(), NotificationError> {
        for destination in destinations {
            self.notify(destination, message).await?;
        }
        Ok(())
    }
}

/// A notice that was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub destination: String,
    pub message: String,
}

/// In-memory notifier for testing. Records every notice it sends.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    sent: Arc<Mutex<Vec<Notice>>>,
    fail_on_notify: Arc<AtomicBool>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every following notice to fail until switched off.
    pub fn set_fail_on_notify(&self, fail: bool) {
        self.fail_on_notify.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Notice> {
        self.sent.lock().await.clone()
    }

    /// Notices sent to `destination`, in order.
    pub async fn sent_to(&self, destination: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|notice| notice.destination == destination)
            .map(|notice| notice.message.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, destination: &str, message: &str) -> Result<(), NotificationError> {
        if self.fail_on_notify.load(Ordering::SeqCst) {
            return Err(NotificationError::Delivery {
                destination: destination.to_string(),
                reason: "in-memory notification failure injected".to_string(),
            });
        }
        self.sent.lock().await.push(Notice {
            destination: destination.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

/// Writes notices to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, destination: &str, message: &str) -> Result<(), NotificationError> {
        tracing::info!(%destination, %message, "notification");
        Ok(())
    }
}

//! Service error types.

use domain::{CommandKind, DomainError, Message};
use identity_store::StorageError;
use thiserror::Error;

/// Errors raised by a message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Publishing was refused or failed.
    #[error("Failed to publish on {channel}: {reason}")]
    Publish { channel: String, reason: String },

    /// Subscribing to a channel failed.
    #[error("Failed to subscribe to {channel}: {reason}")]
    Subscribe { channel: String, reason: String },

    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Redis connection or protocol error.
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Errors raised while delivering a notice.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Failed to notify {destination}: {reason}")]
    Delivery { destination: String, reason: String },
}

/// Everything a handler can fail with.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Broker error.
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Notification error.
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    /// The entity the handler acts on does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The entity a create handler would add already exists.
    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    /// A handler was handed a message of another kind.
    #[error("Handler for {expected} received {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl HandlerError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl ToString) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.to_string(),
        }
    }
}

/// Errors raised while building a handler registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("A handler for {0} is already registered")]
    DuplicateCommandHandler(CommandKind),

    #[error("No handler registered for {0}")]
    MissingCommandHandler(CommandKind),
}

/// Errors returned by [`crate::MessageBus::handle`].
#[derive(Debug, Error)]
pub enum BusError {
    /// The command has no handler.
    #[error("No handler registered for command {0}")]
    NoCommandHandler(CommandKind),

    /// A broker delivery could not be turned into a message.
    #[error("Unrecognized message: {0}")]
    UnrecognizedMessage(#[from] DomainError),

    /// A command handler failed.
    ///
    /// `residual` holds the messages still queued when the handler failed,
    /// followed by any events the handler had already committed. Pass it to
    /// [`crate::MessageBus::resume`] to process them.
    #[error("Command {command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: HandlerError,
        residual: Vec<Message>,
    },
}

impl BusError {
    /// Messages left unprocessed by a failed command, if any.
    pub fn residual(&self) -> &[Message] {
        match self {
            BusError::Command { residual, .. } => residual,
            _ => &[],
        }
    }
}

/// Errors raised while wiring the application.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Seeding a default role failed.
    #[error("Seeding failed: {0}")]
    Seed(#[from] BusError),
}

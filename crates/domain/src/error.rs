//! Domain error types.

use thiserror::Error;

/// Errors raised while turning external records into domain values.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No event kind is published on this channel.
    #[error("Unknown event channel: {0}")]
    UnknownChannel(String),

    /// The record does not match the event published on the channel.
    #[error("Invalid payload on channel {channel}: {source}")]
    InvalidPayload {
        channel: String,
        #[source]
        source: serde_json::Error,
    },
}

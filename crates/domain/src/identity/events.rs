//! Identity domain events.
//!
//! Every event is a flat, serializable record. The broker channel an event is
//! published on doubles as its type tag when it comes back in.

use chrono::{DateTime, Utc};
use common::EntityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::message::{EventType, Message};

use super::{ApiKeyUpdate, PermissionUpdate, RoleUpdate};

macro_rules! identity_events {
    ($($variant:ident => $channel:literal),+ $(,)?) => {
        /// Facts that already happened to an identity entity.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Event {
            $($variant($variant),)+
        }

        /// Discriminant of [`Event`], used as the handler-table key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventKind {
            $($variant,)+
        }

        impl EventKind {
            /// Every event kind, in declaration order.
            pub const ALL: &'static [EventKind] = &[$(EventKind::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(EventKind::$variant => stringify!($variant),)+
                }
            }

            /// Broker channel carrying this kind of event.
            pub fn channel(self) -> &'static str {
                match self {
                    $(EventKind::$variant => $channel,)+
                }
            }

            pub fn from_channel(channel: &str) -> Option<Self> {
                match channel {
                    $($channel => Some(EventKind::$variant),)+
                    _ => None,
                }
            }
        }

        impl Event {
            pub fn kind(&self) -> EventKind {
                match self {
                    $(Event::$variant(_) => EventKind::$variant,)+
                }
            }

            /// Serializes the event payload as a flat JSON record.
            pub fn to_record(&self) -> Result<serde_json::Value, serde_json::Error> {
                match self {
                    $(Event::$variant(data) => serde_json::to_value(data),)+
                }
            }

            /// Rebuilds an event from the channel it arrived on and its record.
            pub fn decode(channel: &str, record: serde_json::Value) -> Result<Self, DomainError> {
                match EventKind::from_channel(channel) {
                    $(Some(EventKind::$variant) => serde_json::from_value::<$variant>(record)
                        .map(Event::$variant)
                        .map_err(|source| DomainError::InvalidPayload {
                            channel: channel.to_string(),
                            source,
                        }),)+
                    None => Err(DomainError::UnknownChannel(channel.to_string())),
                }
            }
        }

        $(
            impl EventType for $variant {
                const KIND: EventKind = EventKind::$variant;

                fn from_event(event: &Event) -> Option<&Self> {
                    match event {
                        Event::$variant(data) => Some(data),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for Event {
                fn from(data: $variant) -> Self {
                    Event::$variant(data)
                }
            }

            impl From<$variant> for Message {
                fn from(data: $variant) -> Self {
                    Message::Event(Event::$variant(data))
                }
            }
        )+
    };
}

identity_events! {
    PermissionCreated => "permission_created",
    PermissionUpdated => "permission_updated",
    PermissionDeleted => "permission_deleted",
    RoleCreated => "role_created",
    RoleUpdated => "role_updated",
    RoleDeleted => "role_deleted",
    UserCreated => "user_created",
    UserUpdated => "user_updated",
    UserDeleted => "user_deleted",
    ApiKeyCreated => "api_key_created",
    ApiKeyUpdated => "api_key_updated",
    ApiKeyDeleted => "api_key_deleted",
}

impl Event {
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    pub fn channel(&self) -> &'static str {
        self.kind().channel()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCreated {
    pub permission: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionUpdated {
    /// Name of the permission before the update.
    pub permission: String,

    #[serde(flatten)]
    pub update: PermissionUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDeleted {
    pub permission: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCreated {
    pub role: String,

    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdated {
    /// Name of the role before the update.
    pub role: String,

    #[serde(flatten)]
    pub update: RoleUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDeleted {
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: EntityId,
    pub username: String,
    pub email: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

/// Data for the UserUpdated event.
///
/// Carries the identity the user had before the update plus what changed.
/// The new password itself is never part of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub user_id: EntityId,
    pub username: String,
    pub email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    #[serde(default)]
    pub password_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleted {
    pub user_id: EntityId,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyCreated {
    pub key: Uuid,
    pub user_id: EntityId,
    pub username: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyUpdated {
    /// Key value before the update.
    pub key: Uuid,

    #[serde(flatten)]
    pub update: ApiKeyUpdate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyDeleted {
    pub key: Uuid,
    pub user_id: EntityId,
    pub username: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_map_back_to_kinds() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_channel(kind.channel()), Some(*kind));
        }
        assert_eq!(EventKind::from_channel("order_created"), None);
    }

    #[test]
    fn record_is_flat() {
        let event = Event::RoleUpdated(RoleUpdated {
            role: "admin".to_string(),
            update: RoleUpdate {
                name: Some("root".to_string()),
                permissions: None,
            },
        });

        let record = event.to_record().unwrap();
        assert_eq!(record, serde_json::json!({"role": "admin", "name": "root"}));
    }

    #[test]
    fn decode_uses_channel_as_type_tag() {
        let record = serde_json::json!({"role": "admin", "permissions": ["read"]});
        let event = Event::decode("role_created", record).unwrap();

        assert_eq!(
            event,
            Event::RoleCreated(RoleCreated {
                role: "admin".to_string(),
                permissions: vec!["read".to_string()],
            })
        );
    }

    #[test]
    fn decode_rejects_unknown_channel() {
        let result = Event::decode("order_created", serde_json::json!({}));
        assert!(matches!(result, Err(DomainError::UnknownChannel(channel)) if channel == "order_created"));
    }

    #[test]
    fn decode_rejects_malformed_payload() {
        let result = Event::decode("role_deleted", serde_json::json!({"name": 1}));
        assert!(matches!(result, Err(DomainError::InvalidPayload { .. })));
    }

    #[test]
    fn typed_view_matches_variant_only() {
        let event = Event::RoleDeleted(RoleDeleted {
            role: "admin".to_string(),
        });

        assert!(RoleDeleted::from_event(&event).is_some());
        assert!(RoleCreated::from_event(&event).is_none());
    }
}

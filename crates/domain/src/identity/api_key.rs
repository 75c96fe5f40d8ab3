//! API key entity.

use chrono::{DateTime, Utc};
use common::EntityId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{Entity, EventQueue};

use super::events::{ApiKeyCreated, ApiKeyDeleted, ApiKeyUpdated, Event};
use super::user::User;

/// Partial update of an API key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyUpdate {
    /// Replacement key value (rotation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_key: Option<Uuid>,

    /// New owner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<EntityId>,
}

impl ApiKeyUpdate {
    /// Rotates the key to a freshly generated value.
    pub fn rotate() -> Self {
        Self {
            new_key: Some(Uuid::new_v4()),
            user_id: None,
        }
    }
}

/// A key granting programmatic access on behalf of a user.
#[derive(Debug, Clone)]
pub struct ApiKey {
    id: EntityId,
    key: Uuid,
    user_id: EntityId,
    issued_at: DateTime<Utc>,
    events: EventQueue,
}

impl ApiKey {
    /// Issues a new key for `owner` and records `ApiKeyCreated`.
    pub fn issue(owner: &User) -> Self {
        let mut api_key = Self::restore(EntityId::new(), Uuid::new_v4(), owner.id(), Utc::now());
        api_key.enqueue_event(Event::ApiKeyCreated(ApiKeyCreated {
            key: api_key.key,
            user_id: owner.id(),
            username: owner.username().to_string(),
            email: owner.email().to_string(),
            issued_at: api_key.issued_at,
        }));
        api_key
    }

    /// Rebuilds a key loaded from storage. No events are recorded.
    pub fn restore(id: EntityId, key: Uuid, user_id: EntityId, issued_at: DateTime<Utc>) -> Self {
        Self {
            id,
            key,
            user_id,
            issued_at,
            events: EventQueue::new(),
        }
    }

    pub fn key(&self) -> Uuid {
        self.key
    }

    pub fn user_id(&self) -> EntityId {
        self.user_id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn update(&mut self, update: ApiKeyUpdate) {
        let previous = self.key;
        if let Some(key) = update.new_key {
            self.key = key;
        }
        if let Some(user_id) = update.user_id {
            self.user_id = user_id;
        }
        self.enqueue_event(Event::ApiKeyUpdated(ApiKeyUpdated {
            key: previous,
            update,
        }));
    }

    /// Records `ApiKeyDeleted` on behalf of `owner`.
    pub fn revoke(&mut self, owner: &User) {
        let event = Event::ApiKeyDeleted(ApiKeyDeleted {
            key: self.key,
            user_id: owner.id(),
            username: owner.username().to_string(),
            email: owner.email().to_string(),
        });
        self.enqueue_event(event);
    }
}

impl Entity for ApiKey {
    fn kind() -> &'static str {
        "api_key"
    }

    fn id(&self) -> EntityId {
        self.id
    }

    fn events(&self) -> &EventQueue {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Password;

    #[test]
    fn issue_carries_owner_contact() {
        let owner = User::restore(
            EntityId::new(),
            "bob",
            Password::new("pw"),
            "bob@domain.tld",
            vec![],
        );
        let mut api_key = ApiKey::issue(&owner);

        assert_eq!(api_key.user_id(), owner.id());
        match api_key.drain_events().as_slice() {
            [Event::ApiKeyCreated(created)] => {
                assert_eq!(created.key, api_key.key());
                assert_eq!(created.email, "bob@domain.tld");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn rotation_reports_previous_key() {
        let mut api_key = ApiKey::restore(EntityId::new(), Uuid::new_v4(), EntityId::new(), Utc::now());
        let previous = api_key.key();

        api_key.update(ApiKeyUpdate::rotate());

        assert_ne!(api_key.key(), previous);
        assert!(matches!(
            &api_key.drain_events()[..],
            [Event::ApiKeyUpdated(ApiKeyUpdated { key, .. })] if *key == previous
        ));
    }
}

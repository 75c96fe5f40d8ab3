//! Permission entity.

use common::EntityId;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EventQueue};

use super::events::{Event, PermissionCreated, PermissionDeleted, PermissionUpdated};

/// Partial update of a permission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionUpdate {
    /// New permission name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PermissionUpdate {
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// A named capability that roles can grant.
#[derive(Debug, Clone)]
pub struct Permission {
    id: EntityId,
    name: String,
    events: EventQueue,
}

impl Permission {
    /// Creates a new permission and records `PermissionCreated`.
    pub fn create(name: impl Into<String>) -> Self {
        let mut permission = Self::restore(EntityId::new(), name);
        permission.enqueue_event(Event::PermissionCreated(PermissionCreated {
            permission: permission.name.clone(),
        }));
        permission
    }

    /// Rebuilds a permission loaded from storage. No events are recorded.
    pub fn restore(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            events: EventQueue::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update(&mut self, update: PermissionUpdate) {
        let previous = self.name.clone();
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        self.enqueue_event(Event::PermissionUpdated(PermissionUpdated {
            permission: previous,
            update,
        }));
    }

    /// Records `PermissionDeleted`; the row itself is removed by the repository.
    pub fn delete(&mut self) {
        let event = Event::PermissionDeleted(PermissionDeleted {
            permission: self.name.clone(),
        });
        self.enqueue_event(event);
    }
}

impl Entity for Permission {
    fn kind() -> &'static str {
        "permission"
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

    #[test]
    fn create_records_created_event() {
        let mut permission = Permission::create("users:read");

        let events = permission.drain_events();
        assert_eq!(
            events,
            vec![Event::PermissionCreated(PermissionCreated {
                permission: "users:read".to_string()
            })]
        );
        assert!(permission.drain_events().is_empty());
    }

    #[test]
    fn restore_records_nothing() {
        let permission = Permission::restore(EntityId::new(), "users:read");
        assert!(permission.events().is_empty());
    }

    #[test]
    fn update_renames_and_reports_previous_name() {
        let mut permission = Permission::restore(EntityId::new(), "users:read");
        permission.update(PermissionUpdate::rename("users:list"));

        assert_eq!(permission.name(), "users:list");
        let events = permission.drain_events();
        assert!(matches!(
            &events[..],
            [Event::PermissionUpdated(PermissionUpdated { permission, .. })] if permission == "users:read"
        ));
    }
}

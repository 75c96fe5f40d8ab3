//! Role entity.

use common::EntityId;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EventQueue};

use super::events::{Event, RoleCreated, RoleDeleted, RoleUpdated};

/// Partial update of a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleUpdate {
    /// New role name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Replacement permission set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

/// A named bundle of permissions.
#[derive(Debug, Clone)]
pub struct Role {
    id: EntityId,
    name: String,
    permissions: Vec<String>,
    events: EventQueue,
}

impl Role {
    /// Creates a new role and records `RoleCreated`.
    pub fn create(name: impl Into<String>, permissions: Vec<String>) -> Self {
        let mut role = Self::restore(EntityId::new(), name, permissions);
        role.enqueue_event(Event::RoleCreated(RoleCreated {
            role: role.name.clone(),
            permissions: role.permissions.clone(),
        }));
        role
    }

    /// Rebuilds a role loaded from storage. No events are recorded.
    pub fn restore(id: EntityId, name: impl Into<String>, permissions: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            permissions,
            events: EventQueue::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn update(&mut self, update: RoleUpdate) {
        let previous = self.name.clone();
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(permissions) = &update.permissions {
            self.permissions = permissions.clone();
        }
        self.enqueue_event(Event::RoleUpdated(RoleUpdated {
            role: previous,
            update,
        }));
    }

    /// Records `RoleDeleted`; the row itself is removed by the repository.
    pub fn delete(&mut self) {
        let event = Event::RoleDeleted(RoleDeleted {
            role: self.name.clone(),
        });
        self.enqueue_event(event);
    }
}

impl Entity for Role {
    fn kind() -> &'static str {
        "role"
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

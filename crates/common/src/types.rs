use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row identity of a permission, role, user or API key.
///
/// Minted when the entity is created and stored as the row's primary key.
/// Repositories key their identity map on it, so two loads of the same row
/// inside one unit of work resolve to the same tracked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Mints a fresh identity for a newly created entity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Rebuilds the identity of a stored row.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The primary key value bound into storage queries.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn minted_ids_do_not_collide() {
        let ids: HashSet<EntityId> = (0..1000).map(|_| EntityId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn stored_row_keeps_its_identity() {
        let id = EntityId::new();
        let reloaded = EntityId::from_uuid(id.as_uuid());
        assert_eq!(reloaded, id);
        assert_eq!(reloaded.to_string(), id.as_uuid().to_string());
    }

    #[test]
    fn serializes_as_a_bare_uuid_string() {
        let id = EntityId::new();
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::Value::String(id.as_uuid().to_string()));
    }
}

//! Tracked identity repository.
//!
//! Every entity a scope creates or loads is kept in an identity map, in the
//! order it was first seen. Loading the same row twice hands back the instance
//! already tracked, so events pending on it are never duplicated or lost.

use std::collections::HashMap;

use common::EntityId;
use domain::{
    ApiKey, ApiKeyUpdate, Entity, Event, Password, Permission, PermissionUpdate, Role, RoleUpdate,
    User, UserLookup, UserUpdate,
};
use uuid::Uuid;

use crate::{
    ApiKeyQuery, IdentitySession, PermissionQuery, Result, RoleQuery, StorageError, UserQuery,
};

/// An entity held in the identity map.
#[derive(Debug)]
pub enum TrackedEntity {
    Permission(Permission),
    Role(Role),
    User(User),
    ApiKey(ApiKey),
}

macro_rules! tracked_kinds {
    ($($variant:ident => $as_ref:ident, $as_mut:ident, $expect:ident);+ $(;)?) => {
        impl TrackedEntity {
            pub fn id(&self) -> EntityId {
                match self {
                    $(TrackedEntity::$variant(entity) => entity.id(),)+
                }
            }

            pub fn kind(&self) -> &'static str {
                match self {
                    $(TrackedEntity::$variant(_) => $variant::kind(),)+
                }
            }

            pub fn pending_events(&self) -> usize {
                match self {
                    $(TrackedEntity::$variant(entity) => entity.events().len(),)+
                }
            }

            pub fn drain_events(&mut self) -> Vec<Event> {
                match self {
                    $(TrackedEntity::$variant(entity) => entity.drain_events(),)+
                }
            }

            $(
                pub fn $as_ref(&self) -> Option<&$variant> {
                    match self {
                        TrackedEntity::$variant(entity) => Some(entity),
                        _ => None,
                    }
                }

                pub fn $as_mut(&mut self) -> Option<&mut $variant> {
                    match self {
                        TrackedEntity::$variant(entity) => Some(entity),
                        _ => None,
                    }
                }

                fn $expect(&mut self) -> Result<&mut $variant> {
                    match self {
                        TrackedEntity::$variant(entity) => Ok(entity),
                        other => Err(StorageError::KindMismatch {
                            id: other.id(),
                            expected: $variant::kind(),
                            found: other.kind(),
                        }),
                    }
                }
            )+
        }

        $(
            impl From<$variant> for TrackedEntity {
                fn from(entity: $variant) -> Self {
                    TrackedEntity::$variant(entity)
                }
            }
        )+
    };
}

tracked_kinds! {
    Permission => as_permission, as_permission_mut, expect_permission;
    Role => as_role, as_role_mut, expect_role;
    User => as_user, as_user_mut, expect_user;
    ApiKey => as_api_key, as_api_key_mut, expect_api_key;
}

/// Domain-level CRUD over one storage session, with entity tracking.
///
/// Reads never fail on absence: a missing row is `None` or an empty list.
/// Writes call the storage primitive unconditionally; guards such as "create
/// only if absent" belong to the caller.
pub struct IdentityRepository {
    session: Box<dyn IdentitySession>,
    tracked: Vec<TrackedEntity>,
    index: HashMap<EntityId, usize>,
}

impl IdentityRepository {
    pub fn new(session: Box<dyn IdentitySession>) -> Self {
        Self {
            session,
            tracked: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of distinct entities tracked so far.
    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    pub fn tracked(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.tracked.iter()
    }

    /// Drains the pending events of every tracked entity, in the order the
    /// entities were first tracked.
    pub fn collect_events(&mut self) -> Vec<Event> {
        self.tracked
            .iter_mut()
            .flat_map(TrackedEntity::drain_events)
            .collect()
    }

    #[tracing::instrument(skip(self), fields(tracked = self.tracked.len()))]
    pub async fn commit(&mut self) -> Result<()> {
        match self.session.commit().await {
            Ok(()) => {
                metrics::counter!("storage_commits_total").increment(1);
                Ok(())
            }
            Err(e) => {
                metrics::counter!("storage_commit_failures_total").increment(1);
                tracing::warn!(error = %e, "commit failed");
                Err(e)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn rollback(&mut self) -> Result<()> {
        metrics::counter!("storage_rollbacks_total").increment(1);
        self.session.rollback().await
    }

    /// Registers `entity` unless an entity with the same id is already
    /// tracked, and returns the slot of the tracked instance.
    fn track(&mut self, entity: impl Into<TrackedEntity>) -> usize {
        let entity = entity.into();
        let id = entity.id();
        if let Some(&slot) = self.index.get(&id) {
            return slot;
        }
        self.tracked.push(entity);
        let slot = self.tracked.len() - 1;
        self.index.insert(id, slot);
        slot
    }

    fn track_all<T: Into<TrackedEntity>>(&mut self, entities: Vec<T>) -> Vec<usize> {
        entities
            .into_iter()
            .map(|entity| self.track(entity))
            .collect()
    }

    // Permissions

    pub async fn create_permission(&mut self, name: &str) -> Result<&mut Permission> {
        let permission = Permission::create(name);
        self.session.insert_permission(&permission).await?;
        let slot = self.track(permission);
        self.tracked[slot].expect_permission()
    }

    pub async fn get_permission(&mut self, name: &str) -> Result<Option<&mut Permission>> {
        let found = self
            .session
            .find_permissions(&PermissionQuery::named(name))
            .await?;
        let Some(permission) = found.into_iter().next() else {
            return Ok(None);
        };
        let slot = self.track(permission);
        Ok(self.tracked[slot].as_permission_mut())
    }

    pub async fn query_permissions(&mut self, query: &PermissionQuery) -> Result<Vec<&Permission>> {
        let found = self.session.find_permissions(query).await?;
        let slots = self.track_all(found);
        Ok(slots
            .into_iter()
            .filter_map(|slot| self.tracked[slot].as_permission())
            .collect())
    }

    pub async fn update_permission(&mut self, id: EntityId, update: &PermissionUpdate) -> Result<()> {
        self.session.update_permission(id, update).await
    }

    pub async fn delete_permission(&mut self, id: EntityId) -> Result<()> {
        self.session.delete_permission(id).await
    }

    // Roles

    pub async fn create_role(&mut self, name: &str, permissions: Vec<String>) -> Result<&mut Role> {
        let role = Role::create(name, permissions);
        self.session.insert_role(&role).await?;
        let slot = self.track(role);
        self.tracked[slot].expect_role()
    }

    pub async fn get_role(&mut self, name: &str) -> Result<Option<&mut Role>> {
        let found = self.session.find_roles(&RoleQuery::named(name)).await?;
        let Some(role) = found.into_iter().next() else {
            return Ok(None);
        };
        let slot = self.track(role);
        Ok(self.tracked[slot].as_role_mut())
    }

    pub async fn query_roles(&mut self, query: &RoleQuery) -> Result<Vec<&Role>> {
        let found = self.session.find_roles(query).await?;
        let slots = self.track_all(found);
        Ok(slots
            .into_iter()
            .filter_map(|slot| self.tracked[slot].as_role())
            .collect())
    }

    pub async fn update_role(&mut self, id: EntityId, update: &RoleUpdate) -> Result<()> {
        self.session.update_role(id, update).await
    }

    pub async fn delete_role(&mut self, id: EntityId) -> Result<()> {
        self.session.delete_role(id).await
    }

    // Users

    pub async fn create_user(
        &mut self,
        username: &str,
        password: Password,
        email: &str,
        roles: Vec<String>,
    ) -> Result<&mut User> {
        let user = User::create(username, password, email, roles);
        self.session.insert_user(&user).await?;
        let slot = self.track(user);
        self.tracked[slot].expect_user()
    }

    /// Loads the user matching every field set on `lookup`. An empty lookup
    /// matches nobody.
    pub async fn get_user(&mut self, lookup: &UserLookup) -> Result<Option<&mut User>> {
        if lookup.is_empty() {
            return Ok(None);
        }
        let found = self
            .session
            .find_users(&UserQuery::from_lookup(lookup))
            .await?;
        let Some(user) = found.into_iter().next() else {
            return Ok(None);
        };
        let slot = self.track(user);
        Ok(self.tracked[slot].as_user_mut())
    }

    pub async fn get_user_by_id(&mut self, id: EntityId) -> Result<Option<&mut User>> {
        if let Some(&slot) = self.index.get(&id) {
            return Ok(self.tracked[slot].as_user_mut());
        }
        let found = self.session.find_users(&UserQuery::for_id(id)).await?;
        let Some(user) = found.into_iter().next() else {
            return Ok(None);
        };
        let slot = self.track(user);
        Ok(self.tracked[slot].as_user_mut())
    }

    pub async fn query_users(&mut self, query: &UserQuery) -> Result<Vec<&User>> {
        let found = self.session.find_users(query).await?;
        let slots = self.track_all(found);
        Ok(slots
            .into_iter()
            .filter_map(|slot| self.tracked[slot].as_user())
            .collect())
    }

    pub async fn update_user(&mut self, id: EntityId, update: &UserUpdate) -> Result<()> {
        self.session.update_user(id, update).await
    }

    pub async fn delete_user(&mut self, id: EntityId) -> Result<()> {
        self.session.delete_user(id).await
    }

    // API keys

    pub async fn create_api_key(&mut self, owner: &User) -> Result<&mut ApiKey> {
        let api_key = ApiKey::issue(owner);
        self.session.insert_api_key(&api_key).await?;
        let slot = self.track(api_key);
        self.tracked[slot].expect_api_key()
    }

    pub async fn get_api_key(&mut self, key: Uuid) -> Result<Option<&mut ApiKey>> {
        let found = self.session.find_api_keys(&ApiKeyQuery::for_key(key)).await?;
        let Some(api_key) = found.into_iter().next() else {
            return Ok(None);
        };
        let slot = self.track(api_key);
        Ok(self.tracked[slot].as_api_key_mut())
    }

    pub async fn query_api_keys(&mut self, query: &ApiKeyQuery) -> Result<Vec<&ApiKey>> {
        let found = self.session.find_api_keys(query).await?;
        let slots = self.track_all(found);
        Ok(slots
            .into_iter()
            .filter_map(|slot| self.tracked[slot].as_api_key())
            .collect())
    }

    pub async fn update_api_key(&mut self, id: EntityId, update: &ApiKeyUpdate) -> Result<()> {
        self.session.update_api_key(id, update).await
    }

    pub async fn delete_api_key(&mut self, id: EntityId) -> Result<()> {
        self.session.delete_api_key(id).await
    }
}

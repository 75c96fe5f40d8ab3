use async_trait::async_trait;
use common::EntityId;
use domain::{
    ApiKey, ApiKeyUpdate, Permission, PermissionUpdate, Role, RoleUpdate, User, UserUpdate,
};

use crate::{ApiKeyQuery, PermissionQuery, Result, RoleQuery, UserQuery};

/// Storage primitives for one transaction.
///
/// Implementations hold the transaction for their whole lifetime. Writes stay
/// invisible to other sessions until [`IdentitySession::commit`]; dropping a
/// session without committing discards them.
///
/// Rows come back as freshly restored entities with empty event queues.
#[async_trait]
pub trait IdentitySession: Send {
    async fn insert_permission(&mut self, permission: &Permission) -> Result<()>;

    async fn find_permissions(&mut self, query: &PermissionQuery) -> Result<Vec<Permission>>;

    async fn update_permission(&mut self, id: EntityId, update: &PermissionUpdate) -> Result<()>;

    async fn delete_permission(&mut self, id: EntityId) -> Result<()>;

    async fn insert_role(&mut self, role: &Role) -> Result<()>;

    async fn find_roles(&mut self, query: &RoleQuery) -> Result<Vec<Role>>;

    async fn update_role(&mut self, id: EntityId, update: &RoleUpdate) -> Result<()>;

    async fn delete_role(&mut self, id: EntityId) -> Result<()>;

    async fn insert_user(&mut self, user: &User) -> Result<()>;

    async fn find_users(&mut self, query: &UserQuery) -> Result<Vec<User>>;

    async fn update_user(&mut self, id: EntityId, update: &UserUpdate) -> Result<()>;

    /// Deletes a user together with the API keys it owns.
    async fn delete_user(&mut self, id: EntityId) -> Result<()>;

    async fn insert_api_key(&mut self, api_key: &ApiKey) -> Result<()>;

    async fn find_api_keys(&mut self, query: &ApiKeyQuery) -> Result<Vec<ApiKey>>;

    async fn update_api_key(&mut self, id: EntityId, update: &ApiKeyUpdate) -> Result<()>;

    async fn delete_api_key(&mut self, id: EntityId) -> Result<()>;

    /// Makes every write since the last commit durable.
    ///
    /// The session stays usable afterwards.
    async fn commit(&mut self) -> Result<()>;

    /// Discards every write since the last commit.
    async fn rollback(&mut self) -> Result<()>;
}

/// Opens sessions against one storage engine.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn IdentitySession>>;
}

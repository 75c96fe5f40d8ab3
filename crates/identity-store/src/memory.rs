use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use common::EntityId;
use domain::{
    ApiKey, ApiKeyUpdate, Entity, Permission, PermissionUpdate, Role, RoleUpdate, User, UserUpdate,
};
use tokio::sync::RwLock;

use crate::{
    ApiKeyQuery, IdentitySession, PermissionQuery, Result, RoleQuery, SessionFactory,
    StorageError, UserQuery,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    permissions: Vec<Permission>,
    roles: Vec<Role>,
    users: Vec<User>,
    api_keys: Vec<ApiKey>,
}

/// One staged write, replayed onto the live tables at commit.
#[derive(Debug, Clone)]
enum Write {
    InsertPermission(Permission),
    UpdatePermission(EntityId, PermissionUpdate),
    DeletePermission(EntityId),
    InsertRole(Role),
    UpdateRole(EntityId, RoleUpdate),
    DeleteRole(EntityId),
    InsertUser(User),
    UpdateUser(EntityId, UserUpdate),
    DeleteUser(EntityId),
    InsertApiKey(ApiKey),
    UpdateApiKey(EntityId, ApiKeyUpdate),
    DeleteApiKey(EntityId),
}

impl Tables {
    fn ensure_unique<T>(
        rows: &[T],
        entity: &'static str,
        key: &str,
        skip: Option<EntityId>,
        clashes: impl Fn(&T) -> bool,
    ) -> Result<()>
    where
        T: Entity,
    {
        let taken = rows
            .iter()
            .any(|row| Some(row.id()) != skip && clashes(row));
        if taken {
            return Err(StorageError::Conflict {
                entity,
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, write: &Write) -> Result<()> {
        match write {
            Write::InsertPermission(permission) => {
                Self::ensure_unique(
                    &self.permissions,
                    "permission",
                    permission.name(),
                    None,
                    |row| row.name() == permission.name(),
                )?;
                self.permissions.push(permission.clone());
            }
            Write::UpdatePermission(id, update) => {
                if let Some(ref name) = update.name {
                    Self::ensure_unique(&self.permissions, "permission", name, Some(*id), |row| {
                        row.name() == name
                    })?;
                }
                if let Some(row) = self.permissions.iter_mut().find(|row| row.id() == *id) {
                    row.update(update.clone());
                    row.drain_events();
                }
            }
            Write::DeletePermission(id) => self.permissions.retain(|row| row.id() != *id),
            Write::InsertRole(role) => {
                Self::ensure_unique(&self.roles, "role", role.name(), None, |row| {
                    row.name() == role.name()
                })?;
                self.roles.push(role.clone());
            }
            Write::UpdateRole(id, update) => {
                if let Some(ref name) = update.name {
                    Self::ensure_unique(&self.roles, "role", name, Some(*id), |row| {
                        row.name() == name
                    })?;
                }
                if let Some(row) = self.roles.iter_mut().find(|row| row.id() == *id) {
                    row.update(update.clone());
                    row.drain_events();
                }
            }
            Write::DeleteRole(id) => self.roles.retain(|row| row.id() != *id),
            Write::InsertUser(user) => {
                Self::ensure_unique(&self.users, "user", user.username(), None, |row| {
                    row.username() == user.username()
                })?;
                Self::ensure_unique(&self.users, "user", user.email(), None, |row| {
                    row.email() == user.email()
                })?;
                self.users.push(user.clone());
            }
            Write::UpdateUser(id, update) => {
                if let Some(ref username) = update.username {
                    Self::ensure_unique(&self.users, "user", username, Some(*id), |row| {
                        row.username() == username
                    })?;
                }
                if let Some(ref email) = update.email {
                    Self::ensure_unique(&self.users, "user", email, Some(*id), |row| {
                        row.email() == email
                    })?;
                }
                if let Some(row) = self.users.iter_mut().find(|row| row.id() == *id) {
                    row.update(update.clone());
                    row.drain_events();
                }
            }
            Write::DeleteUser(id) => {
                self.users.retain(|row| row.id() != *id);
                self.api_keys.retain(|row| row.user_id() != *id);
            }
            Write::InsertApiKey(api_key) => {
                let key = api_key.key().to_string();
                Self::ensure_unique(&self.api_keys, "api_key", &key, None, |row| {
                    row.key() == api_key.key()
                })?;
                self.api_keys.push(api_key.clone());
            }
            Write::UpdateApiKey(id, update) => {
                if let Some(new_key) = update.new_key {
                    let key = new_key.to_string();
                    Self::ensure_unique(&self.api_keys, "api_key", &key, Some(*id), |row| {
                        row.key() == new_key
                    })?;
                }
                if let Some(row) = self.api_keys.iter_mut().find(|row| row.id() == *id) {
                    row.update(update.clone());
                    row.drain_events();
                }
            }
            Write::DeleteApiKey(id) => self.api_keys.retain(|row| row.id() != *id),
        }
        Ok(())
    }
}

/// In-memory identity database for testing.
///
/// Each session reads from a private snapshot and logs its writes. Commit
/// replays the log onto the live tables under the write lock, re-checking
/// uniqueness, so concurrent sessions never overwrite each other's rows.
#[derive(Clone, Default)]
pub struct InMemoryDatabase {
    tables: Arc<RwLock<Tables>>,
    fail_on_commit: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryDatabase {
    /// Creates a new empty in-memory database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every following commit to fail until switched off.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn permissions(&self) -> Vec<Permission> {
        self.tables.read().await.permissions.clone()
    }

    pub async fn roles(&self) -> Vec<Role> {
        self.tables.read().await.roles.clone()
    }

    pub async fn users(&self) -> Vec<User> {
        self.tables.read().await.users.clone()
    }

    pub async fn api_keys(&self) -> Vec<ApiKey> {
        self.tables.read().await.api_keys.clone()
    }

    /// Clears every table.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

#[async_trait]
impl SessionFactory for InMemoryDatabase {
    async fn begin(&self) -> Result<Box<dyn IdentitySession>> {
        let staged = self.tables.read().await.clone();
        Ok(Box::new(InMemorySession {
            database: self.clone(),
            staged,
            pending: Vec::new(),
        }))
    }
}

/// Session over a snapshot of an [`InMemoryDatabase`].
pub struct InMemorySession {
    database: InMemoryDatabase,
    staged: Tables,
    pending: Vec<Write>,
}

impl InMemorySession {
    fn stage(&mut self, write: Write) -> Result<()> {
        self.staged.apply(&write)?;
        self.pending.push(write);
        Ok(())
    }
}

#[async_trait]
impl IdentitySession for InMemorySession {
    async fn insert_permission(&mut self, permission: &Permission) -> Result<()> {
        self.stage(Write::InsertPermission(permission.clone()))
    }

    async fn find_permissions(&mut self, query: &PermissionQuery) -> Result<Vec<Permission>> {
        Ok(self
            .staged
            .permissions
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect())
    }

    async fn update_permission(&mut self, id: EntityId, update: &PermissionUpdate) -> Result<()> {
        self.stage(Write::UpdatePermission(id, update.clone()))
    }

    async fn delete_permission(&mut self, id: EntityId) -> Result<()> {
        self.stage(Write::DeletePermission(id))
    }

    async fn insert_role(&mut self, role: &Role) -> Result<()> {
        self.stage(Write::InsertRole(role.clone()))
    }

    async fn find_roles(&mut self, query: &RoleQuery) -> Result<Vec<Role>> {
        Ok(self
            .staged
            .roles
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect())
    }

    async fn update_role(&mut self, id: EntityId, update: &RoleUpdate) -> Result<()> {
        self.stage(Write::UpdateRole(id, update.clone()))
    }

    async fn delete_role(&mut self, id: EntityId) -> Result<()> {
        self.stage(Write::DeleteRole(id))
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        self.stage(Write::InsertUser(user.clone()))
    }

    async fn find_users(&mut self, query: &UserQuery) -> Result<Vec<User>> {
        Ok(self
            .staged
            .users
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect())
    }

    async fn update_user(&mut self, id: EntityId, update: &UserUpdate) -> Result<()> {
        self.stage(Write::UpdateUser(id, update.clone()))
    }

    async fn delete_user(&mut self, id: EntityId) -> Result<()> {
        self.stage(Write::DeleteUser(id))
    }

    async fn insert_api_key(&mut self, api_key: &ApiKey) -> Result<()> {
        self.stage(Write::InsertApiKey(api_key.clone()))
    }

    async fn find_api_keys(&mut self, query: &ApiKeyQuery) -> Result<Vec<ApiKey>> {
        Ok(self
            .staged
            .api_keys
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect())
    }

    async fn update_api_key(&mut self, id: EntityId, update: &ApiKeyUpdate) -> Result<()> {
        self.stage(Write::UpdateApiKey(id, update.clone()))
    }

    async fn delete_api_key(&mut self, id: EntityId) -> Result<()> {
        self.stage(Write::DeleteApiKey(id))
    }

    async fn commit(&mut self) -> Result<()> {
        if self.database.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StorageError::CommitFailed(
                "in-memory commit failure injected".to_string(),
            ));
        }
        let mut tables = self.database.tables.write().await;
        // Replay onto a scratch copy so a conflict leaves the live tables untouched.
        let mut replayed = tables.clone();
        for write in &self.pending {
            replayed.apply(write)?;
        }
        *tables = replayed;
        self.staged = tables.clone();
        self.pending.clear();
        self.database.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        self.staged = self.database.tables.read().await.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use domain::Password;

    use super::*;

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let database = InMemoryDatabase::new();
        let mut session = database.begin().await.unwrap();

        session
            .insert_role(&Role::create("admin", vec![]))
            .await
            .unwrap();
        assert!(database.roles().await.is_empty());

        session.commit().await.unwrap();
        assert_eq!(database.roles().await.len(), 1);
        assert_eq!(database.commit_count(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let database = InMemoryDatabase::new();
        let mut session = database.begin().await.unwrap();

        session
            .insert_permission(&Permission::create("read"))
            .await
            .unwrap();
        session.rollback().await.unwrap();

        let found = session
            .find_permissions(&PermissionQuery::new())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn dropped_session_discards_staged_writes() {
        let database = InMemoryDatabase::new();
        {
            let mut session = database.begin().await.unwrap();
            session
                .insert_role(&Role::create("admin", vec![]))
                .await
                .unwrap();
        }

        assert!(database.roles().await.is_empty());
    }

    #[tokio::test]
    async fn injected_commit_failure() {
        let database = InMemoryDatabase::new();
        database.set_fail_on_commit(true);
        let mut session = database.begin().await.unwrap();
        session
            .insert_role(&Role::create("admin", vec![]))
            .await
            .unwrap();

        let result = session.commit().await;

        assert!(matches!(result, Err(StorageError::CommitFailed(_))));
        assert!(database.roles().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_sessions_keep_both_commits() {
        let database = InMemoryDatabase::new();
        let mut first = database.begin().await.unwrap();
        let mut second = database.begin().await.unwrap();

        first
            .insert_role(&Role::create("a", vec![]))
            .await
            .unwrap();
        second
            .insert_role(&Role::create("b", vec![]))
            .await
            .unwrap();
        first.commit().await.unwrap();
        second.commit().await.unwrap();

        let mut names: Vec<String> = database
            .roles()
            .await
            .iter()
            .map(|role| role.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(database.commit_count(), 2);
    }

    #[tokio::test]
    async fn stale_duplicate_fails_at_commit() {
        let database = InMemoryDatabase::new();
        let mut first = database.begin().await.unwrap();
        let mut second = database.begin().await.unwrap();

        first
            .insert_permission(&Permission::create("read"))
            .await
            .unwrap();
        second
            .insert_permission(&Permission::create("read"))
            .await
            .unwrap();
        first.commit().await.unwrap();
        let result = second.commit().await;

        assert!(matches!(
            result,
            Err(StorageError::Conflict {
                entity: "permission",
                ..
            })
        ));
        assert_eq!(database.permissions().await.len(), 1);
    }

    #[tokio::test]
    async fn commit_refreshes_the_session_view() {
        let database = InMemoryDatabase::new();
        let mut reader = database.begin().await.unwrap();
        let mut writer = database.begin().await.unwrap();
        writer
            .insert_role(&Role::create("admin", vec![]))
            .await
            .unwrap();
        writer.commit().await.unwrap();

        reader
            .insert_role(&Role::create("user", vec![]))
            .await
            .unwrap();
        reader.commit().await.unwrap();

        let found = reader.find_roles(&RoleQuery::new()).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let database = InMemoryDatabase::new();
        let mut session = database.begin().await.unwrap();
        let alice = User::create("alice", Password::new("pw"), "shared@domain.tld", vec![]);
        let bob = User::create("bob", Password::new("pw"), "shared@domain.tld", vec![]);

        session.insert_user(&alice).await.unwrap();
        let result = session.insert_user(&bob).await;

        assert!(matches!(
            result,
            Err(StorageError::Conflict { entity: "user", .. })
        ));
    }

    #[tokio::test]
    async fn deleting_a_user_removes_its_keys() {
        let database = InMemoryDatabase::new();
        let mut session = database.begin().await.unwrap();
        let alice = User::create("alice", Password::new("pw"), "alice@domain.tld", vec![]);
        session.insert_user(&alice).await.unwrap();
        session.insert_api_key(&ApiKey::issue(&alice)).await.unwrap();

        session.delete_user(alice.id()).await.unwrap();

        let keys = session.find_api_keys(&ApiKeyQuery::new()).await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn update_applies_partial_changes() {
        let database = InMemoryDatabase::new();
        let mut session = database.begin().await.unwrap();
        let role = Role::create("admin", vec!["read".to_string()]);
        session.insert_role(&role).await.unwrap();

        session
            .update_role(
                role.id(),
                &RoleUpdate {
                    name: Some("root".to_string()),
                    permissions: None,
                },
            )
            .await
            .unwrap();

        let found = session.find_roles(&RoleQuery::named("root")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].permissions(), ["read".to_string()]);
        assert!(found[0].events().is_empty());
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EntityId;
use domain::{
    ApiKey, ApiKeyUpdate, Entity, Password, Permission, PermissionUpdate, Role, RoleUpdate, User,
    UserUpdate,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{
    ApiKeyQuery, IdentitySession, PermissionQuery, Result, RoleQuery, SessionFactory,
    StorageError, UserQuery,
};

/// Opens PostgreSQL-backed identity sessions.
#[derive(Clone)]
pub struct PostgresSessionFactory {
    pool: PgPool,
}

impl PostgresSessionFactory {
    /// Creates a new factory over a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionFactory for PostgresSessionFactory {
    async fn begin(&self) -> Result<Box<dyn IdentitySession>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresSession {
            pool: self.pool.clone(),
            tx: Some(tx),
        }))
    }
}

/// One database transaction.
///
/// After a commit or rollback the next statement opens a new transaction on
/// the same pool. Dropping the session rolls back whatever is open.
pub struct PostgresSession {
    pool: PgPool,
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresSession {
    async fn transaction(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        let tx = match self.tx.take() {
            Some(tx) => tx,
            None => self.pool.begin().await?,
        };
        Ok(self.tx.insert(tx))
    }

    fn row_to_permission(row: PgRow) -> Result<Permission> {
        Ok(Permission::restore(
            EntityId::from_uuid(row.try_get::<Uuid, _>("id")?),
            row.try_get::<String, _>("permission")?,
        ))
    }

    fn row_to_role(row: PgRow) -> Result<Role> {
        let permissions: Json<Vec<String>> = row.try_get("permissions")?;
        Ok(Role::restore(
            EntityId::from_uuid(row.try_get::<Uuid, _>("id")?),
            row.try_get::<String, _>("role")?,
            permissions.0,
        ))
    }

    fn row_to_user(row: PgRow) -> Result<User> {
        let roles: Json<Vec<String>> = row.try_get("roles")?;
        Ok(User::restore(
            EntityId::from_uuid(row.try_get::<Uuid, _>("id")?),
            row.try_get::<String, _>("username")?,
            Password::new(row.try_get::<String, _>("password")?),
            row.try_get::<String, _>("email")?,
            roles.0,
        ))
    }

    fn row_to_api_key(row: PgRow) -> Result<ApiKey> {
        Ok(ApiKey::restore(
            EntityId::from_uuid(row.try_get::<Uuid, _>("id")?),
            row.try_get("key")?,
            EntityId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            row.try_get::<DateTime<Utc>, _>("issued_at")?,
        ))
    }
}

/// Maps unique-constraint violations to [`StorageError::Conflict`].
fn conflict_or(error: sqlx::Error, entity: &'static str, key: &str) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = error
        && db_err.is_unique_violation()
    {
        return StorageError::Conflict {
            entity,
            key: key.to_string(),
        };
    }
    StorageError::Database(error)
}

#[async_trait]
impl IdentitySession for PostgresSession {
    async fn insert_permission(&mut self, permission: &Permission) -> Result<()> {
        let tx = self.transaction().await?;
        sqlx::query("INSERT INTO permissions (id, permission) VALUES ($1, $2)")
            .bind(permission.id().as_uuid())
            .bind(permission.name())
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict_or(e, "permission", permission.name()))?;
        Ok(())
    }

    async fn find_permissions(&mut self, query: &PermissionQuery) -> Result<Vec<Permission>> {
        let tx = self.transaction().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, permission
            FROM permissions
            WHERE ($1::text[] IS NULL OR permission = ANY($1))
            ORDER BY permission ASC
            "#,
        )
        .bind(query.names.clone())
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(Self::row_to_permission).collect()
    }

    async fn update_permission(&mut self, id: EntityId, update: &PermissionUpdate) -> Result<()> {
        let key = update.name.clone().unwrap_or_default();
        let tx = self.transaction().await?;
        sqlx::query("UPDATE permissions SET permission = COALESCE($2, permission) WHERE id = $1")
            .bind(id.as_uuid())
            .bind(update.name.as_deref())
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict_or(e, "permission", &key))?;
        Ok(())
    }

    async fn delete_permission(&mut self, id: EntityId) -> Result<()> {
        let tx = self.transaction().await?;
        sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_role(&mut self, role: &Role) -> Result<()> {
        let permissions = serde_json::to_value(role.permissions())?;
        let tx = self.transaction().await?;
        sqlx::query("INSERT INTO roles (id, role, permissions) VALUES ($1, $2, $3)")
            .bind(role.id().as_uuid())
            .bind(role.name())
            .bind(permissions)
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict_or(e, "role", role.name()))?;
        Ok(())
    }

    async fn find_roles(&mut self, query: &RoleQuery) -> Result<Vec<Role>> {
        let tx = self.transaction().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, role, permissions
            FROM roles
            WHERE ($1::text[] IS NULL OR role = ANY($1))
              AND ($2::text IS NULL OR permissions @> jsonb_build_array($2::text))
            ORDER BY role ASC
            "#,
        )
        .bind(query.names.clone())
        .bind(query.permission.as_deref())
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(Self::row_to_role).collect()
    }

    async fn update_role(&mut self, id: EntityId, update: &RoleUpdate) -> Result<()> {
        let permissions = update
            .permissions
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let key = update.name.clone().unwrap_or_default();
        let tx = self.transaction().await?;
        sqlx::query(
            r#"
            UPDATE roles
            SET role = COALESCE($2, role),
                permissions = COALESCE($3, permissions)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(update.name.as_deref())
        .bind(permissions)
        .execute(&mut **tx)
        .await
        .map_err(|e| conflict_or(e, "role", &key))?;
        Ok(())
    }

    async fn delete_role(&mut self, id: EntityId) -> Result<()> {
        let tx = self.transaction().await?;
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        let roles = serde_json::to_value(user.roles())?;
        let tx = self.transaction().await?;
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password, email, roles)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.username())
        .bind(user.password().expose())
        .bind(user.email())
        .bind(roles)
        .execute(&mut **tx)
        .await
        .map_err(|e| conflict_or(e, "user", user.username()))?;
        Ok(())
    }

    async fn find_users(&mut self, query: &UserQuery) -> Result<Vec<User>> {
        let tx = self.transaction().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, username, password, email, roles
            FROM users
            WHERE ($1::uuid IS NULL OR id = $1)
              AND ($2::text[] IS NULL OR username = ANY($2))
              AND ($3::text[] IS NULL OR email = ANY($3))
              AND ($4::text IS NULL OR roles @> jsonb_build_array($4::text))
            ORDER BY username ASC
            "#,
        )
        .bind(query.id.map(|id| id.as_uuid()))
        .bind(query.usernames.clone())
        .bind(query.emails.clone())
        .bind(query.role.as_deref())
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(Self::row_to_user).collect()
    }

    async fn update_user(&mut self, id: EntityId, update: &UserUpdate) -> Result<()> {
        let roles = update.roles.as_ref().map(serde_json::to_value).transpose()?;
        let key = update
            .username
            .clone()
            .or_else(|| update.email.clone())
            .unwrap_or_default();
        let tx = self.transaction().await?;
        sqlx::query(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                password = COALESCE($3, password),
                email = COALESCE($4, email),
                roles = COALESCE($5, roles)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(update.username.as_deref())
        .bind(update.password.as_ref().map(Password::expose))
        .bind(update.email.as_deref())
        .bind(roles)
        .execute(&mut **tx)
        .await
        .map_err(|e| conflict_or(e, "user", &key))?;
        Ok(())
    }

    async fn delete_user(&mut self, id: EntityId) -> Result<()> {
        let tx = self.transaction().await?;
        // api_keys rows go with it through ON DELETE CASCADE
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn insert_api_key(&mut self, api_key: &ApiKey) -> Result<()> {
        let key = api_key.key().to_string();
        let tx = self.transaction().await?;
        sqlx::query("INSERT INTO api_keys (id, key, user_id, issued_at) VALUES ($1, $2, $3, $4)")
            .bind(api_key.id().as_uuid())
            .bind(api_key.key())
            .bind(api_key.user_id().as_uuid())
            .bind(api_key.issued_at())
            .execute(&mut **tx)
            .await
            .map_err(|e| conflict_or(e, "api_key", &key))?;
        Ok(())
    }

    async fn find_api_keys(&mut self, query: &ApiKeyQuery) -> Result<Vec<ApiKey>> {
        let tx = self.transaction().await?;
        let rows = sqlx::query(
            r#"
            SELECT id, key, user_id, issued_at
            FROM api_keys
            WHERE ($1::uuid[] IS NULL OR key = ANY($1))
              AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY issued_at ASC
            "#,
        )
        .bind(query.keys.clone())
        .bind(query.user_id.map(|id| id.as_uuid()))
        .fetch_all(&mut **tx)
        .await?;

        rows.into_iter().map(Self::row_to_api_key).collect()
    }

    async fn update_api_key(&mut self, id: EntityId, update: &ApiKeyUpdate) -> Result<()> {
        let key = update.new_key.map(|key| key.to_string()).unwrap_or_default();
        let tx = self.transaction().await?;
        sqlx::query(
            r#"
            UPDATE api_keys
            SET key = COALESCE($2, key),
                user_id = COALESCE($3, user_id)
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(update.new_key)
        .bind(update.user_id.map(|id| id.as_uuid()))
        .execute(&mut **tx)
        .await
        .map_err(|e| conflict_or(e, "api_key", &key))?;
        Ok(())
    }

    async fn delete_api_key(&mut self, id: EntityId) -> Result<()> {
        let tx = self.transaction().await?;
        sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit()
                .await
                .map_err(|e| StorageError::CommitFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

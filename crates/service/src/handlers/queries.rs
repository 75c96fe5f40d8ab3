//! Read-side helpers.
//!
//! Each opens its own scope, copies the result out of the repository and
//! exits. Nothing is ever committed, so no events leak out of a read.

use common::EntityId;
use domain::{ApiKey, Permission, Role, User, UserLookup};
use identity_store::{ApiKeyQuery, PermissionQuery, RoleQuery, StorageError, UserQuery};
use uuid::Uuid;

use crate::unit_of_work::UnitOfWork;

pub async fn get_permission(
    uow: &mut UnitOfWork,
    name: &str,
) -> Result<Option<Permission>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo.get_permission(name).await.map(|found| found.cloned()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

pub async fn query_permissions(
    uow: &mut UnitOfWork,
    query: &PermissionQuery,
) -> Result<Vec<Permission>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo
            .query_permissions(query)
            .await
            .map(|found| found.into_iter().cloned().collect()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

pub async fn get_role(uow: &mut UnitOfWork, name: &str) -> Result<Option<Role>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo.get_role(name).await.map(|found| found.cloned()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

pub async fn query_roles(
    uow: &mut UnitOfWork,
    query: &RoleQuery,
) -> Result<Vec<Role>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo
            .query_roles(query)
            .await
            .map(|found| found.into_iter().cloned().collect()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

pub async fn get_user(
    uow: &mut UnitOfWork,
    lookup: &UserLookup,
) -> Result<Option<User>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo.get_user(lookup).await.map(|found| found.cloned()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

pub async fn get_user_by_id(
    uow: &mut UnitOfWork,
    id: EntityId,
) -> Result<Option<User>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo.get_user_by_id(id).await.map(|found| found.cloned()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

pub async fn query_users(
    uow: &mut UnitOfWork,
    query: &UserQuery,
) -> Result<Vec<User>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo
            .query_users(query)
            .await
            .map(|found| found.into_iter().cloned().collect()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

pub async fn get_api_key(uow: &mut UnitOfWork, key: Uuid) -> Result<Option<ApiKey>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo.get_api_key(key).await.map(|found| found.cloned()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

pub async fn query_api_keys(
    uow: &mut UnitOfWork,
    query: &ApiKeyQuery,
) -> Result<Vec<ApiKey>, StorageError> {
    let outcome = match uow.enter().await {
        Ok(repo) => repo
            .query_api_keys(query)
            .await
            .map(|found| found.into_iter().cloned().collect()),
        Err(e) => Err(e),
    };
    uow.finish(outcome).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use domain::{Entity, Password};
    use identity_store::InMemoryDatabase;

    use super::*;

    async fn seeded() -> (InMemoryDatabase, UnitOfWork) {
        let database = InMemoryDatabase::new();
        let mut uow = UnitOfWork::new(Arc::new(database.clone()));
        let repo = uow.enter().await.unwrap();
        repo.create_role("admin", vec!["read".into()]).await.unwrap();
        let user = repo
            .create_user("alice", Password::new("secret"), "alice@domain.tld", vec!["admin".into()])
            .await
            .unwrap()
            .clone();
        repo.create_api_key(&user).await.unwrap();
        uow.commit().await.unwrap();
        uow.exit().await;
        uow.collect_new_events();
        (database, uow)
    }

    #[tokio::test]
    async fn reads_leave_no_scope_and_no_events() {
        let (_database, mut uow) = seeded().await;

        let role = get_role(&mut uow, "admin").await.unwrap().unwrap();
        assert_eq!(role.permissions(), ["read".to_string()]);
        assert!(!uow.is_active());
        assert!(uow.collect_new_events().is_empty());
    }

    #[tokio::test]
    async fn follows_key_to_owner() {
        let (_database, mut uow) = seeded().await;

        let user = get_user(&mut uow, &UserLookup::by_username("alice"))
            .await
            .unwrap()
            .unwrap();
        let keys = query_api_keys(&mut uow, &ApiKeyQuery::for_user(user.id()))
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);

        let key = get_api_key(&mut uow, keys[0].key()).await.unwrap().unwrap();
        let owner = get_user_by_id(&mut uow, key.user_id()).await.unwrap().unwrap();
        assert_eq!(owner.email(), "alice@domain.tld");
    }

    #[tokio::test]
    async fn missing_entities_are_none() {
        let (_database, mut uow) = seeded().await;

        assert!(get_permission(&mut uow, "write").await.unwrap().is_none());
        assert!(get_user(&mut uow, &UserLookup::default()).await.unwrap().is_none());
        assert!(query_users(&mut uow, &UserQuery::default().with_role("guest"))
            .await
            .unwrap()
            .is_empty());
    }
}

//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and run serially.
//! Run with:
//!
//! ```bash
//! cargo test -p identity-store --test postgres_integration
//! ```

use std::sync::Arc;

use domain::{Entity, Event, Password, RoleUpdate, UserLookup, UserUpdate};
use identity_store::{
    ApiKeyQuery, IdentityRepository, PostgresSessionFactory, RoleQuery, SessionFactory,
    StorageError,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_identity_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Fresh factory with its own pool and emptied tables
async fn get_test_factory() -> PostgresSessionFactory {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE api_keys, users, roles, permissions")
        .execute(&pool)
        .await
        .unwrap();

    PostgresSessionFactory::new(pool)
}

async fn repository(factory: &PostgresSessionFactory) -> IdentityRepository {
    IdentityRepository::new(factory.begin().await.unwrap())
}

#[tokio::test]
#[serial]
async fn committed_role_is_visible_to_new_sessions() {
    let factory = get_test_factory().await;

    let mut writer = repository(&factory).await;
    writer
        .create_role("admin", vec!["users:write".to_string()])
        .await
        .unwrap();
    writer.commit().await.unwrap();

    let mut reader = repository(&factory).await;
    let role = reader.get_role("admin").await.unwrap().unwrap();
    assert_eq!(role.permissions(), ["users:write".to_string()]);
    assert!(role.events().is_empty());
}

#[tokio::test]
#[serial]
async fn rollback_discards_writes() {
    let factory = get_test_factory().await;

    let mut repo = repository(&factory).await;
    repo.create_permission("read").await.unwrap();
    repo.rollback().await.unwrap();

    assert!(repo.get_permission("read").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn dropped_session_rolls_back() {
    let factory = get_test_factory().await;

    {
        let mut repo = repository(&factory).await;
        repo.create_role("ghost", vec![]).await.unwrap();
    }

    let mut repo = repository(&factory).await;
    assert!(repo.get_role("ghost").await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn session_keeps_working_after_commit() {
    let factory = get_test_factory().await;

    let mut repo = repository(&factory).await;
    repo.create_role("first", vec![]).await.unwrap();
    repo.commit().await.unwrap();
    repo.create_role("second", vec![]).await.unwrap();
    repo.commit().await.unwrap();

    let mut reader = repository(&factory).await;
    let roles = reader.query_roles(&RoleQuery::new()).await.unwrap();
    let names: Vec<_> = roles.iter().map(|role| role.name()).collect();
    assert_eq!(names, vec!["first", "second"]);
}

#[tokio::test]
#[serial]
async fn unique_violation_maps_to_conflict() {
    let factory = get_test_factory().await;

    let mut repo = repository(&factory).await;
    repo.create_role("admin", vec![]).await.unwrap();
    let result = repo.create_role("admin", vec![]).await;

    assert!(matches!(
        result,
        Err(StorageError::Conflict { entity: "role", .. })
    ));
}

#[tokio::test]
#[serial]
async fn partial_updates_keep_unset_columns() {
    let factory = get_test_factory().await;

    let mut repo = repository(&factory).await;
    let id = repo
        .create_role("admin", vec!["read".to_string()])
        .await
        .unwrap()
        .id();
    repo.update_role(
        id,
        &RoleUpdate {
            name: Some("root".to_string()),
            permissions: None,
        },
    )
    .await
    .unwrap();
    repo.commit().await.unwrap();

    let mut reader = repository(&factory).await;
    let roles = reader
        .query_roles(&RoleQuery::new().granting("read"))
        .await
        .unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].name(), "root");
}

#[tokio::test]
#[serial]
async fn user_update_and_key_cascade() {
    let factory = get_test_factory().await;

    let mut repo = repository(&factory).await;
    let owner = repo
        .create_user("alice", Password::new("pw"), "alice@domain.tld", vec![])
        .await
        .unwrap()
        .clone();
    repo.create_api_key(&owner).await.unwrap();
    repo.update_user(
        owner.id(),
        &UserUpdate {
            email: Some("alice@example.org".to_string()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    repo.commit().await.unwrap();

    let mut reader = repository(&factory).await;
    let user = reader
        .get_user(&UserLookup::by_email("alice@example.org"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.password().expose(), "pw");
    assert_eq!(
        reader
            .query_api_keys(&ApiKeyQuery::for_user(owner.id()))
            .await
            .unwrap()
            .len(),
        1
    );

    reader.delete_user(owner.id()).await.unwrap();
    reader.commit().await.unwrap();

    let mut after = repository(&factory).await;
    assert!(
        after
            .query_api_keys(&ApiKeyQuery::for_user(owner.id()))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[serial]
async fn tracked_events_survive_reload() {
    let factory = get_test_factory().await;

    let mut repo = repository(&factory).await;
    repo.create_role("admin", vec![]).await.unwrap();
    repo.get_role("admin").await.unwrap().unwrap().delete();

    let names: Vec<_> = repo.collect_events().iter().map(Event::name).collect();
    assert_eq!(names, vec!["RoleCreated", "RoleDeleted"]);
}

//! Transaction scope over one identity session.

use std::sync::Arc;

use domain::Event;
use identity_store::{IdentityRepository, SessionFactory, StorageError};

/// Owns at most one open repository scope and the events its commits
/// released.
///
/// A unit of work is created per dispatch. `enter` opens a fresh session,
/// `commit` makes its writes durable and harvests the events pending on every
/// tracked entity, and `exit` rolls back whatever was not committed. Events of
/// a scope that never commits are dropped with it.
pub struct UnitOfWork {
    sessions: Arc<dyn SessionFactory>,
    scope: Option<IdentityRepository>,
    harvest: Vec<Event>,
}

impl UnitOfWork {
    pub fn new(sessions: Arc<dyn SessionFactory>) -> Self {
        Self {
            sessions,
            scope: None,
            harvest: Vec::new(),
        }
    }

    /// Opens a new scope and returns its repository.
    ///
    /// A scope that is still open is rolled back and released first.
    #[tracing::instrument(skip(self))]
    pub async fn enter(&mut self) -> Result<&mut IdentityRepository, StorageError> {
        self.exit().await;
        let session = self.sessions.begin().await?;
        Ok(self.scope.insert(IdentityRepository::new(session)))
    }

    /// Repository of the open scope.
    pub fn repository(&mut self) -> Result<&mut IdentityRepository, StorageError> {
        self.scope.as_mut().ok_or(StorageError::NoActiveScope)
    }

    pub fn is_active(&self) -> bool {
        self.scope.is_some()
    }

    /// Commits the open scope and harvests the events of every tracked
    /// entity, in tracking order.
    pub async fn commit(&mut self) -> Result<(), StorageError> {
        let repository = self.repository()?;
        repository.commit().await?;
        let events = repository.collect_events();
        tracing::debug!(events = events.len(), "scope committed");
        self.harvest.extend(events);
        Ok(())
    }

    /// Rolls back anything not committed and releases the session.
    ///
    /// Calling it with no open scope does nothing.
    pub async fn exit(&mut self) {
        if let Some(mut repository) = self.scope.take()
            && let Err(e) = repository.rollback().await
        {
            tracing::warn!(error = %e, "rollback on exit failed");
        }
    }

    /// Exits the scope, then hands back `outcome` unchanged.
    pub async fn finish<T, E>(&mut self, outcome: Result<T, E>) -> Result<T, E> {
        self.exit().await;
        outcome
    }

    /// Takes every event harvested so far. A second call returns nothing
    /// until another commit succeeds.
    pub fn collect_new_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.harvest)
    }
}

#[cfg(test)]
mod tests {
    use domain::{Entity, RoleUpdate};
    use identity_store::InMemoryDatabase;

    use super::*;

    fn unit_of_work(database: &InMemoryDatabase) -> UnitOfWork {
        UnitOfWork::new(Arc::new(database.clone()))
    }

    #[tokio::test]
    async fn repository_requires_open_scope() {
        let database = InMemoryDatabase::new();
        let mut uow = unit_of_work(&database);

        assert!(matches!(uow.repository(), Err(StorageError::NoActiveScope)));
        uow.enter().await.unwrap();
        assert!(uow.repository().is_ok());
        uow.exit().await;
        assert!(!uow.is_active());
    }

    #[tokio::test]
    async fn commit_harvests_events_in_tracking_order() {
        let database = InMemoryDatabase::new();
        let mut uow = unit_of_work(&database);

        let repo = uow.enter().await.unwrap();
        repo.create_permission("read").await.unwrap();
        repo.create_role("admin", vec![]).await.unwrap();
        repo.get_permission("read").await.unwrap().unwrap().delete();
        uow.commit().await.unwrap();
        uow.exit().await;

        let names: Vec<_> = uow.collect_new_events().iter().map(Event::name).collect();
        assert_eq!(
            names,
            vec!["PermissionCreated", "PermissionDeleted", "RoleCreated"]
        );
        assert!(uow.collect_new_events().is_empty());
    }

    #[tokio::test]
    async fn exit_without_commit_rolls_back_and_drops_events() {
        let database = InMemoryDatabase::new();
        let mut uow = unit_of_work(&database);

        uow.enter()
            .await
            .unwrap()
            .create_role("admin", vec![])
            .await
            .unwrap();
        uow.exit().await;
        uow.exit().await;

        assert!(database.roles().await.is_empty());
        assert!(uow.collect_new_events().is_empty());
    }

    #[tokio::test]
    async fn failed_commit_releases_nothing() {
        let database = InMemoryDatabase::new();
        database.set_fail_on_commit(true);
        let mut uow = unit_of_work(&database);

        uow.enter()
            .await
            .unwrap()
            .create_role("admin", vec![])
            .await
            .unwrap();
        let result = uow.commit().await;
        uow.exit().await;

        assert!(matches!(result, Err(StorageError::CommitFailed(_))));
        assert!(uow.collect_new_events().is_empty());
    }

    #[tokio::test]
    async fn reentering_rolls_back_the_open_scope() {
        let database = InMemoryDatabase::new();
        let mut uow = unit_of_work(&database);

        uow.enter()
            .await
            .unwrap()
            .create_role("draft", vec![])
            .await
            .unwrap();
        let repo = uow.enter().await.unwrap();

        assert!(repo.get_role("draft").await.unwrap().is_none());
        assert_eq!(repo.tracked_len(), 0);
    }

    #[tokio::test]
    async fn events_after_commit_wait_for_the_next_commit() {
        let database = InMemoryDatabase::new();
        let mut uow = unit_of_work(&database);

        let repo = uow.enter().await.unwrap();
        let id = repo.create_role("admin", vec![]).await.unwrap().id();
        uow.commit().await.unwrap();

        let update = RoleUpdate {
            name: Some("root".to_string()),
            permissions: None,
        };
        let repo = uow.repository().unwrap();
        repo.get_role("admin").await.unwrap().unwrap().update(update.clone());
        repo.update_role(id, &update).await.unwrap();
        uow.exit().await;

        let names: Vec<_> = uow.collect_new_events().iter().map(Event::name).collect();
        assert_eq!(names, vec!["RoleCreated"]);
        assert_eq!(database.roles().await[0].name(), "admin");
    }
}

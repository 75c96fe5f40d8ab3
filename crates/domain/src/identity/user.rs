//! User entity.

use common::EntityId;

use crate::entity::{Entity, EventQueue};

use super::events::{Event, UserCreated, UserDeleted, UserUpdated};
use super::value_objects::Password;

/// Partial update of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password: Option<Password>,
    pub email: Option<String>,
    pub roles: Option<Vec<String>>,
}

/// A registered account.
#[derive(Debug, Clone)]
pub struct User {
    id: EntityId,
    username: String,
    password: Password,
    email: String,
    roles: Vec<String>,
    events: EventQueue,
}

impl User {
    /// Registers a new user and records `UserCreated`.
    pub fn create(
        username: impl Into<String>,
        password: Password,
        email: impl Into<String>,
        roles: Vec<String>,
    ) -> Self {
        let mut user = Self::restore(EntityId::new(), username, password, email, roles);
        user.enqueue_event(Event::UserCreated(UserCreated {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            roles: user.roles.clone(),
        }));
        user
    }

    /// Rebuilds a user loaded from storage. No events are recorded.
    pub fn restore(
        id: EntityId,
        username: impl Into<String>,
        password: Password,
        email: impl Into<String>,
        roles: Vec<String>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            password,
            email: email.into(),
            roles,
            events: EventQueue::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Password {
        &self.password
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn update(&mut self, update: UserUpdate) {
        let event = UserUpdated {
            user_id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            new_username: update.username.clone(),
            new_email: update.email.clone(),
            roles: update.roles.clone(),
            password_changed: update.password.is_some(),
        };

        if let Some(username) = update.username {
            self.username = username;
        }
        if let Some(password) = update.password {
            self.password = password;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(roles) = update.roles {
            self.roles = roles;
        }

        self.enqueue_event(Event::UserUpdated(event));
    }

    /// Records `UserDeleted`; the row itself is removed by the repository.
    pub fn delete(&mut self) {
        let event = Event::UserDeleted(UserDeleted {
            user_id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        });
        self.enqueue_event(event);
    }
}

impl Entity for User {
    fn kind() -> &'static str {
        "user"
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

use common::EntityId;
use domain::{ApiKey, Entity, Permission, Role, User, UserLookup};
use uuid::Uuid;

/// Criteria for selecting permissions.
#[derive(Debug, Clone, Default)]
pub struct PermissionQuery {
    /// Filter by permission name (any of these).
    pub names: Option<Vec<String>>,
}

impl PermissionQuery {
    /// Creates a query matching every permission.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new().names(vec![name.into()])
    }

    /// Filters by permission names (any of these).
    pub fn names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn matches(&self, permission: &Permission) -> bool {
        self.names
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == permission.name()))
    }
}

/// Criteria for selecting roles.
#[derive(Debug, Clone, Default)]
pub struct RoleQuery {
    /// Filter by role name (any of these).
    pub names: Option<Vec<String>>,

    /// Filter to roles granting this permission.
    pub permission: Option<String>,
}

impl RoleQuery {
    /// Creates a query matching every role.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new().names(vec![name.into()])
    }

    pub fn names(mut self, names: Vec<String>) -> Self {
        self.names = Some(names);
        self
    }

    /// Filters to roles granting `permission`.
    pub fn granting(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn matches(&self, role: &Role) -> bool {
        if let Some(ref names) = self.names
            && !names.iter().any(|n| n == role.name())
        {
            return false;
        }
        if let Some(ref permission) = self.permission
            && !role.grants(permission)
        {
            return false;
        }
        true
    }
}

/// Criteria for selecting users.
///
/// Every populated field must match.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Filter by id.
    pub id: Option<EntityId>,

    /// Filter by username (any of these).
    pub usernames: Option<Vec<String>>,

    /// Filter by email (any of these).
    pub emails: Option<Vec<String>>,

    /// Filter to users holding this role.
    pub role: Option<String>,
}

impl UserQuery {
    /// Creates a query matching every user.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_id(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Builds the query selecting the user a lookup identifies.
    pub fn from_lookup(lookup: &UserLookup) -> Self {
        Self {
            usernames: lookup.username.clone().map(|username| vec![username]),
            emails: lookup.email.clone().map(|email| vec![email]),
            ..Default::default()
        }
    }

    pub fn usernames(mut self, usernames: Vec<String>) -> Self {
        self.usernames = Some(usernames);
        self
    }

    pub fn emails(mut self, emails: Vec<String>) -> Self {
        self.emails = Some(emails);
        self
    }

    /// Filters to users holding `role`.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn matches(&self, user: &User) -> bool {
        if let Some(id) = self.id
            && id != user.id()
        {
            return false;
        }
        if let Some(ref usernames) = self.usernames
            && !usernames.iter().any(|u| u == user.username())
        {
            return false;
        }
        if let Some(ref emails) = self.emails
            && !emails.iter().any(|e| e == user.email())
        {
            return false;
        }
        if let Some(ref role) = self.role
            && !user.has_role(role)
        {
            return false;
        }
        true
    }
}

/// Criteria for selecting API keys.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyQuery {
    /// Filter by key value (any of these).
    pub keys: Option<Vec<Uuid>>,

    /// Filter to keys owned by this user.
    pub user_id: Option<EntityId>,
}

impl ApiKeyQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_key(key: Uuid) -> Self {
        Self {
            keys: Some(vec![key]),
            user_id: None,
        }
    }

    pub fn for_user(user_id: EntityId) -> Self {
        Self {
            keys: None,
            user_id: Some(user_id),
        }
    }

    pub fn matches(&self, api_key: &ApiKey) -> bool {
        if let Some(ref keys) = self.keys
            && !keys.contains(&api_key.key())
        {
            return false;
        }
        if let Some(owner) = self.user_id
            && owner != api_key.user_id()
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use domain::Password;

    use super::*;

    fn alice() -> User {
        User::restore(
            EntityId::new(),
            "alice",
            Password::new("pw"),
            "alice@domain.tld",
            vec!["user".to_string()],
        )
    }

    #[test]
    fn empty_queries_match_everything() {
        let user = alice();

        assert!(PermissionQuery::new().matches(&Permission::restore(EntityId::new(), "read")));
        assert!(RoleQuery::new().matches(&Role::restore(EntityId::new(), "admin", vec![])));
        assert!(UserQuery::new().matches(&user));
        assert!(ApiKeyQuery::new().matches(&ApiKey::restore(
            EntityId::new(),
            Uuid::new_v4(),
            user.id(),
            chrono::Utc::now(),
        )));
    }

    #[test]
    fn user_query_from_lookup_requires_every_field() {
        let user = alice();
        let both = UserLookup {
            username: Some("alice".to_string()),
            email: Some("alice@domain.tld".to_string()),
        };
        let mismatched = UserLookup {
            username: Some("alice".to_string()),
            email: Some("other@domain.tld".to_string()),
        };

        assert!(UserQuery::from_lookup(&both).matches(&user));
        assert!(!UserQuery::from_lookup(&mismatched).matches(&user));
        assert!(UserQuery::new().with_role("user").matches(&user));
        assert!(!UserQuery::for_id(EntityId::new()).matches(&user));
    }

    #[test]
    fn role_query_filters_by_permission() {
        let query = RoleQuery::new().granting("users:write");
        let admin = Role::restore(EntityId::new(), "admin", vec!["users:write".to_string()]);
        let guest = Role::restore(EntityId::new(), "guest", vec![]);

        assert!(query.matches(&admin));
        assert!(!query.matches(&guest));
    }
}

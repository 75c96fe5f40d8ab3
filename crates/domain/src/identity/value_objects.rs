//! Value objects shared by identity entities and commands.

/// Opaque password value.
///
/// Hashing is the storage adapter's concern; this type only keeps the secret
/// out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Identifies a user by username, email, or both.
///
/// A lookup with neither field set matches nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserLookup {
    pub username: Option<String>,
    pub email: Option<String>,
}

impl UserLookup {
    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            email: None,
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            username: None,
            email: Some(email.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

impl std::fmt::Display for UserLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.username, &self.email) {
            (Some(username), Some(email)) => write!(f, "{username} <{email}>"),
            (Some(username), None) => f.write_str(username),
            (None, Some(email)) => write!(f, "<{email}>"),
            (None, None) => f.write_str("<empty lookup>"),
        }
    }
}

/// Roles every deployment starts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultRole {
    User,
    Supporter,
    Moderator,
    Developer,
    Administrator,
}

impl DefaultRole {
    pub const ALL: [DefaultRole; 5] = [
        DefaultRole::User,
        DefaultRole::Supporter,
        DefaultRole::Moderator,
        DefaultRole::Developer,
        DefaultRole::Administrator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DefaultRole::User => "user",
            DefaultRole::Supporter => "supporter",
            DefaultRole::Moderator => "moderator",
            DefaultRole::Developer => "developer",
            DefaultRole::Administrator => "administrator",
        }
    }
}

impl std::fmt::Display for DefaultRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_debug_is_redacted() {
        let password = Password::new("hunter2");
        assert_eq!(format!("{password:?}"), "Password(***)");
        assert_eq!(password.expose(), "hunter2");
    }

    #[test]
    fn empty_lookup() {
        assert!(UserLookup::default().is_empty());
        assert!(!UserLookup::by_email("a@b.c").is_empty());
    }
}

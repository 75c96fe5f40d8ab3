//! Identity commands.
//!
//! Commands are requests to change state. Each kind has exactly one handler.

use uuid::Uuid;

use crate::message::{CommandType, Message};

use super::{ApiKeyUpdate, Password, PermissionUpdate, RoleUpdate, UserLookup, UserUpdate};

macro_rules! identity_commands {
    ($($variant:ident),+ $(,)?) => {
        /// Requests to change identity state.
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum Command {
            $($variant($variant),)+
        }

        /// Discriminant of [`Command`], used as the handler-table key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum CommandKind {
            $($variant,)+
        }

        impl CommandKind {
            /// Every command kind, in declaration order.
            pub const ALL: &'static [CommandKind] = &[$(CommandKind::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(CommandKind::$variant => stringify!($variant),)+
                }
            }
        }

        impl Command {
            pub fn kind(&self) -> CommandKind {
                match self {
                    $(Command::$variant(_) => CommandKind::$variant,)+
                }
            }
        }

        $(
            impl CommandType for $variant {
                const KIND: CommandKind = CommandKind::$variant;

                fn from_command(command: &Command) -> Option<&Self> {
                    match command {
                        Command::$variant(data) => Some(data),
                        _ => None,
                    }
                }
            }

            impl From<$variant> for Command {
                fn from(data: $variant) -> Self {
                    Command::$variant(data)
                }
            }

            impl From<$variant> for Message {
                fn from(data: $variant) -> Self {
                    Message::Command(Command::$variant(data))
                }
            }
        )+
    };
}

identity_commands! {
    CreatePermission,
    UpdatePermission,
    DeletePermission,
    CreateRole,
    UpdateRole,
    DeleteRole,
    CreateUser,
    UpdateUser,
    DeleteUser,
    CreateApiKey,
    UpdateApiKey,
    DeleteApiKey,
}

impl Command {
    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Command to create a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePermission {
    pub permission: String,
}

impl CreatePermission {
    pub fn new(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
        }
    }
}

/// Command to update a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePermission {
    pub permission: String,
    pub update: PermissionUpdate,
}

/// Command to delete a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePermission {
    pub permission: String,
}

impl DeletePermission {
    pub fn new(permission: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
        }
    }
}

/// Command to create a role with an initial set of permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRole {
    pub role: String,
    pub permissions: Vec<String>,
}

impl CreateRole {
    pub fn new(role: impl Into<String>, permissions: Vec<String>) -> Self {
        Self {
            role: role.into(),
            permissions,
        }
    }
}

/// Command to update a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRole {
    pub role: String,
    pub update: RoleUpdate,
}

/// Command to delete a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRole {
    pub role: String,
}

impl DeleteRole {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

/// Command to register a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUser {
    pub username: String,
    pub password: Password,
    pub email: String,
    pub roles: Vec<String>,
}

/// Command to update the user matching `lookup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUser {
    pub lookup: UserLookup,
    pub update: UserUpdate,
}

/// Command to delete the user matching `lookup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteUser {
    pub lookup: UserLookup,
}

/// Command to issue an API key for the user matching `user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateApiKey {
    pub user: UserLookup,
}

/// Command to update an API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateApiKey {
    pub key: Uuid,
    pub update: ApiKeyUpdate,
}

/// Command to revoke an API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteApiKey {
    pub key: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_distinct_name() {
        let mut names: Vec<_> = CommandKind::ALL.iter().map(|kind| kind.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CommandKind::ALL.len());
    }

    #[test]
    fn typed_view_matches_variant_only() {
        let command = Command::from(CreateRole::new("admin", vec![]));

        assert_eq!(command.kind(), CommandKind::CreateRole);
        assert_eq!(
            CreateRole::from_command(&command).map(|c| c.role.as_str()),
            Some("admin")
        );
        assert!(DeleteRole::from_command(&command).is_none());
    }
}

//! Identity entities and the commands and events that describe them.

pub mod commands;
pub mod events;

mod api_key;
mod permission;
mod role;
mod user;
mod value_objects;

pub use api_key::{ApiKey, ApiKeyUpdate};
pub use permission::{Permission, PermissionUpdate};
pub use role::{Role, RoleUpdate};
pub use user::{User, UserUpdate};
pub use value_objects::{DefaultRole, Password, UserLookup};

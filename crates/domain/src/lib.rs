//! Domain layer for the identity service.
//!
//! This crate provides:
//! - The `Entity` trait and the per-entity `EventQueue`
//! - Permission, Role, User and ApiKey entities
//! - The identity commands and events, and the `Message` type the bus routes

pub mod entity;
pub mod error;
pub mod identity;
pub mod message;

pub use entity::{Entity, EventQueue};
pub use error::DomainError;
pub use identity::commands::{Command, CommandKind};
pub use identity::{commands, events};
pub use identity::events::{Event, EventKind};
pub use identity::{
    ApiKey, ApiKeyUpdate, DefaultRole, Password, Permission, PermissionUpdate, Role, RoleUpdate,
    User, UserLookup, UserUpdate,
};
pub use message::{CommandType, EventType, Message};

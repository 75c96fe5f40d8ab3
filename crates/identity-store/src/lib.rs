//! Identity storage: session primitives, a tracked repository on top of them,
//! and in-memory and PostgreSQL engines.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod repository;
pub mod session;

pub use common::EntityId;
pub use error::{Result, StorageError};
pub use memory::{InMemoryDatabase, InMemorySession};
pub use postgres::{PostgresSession, PostgresSessionFactory};
pub use query::{ApiKeyQuery, PermissionQuery, RoleQuery, UserQuery};
pub use repository::{IdentityRepository, TrackedEntity};
pub use session::{IdentitySession, SessionFactory};

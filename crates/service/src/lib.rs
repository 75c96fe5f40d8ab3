//! Transactional command and event dispatch for the identity service.
//!
//! A [`MessageBus`] runs a command or an event through its handlers. Each
//! handler works inside the [`UnitOfWork`] of its [`HandlerContext`]; events
//! released by a commit are queued and dispatched in the same call, breadth
//! first, until nothing is left.

pub mod bootstrap;
pub mod broker;
pub mod bus;
pub mod consumer;
pub mod context;
pub mod error;
pub mod handlers;
pub mod notification;
pub mod registry;
pub mod unit_of_work;

pub use bootstrap::{
    Application, DEFAULT_ADMIN_ADDRESS, Dependencies, NoticeRoute, bootstrap, command_registry,
    consumer_registry, seed_default_roles,
};
#[cfg(feature = "redis")]
pub use broker::RedisBroker;
pub use broker::{Delivery, InMemoryBroker, MessageBroker, Publication};
pub use bus::MessageBus;
pub use consumer::EventConsumer;
pub use context::HandlerContext;
pub use error::{
    BootstrapError, BrokerError, BusError, HandlerError, NotificationError, RegistryError,
};
pub use notification::{InMemoryNotifier, LogNotifier, Notice, Notifier};
pub use registry::{DynCommandHandler, DynEventHandler, HandlerFuture, HandlerRegistry};
pub use unit_of_work::UnitOfWork;

//! Application wiring.

use std::sync::Arc;

use domain::DefaultRole;
use domain::commands::CreateRole;
use identity_store::SessionFactory;

use crate::broker::MessageBroker;
use crate::bus::MessageBus;
use crate::consumer::EventConsumer;
use crate::error::{BootstrapError, RegistryError};
use crate::handlers::{self, queries};
use crate::notification::Notifier;
use crate::registry::HandlerRegistry;

/// Address administrator notices go to when none is configured.
pub const DEFAULT_ADMIN_ADDRESS: &str = "admin@domain.tld";

/// Which side of the broker sends notices.
///
/// Exactly one side does, so every event is announced once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoticeRoute {
    /// The command bus sends notices while handling its own events. No
    /// consumer is built.
    #[default]
    Local,
    /// The command bus only publishes. The broker consumer sends the notices
    /// for every delivery, whichever instance published it.
    Consumer,
}

/// Collaborators shared by every bus.
#[derive(Clone)]
pub struct Dependencies {
    pub sessions: Arc<dyn SessionFactory>,
    pub broker: Arc<dyn MessageBroker>,
    pub notifier: Arc<dyn Notifier>,
    pub admin_address: String,
    pub notices: NoticeRoute,
}

impl Dependencies {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        broker: Arc<dyn MessageBroker>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            sessions,
            broker,
            notifier,
            admin_address: DEFAULT_ADMIN_ADDRESS.to_string(),
            notices: NoticeRoute::default(),
        }
    }

    pub fn with_admin_address(mut self, address: impl Into<String>) -> Self {
        self.admin_address = address.into();
        self
    }

    pub fn with_notice_route(mut self, notices: NoticeRoute) -> Self {
        self.notices = notices;
        self
    }

    fn bus(&self, registry: HandlerRegistry) -> MessageBus {
        MessageBus::new(
            registry,
            self.sessions.clone(),
            self.broker.clone(),
            self.notifier.clone(),
            self.admin_address.as_str(),
        )
    }
}

/// Command handlers and publication, with every command kind covered.
/// Notices are included when they are sent locally.
pub fn command_registry(notices: NoticeRoute) -> Result<HandlerRegistry, RegistryError> {
    let mut registry = HandlerRegistry::default();
    handlers::register_commands(&mut registry)?;
    if notices == NoticeRoute::Local {
        handlers::register_notifications(&mut registry);
    }
    handlers::register_publication(&mut registry);
    registry.validate()?;
    Ok(registry)
}

/// Notices only. Events arriving from the broker are never published again.
pub fn consumer_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::default();
    handlers::register_notifications(&mut registry);
    registry
}

/// The wired application.
pub struct Application {
    pub bus: Arc<MessageBus>,
    /// Present when notices are routed through the broker.
    pub consumer: Option<EventConsumer>,
}

/// Builds the command bus and, for [`NoticeRoute::Consumer`], the consumer.
/// Optionally seeds the default roles.
#[tracing::instrument(
    skip(dependencies),
    fields(admin = %dependencies.admin_address, notices = ?dependencies.notices)
)]
pub async fn bootstrap(
    dependencies: Dependencies,
    seed: bool,
) -> Result<Application, BootstrapError> {
    let bus = Arc::new(dependencies.bus(command_registry(dependencies.notices)?));
    let consumer = match dependencies.notices {
        NoticeRoute::Local => None,
        NoticeRoute::Consumer => Some(EventConsumer::new(
            Arc::new(dependencies.bus(consumer_registry())),
            dependencies.broker.clone(),
        )),
    };

    if seed {
        seed_default_roles(&bus).await?;
    }

    tracing::info!("application bootstrapped");
    Ok(Application { bus, consumer })
}

/// Creates every default role that does not exist yet. Returns how many were
/// created.
pub async fn seed_default_roles(bus: &MessageBus) -> Result<usize, BootstrapError> {
    let mut uow = bus.context().uow;
    let mut created = 0;

    for role in DefaultRole::ALL {
        if queries::get_role(&mut uow, role.as_str()).await?.is_some() {
            tracing::debug!(%role, "default role present");
            continue;
        }
        bus.handle(CreateRole::new(role.as_str(), Vec::new())).await?;
        created += 1;
    }

    tracing::info!(created, "default roles seeded");
    Ok(created)
}

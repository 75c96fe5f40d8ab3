//! Identity service binary support: backend selection, the HTTP router and
//! the wiring the binary runs.
//!
//! The router exposes health and Prometheus metrics only. Commands reach the
//! [`MessageBus`] from in-process callers and the broker consumer.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use identity_store::{InMemoryDatabase, PostgresSessionFactory, SessionFactory};
use metrics_exporter_prometheus::PrometheusHandle;
use service::{
    Application, Dependencies, InMemoryBroker, LogNotifier, MessageBroker, MessageBus,
    NoticeRoute, bootstrap,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use error::StartupError;

/// Shared state of the HTTP routes.
pub struct AppState {
    pub bus: Arc<MessageBus>,
    pub sessions: Arc<dyn SessionFactory>,
    /// Name of the storage backend in use.
    pub store: &'static str,
    /// Name of the broker backend in use.
    pub broker: &'static str,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/health/ready", get(routes::health::ready))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Everything the binary runs.
pub struct Service {
    pub state: Arc<AppState>,
    pub application: Application,
}

/// Picks the storage and broker backends named by `config`, then bootstraps
/// the application on them.
pub async fn build_service(config: &Config) -> Result<Service, StartupError> {
    let (sessions, store) = connect_store(config).await?;
    let (broker, broker_name) = connect_broker(config).await?;

    let notices = if config.consume_events {
        NoticeRoute::Consumer
    } else {
        NoticeRoute::Local
    };
    let dependencies = Dependencies::new(sessions.clone(), broker, Arc::new(LogNotifier))
        .with_admin_address(config.admin_email.as_str())
        .with_notice_route(notices);
    let application = bootstrap(dependencies, config.seed_defaults).await?;

    let state = Arc::new(AppState {
        bus: application.bus.clone(),
        sessions,
        store,
        broker: broker_name,
    });
    Ok(Service { state, application })
}

async fn connect_store(
    config: &Config,
) -> Result<(Arc<dyn SessionFactory>, &'static str), StartupError> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::info!("using in-memory store");
        return Ok((Arc::new(InMemoryDatabase::new()), "memory"));
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await?;
    let factory = PostgresSessionFactory::new(pool);
    factory.run_migrations().await?;
    tracing::info!("using PostgreSQL store");
    Ok((Arc::new(factory), "postgres"))
}

async fn connect_broker(
    config: &Config,
) -> Result<(Arc<dyn MessageBroker>, &'static str), StartupError> {
    let Some(url) = config.redis_url.as_deref() else {
        // The in-memory broker only loops back this process's own events.
        if config.consume_events {
            return Err(StartupError::Unsupported("CONSUME_EVENTS requires REDIS_URL".to_string()));
        }
        tracing::info!("using in-memory broker");
        return Ok((Arc::new(InMemoryBroker::new()), "memory"));
    };

    #[cfg(feature = "redis")]
    {
        let broker = service::RedisBroker::connect(url).await?;
        tracing::info!("using Redis broker");
        Ok((Arc::new(broker), "redis"))
    }

    #[cfg(not(feature = "redis"))]
    {
        let _ = url;
        Err(StartupError::Unsupported(
            "REDIS_URL is set but this build has no Redis support (enable the `redis` feature)"
                .to_string(),
        ))
    }
}

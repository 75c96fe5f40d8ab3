//! Integration tests for the API server.

use std::sync::OnceLock;

use api::config::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::commands::CreateRole;
use metrics_exporter_prometheus::PrometheusHandle;
use service::{BusError, HandlerError};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn setup(config: Config) -> (axum::Router, api::Service) {
    let service = api::build_service(&config).await.unwrap();
    let app = api::create_app(service.state.clone(), get_metrics_handle());
    (app, service)
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let (app, _service) = setup(Config::default()).await;

    let (status, json) = get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["store"], "memory");
    assert_eq!(json["broker"], "memory");
}

#[tokio::test]
async fn test_readiness_opens_a_session() {
    let (app, _service) = setup(Config::default()).await;

    let (status, json) = get_json(app, "/health/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ready");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_bus_counters() {
    let (app, service) = setup(Config::default()).await;
    service
        .state
        .bus
        .handle(CreateRole::new("auditor", vec![]))
        .await
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("bus_commands_total"));
}

#[tokio::test]
async fn test_default_roles_are_seeded() {
    let (_app, service) = setup(Config::default()).await;

    let result = service
        .state
        .bus
        .handle(CreateRole::new("administrator", vec![]))
        .await;

    assert!(matches!(
        result,
        Err(BusError::Command {
            source: HandlerError::AlreadyExists { entity: "role", .. },
            ..
        })
    ));
}

#[tokio::test]
async fn test_seeding_can_be_disabled() {
    let config = Config {
        seed_defaults: false,
        ..Config::default()
    };
    let (_app, service) = setup(config).await;

    service
        .state
        .bus
        .handle(CreateRole::new("administrator", vec![]))
        .await
        .unwrap();
}

#[cfg(not(feature = "redis"))]
#[tokio::test]
async fn test_redis_url_without_redis_support_is_rejected() {
    let config = Config {
        redis_url: Some("redis://localhost:6379".to_string()),
        ..Config::default()
    };

    let result = api::build_service(&config).await;

    assert!(matches!(result, Err(api::error::StartupError::Unsupported(_))));
}

#[tokio::test]
async fn test_consuming_without_redis_is_rejected() {
    let config = Config {
        consume_events: true,
        ..Config::default()
    };

    let result = api::build_service(&config).await;

    assert!(matches!(result, Err(api::error::StartupError::Unsupported(_))));
}

#[tokio::test]
async fn test_local_notices_build_no_consumer() {
    let (_app, service) = setup(Config::default()).await;

    assert!(service.application.consumer.is_none());
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _service) = setup(Config::default()).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/permissions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

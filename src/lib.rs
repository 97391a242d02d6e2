//! # Schemock - schema-driven mock API server
//!
//! Schemock turns a JSON Schema document into a running mock REST API:
//! CRUD routes for the schema's resource, custom routes declared under
//! `x-mock-routes`, and realistic generated data backed by an in-memory
//! store.
//!
//! ## Features
//!
//! - **Deterministic generation**: seeded random source, `$ref` cycle handling
//! - **Heuristics**: property names like `email` or `createdAt` get fitting values
//! - **Stateful CRUD**: created records are visible to later reads
//! - **Scenarios**: latency and fault injection (`slow`, `error-heavy`, `sad-path`)
//! - **Metrics**: Prometheus metrics for monitoring
//! - **Live Reload**: rebuild routes when the schema changes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schemock::adapters::metrics_handler::MetricsCollector;
//! use schemock::adapters::mock_service::MockService;
//! use schemock::config::Settings;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::new()?;
//!     let schema = settings.load_schema()?;
//!     let metrics = Arc::new(MetricsCollector::new()?);
//!     let service = MockService::from_settings(&settings, &schema, Some(metrics.clone()))?;
//!     let app = schemock::create_app(Arc::new(service), metrics);
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! Schemock follows Hexagonal Architecture:
//! - **Domain**: schema model, request/response types, errors
//! - **Adapters**: generator, store, route table, scenarios, HTTP handlers
//! - **Config**: Configuration management

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;

use crate::adapters::health_handler::HealthHandler;
use crate::adapters::http_handler;
use crate::adapters::metrics_handler::{MetricsCollector, MetricsHandler};
use crate::adapters::mock_service::MockService;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Creates the Axum application router.
///
/// Built-in endpoints (`/health*`, `/metrics`, `/_mock/state`) take
/// precedence; every other request is served from the mock route table.
pub fn create_app(service: Arc<MockService>, metrics: Arc<MetricsCollector>) -> Router {
    let health_handler = Arc::new(HealthHandler::new(service.clone()));
    let metrics_handler = Arc::new(MetricsHandler::new(metrics));

    Router::new()
        // Health check endpoints
        .route("/health", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.health().await }
            }
        }))
        .route("/health/ready", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.ready().await }
            }
        }))
        .route("/health/live", get({
            let handler = health_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.live().await }
            }
        }))
        // Metrics endpoint
        .route("/metrics", get({
            let handler = metrics_handler.clone();
            move || {
                let h = handler.clone();
                async move { h.metrics().await }
            }
        }))
        // Store inspection and reset
        .route(
            "/_mock/state",
            get(http_handler::get_state).delete(http_handler::reset_state),
        )
        .fallback(http_handler::dispatch)
        .with_state(service)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

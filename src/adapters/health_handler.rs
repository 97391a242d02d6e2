use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::mock_service::MockService;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub routes: usize,
    pub resource: String,
    pub scenario: String,
}

pub struct HealthHandler {
    service: Arc<MockService>,
    start_time: std::time::Instant,
}

impl HealthHandler {
    pub fn new(service: Arc<MockService>) -> Self {
        Self {
            service,
            start_time: std::time::Instant::now(),
        }
    }

    /// Basic health check - returns 200 if server is running
    pub async fn health(&self) -> impl IntoResponse {
        let table = self.service.routes();
        let status = HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            checks: HealthChecks {
                routes: table.len(),
                resource: table.resource_name().to_string(),
                scenario: self.service.scenario().scenario.to_string(),
            },
        };

        (StatusCode::OK, Json(status))
    }

    /// Readiness check - ready once a route table is loaded
    pub async fn ready(&self) -> impl IntoResponse {
        if !self.service.routes().is_empty() {
            (StatusCode::OK, Json(serde_json::json!({
                "status": "ready",
                "message": "Server is ready to accept requests"
            })))
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({
                "status": "not_ready",
                "message": "No routes loaded"
            })))
        }
    }

    /// Liveness check - returns 200 if server is alive
    pub async fn live(&self) -> impl IntoResponse {
        (StatusCode::OK, Json(serde_json::json!({
            "status": "alive",
            "message": "Server is alive"
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::route_table::RouteOptions;
    use crate::adapters::scenario::ScenarioPolicy;
    use crate::adapters::value_generator::ValueGenerator;
    use serde_json::json;

    fn handler() -> HealthHandler {
        let service = MockService::new(
            &json!({"title": "Order", "type": "object"}),
            RouteOptions::default(),
            Arc::new(ValueGenerator::seeded(1)),
            ScenarioPolicy::default(),
        )
        .unwrap();
        HealthHandler::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = handler().health().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_with_routes() {
        let response = handler().ready().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_live_endpoint() {
        let response = handler().live().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

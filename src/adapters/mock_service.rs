//! Request pipeline tying the route table, state store, generator and
//! scenario policy together.

use serde_json::Value;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::metrics_handler::MetricsCollector;
use super::random_source::RandomSource;
use super::route_table::{RouteOptions, RouteResponse, RouteTable};
use super::scenario::ScenarioPolicy;
use super::state_manager::ResourceStore;
use super::value_generator::ValueGenerator;
use crate::config::Settings;
use crate::domain::{GenerateOptions, MockError, MockRequest, MockResponse, MockResult};

pub struct MockService {
    table: RwLock<Arc<RouteTable>>,
    store: ResourceStore,
    generator: Arc<ValueGenerator>,
    scenario: ScenarioPolicy,
    scenario_random: Mutex<RandomSource>,
    route_options: RouteOptions,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MockService {
    pub fn new(
        schema: &Value,
        route_options: RouteOptions,
        generator: Arc<ValueGenerator>,
        scenario: ScenarioPolicy,
    ) -> MockResult<Self> {
        let table = RouteTable::build(schema, &route_options, generator.clone())?;
        Ok(Self {
            table: RwLock::new(Arc::new(table)),
            store: ResourceStore::new(),
            generator,
            scenario,
            scenario_random: Mutex::new(RandomSource::new()),
            route_options,
            metrics: None,
        })
    }

    /// Wire up generator, cache, scenario and route options from settings.
    pub fn from_settings(
        settings: &Settings,
        schema: &Value,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> anyhow::Result<Self> {
        let seed = settings.generator.seed;
        let mut generator = ValueGenerator::new(RandomSource::from_seed(seed))
            .with_tuning(settings.generator_tuning());
        if let Some(cache) = settings.build_cache() {
            generator = generator.with_cache(cache);
        }
        if let Some(metrics) = &metrics {
            generator = generator.with_metrics(metrics.clone());
        }

        let mut service = Self::new(
            schema,
            settings.route_options(),
            Arc::new(generator),
            settings.scenario_policy(),
        )?
        .with_scenario_source(RandomSource::from_seed(seed));
        service.metrics = metrics;
        info!(scenario = %service.scenario.scenario, "Mock service ready");
        Ok(service)
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Replace the random source scenario decisions are drawn from.
    pub fn with_scenario_source(self, random: RandomSource) -> Self {
        Self {
            scenario_random: Mutex::new(random),
            ..self
        }
    }

    pub fn routes(&self) -> Arc<RouteTable> {
        match self.table.read() {
            Ok(table) => table.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    pub fn generator(&self) -> &Arc<ValueGenerator> {
        &self.generator
    }

    pub fn scenario(&self) -> &ScenarioPolicy {
        &self.scenario
    }

    /// Rebuild the route table from a new schema. On failure the current
    /// table stays in place.
    pub fn reload(&self, schema: &Value) -> MockResult<()> {
        let table = RouteTable::build(schema, &self.route_options, self.generator.clone())?;
        {
            let mut current = match self.table.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *current = Arc::new(table);
        }
        if let Some(cache) = self.generator.cache() {
            cache.clear();
        }
        info!("Route table reloaded");
        Ok(())
    }

    /// Drop every stored record and cached value.
    pub async fn reset(&self) {
        self.store.reset().await;
        if let Some(cache) = self.generator.cache() {
            cache.clear();
        }
        info!("Mock state reset");
    }

    /// Route, apply the active scenario, then run the matched response.
    /// Errors are turned into structured error responses here.
    pub async fn handle(&self, mut request: MockRequest) -> MockResponse {
        let started = Instant::now();
        let table = self.routes();

        let Some(found) = table.match_route(request.method, &request.path) else {
            let error = MockError::RouteNotFound {
                method: request.method.to_string(),
                path: request.path.clone(),
            };
            debug!(%error, "Unmatched request");
            let response = MockResponse::from_error(&error);
            self.record(&request, "unmatched", response.status, started);
            return response;
        };
        let route = found.route;
        request.params = found.params;

        let decision = {
            let mut random = match self.scenario_random.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            self.scenario.evaluate(&mut random)
        };
        if let Some(fault) = self.scenario.apply(decision).await {
            if let Some(metrics) = &self.metrics {
                metrics.record_injected_fault(fault.status);
            }
            self.record(&request, &route.path, fault.status, started);
            return fault;
        }

        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match &route.response {
            RouteResponse::Static(body) => Ok(MockResponse::new(route.status, Some(body.clone()))),
            RouteResponse::Schema(schema) => {
                let options = GenerateOptions::default().strict(self.route_options.strict);
                self.generator
                    .generate_in(schema, table.root(), &options)
                    .map(|body| MockResponse::new(route.status, Some(body)))
            }
            RouteResponse::Handler(handler) => handler.handle(&request, &self.store).await,
        };

        let mut response = result.unwrap_or_else(|error| {
            warn!(method = %request.method, path = %request.path, %error, "Route failed");
            MockResponse::from_error(&error)
        });
        response.headers.extend(route.headers.iter().cloned());

        self.record(&request, &route.path, response.status, started);
        response
    }

    fn record(&self, request: &MockRequest, route: &str, status: u16, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(request.method.as_str(), route, status, started.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scenario::Scenario;
    use crate::domain::HttpMethod;
    use serde_json::json;

    fn user_schema() -> Value {
        json!({
            "title": "User",
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string"}
            },
            "required": ["id", "name"],
            "x-mock-routes": [
                {"method": "GET", "path": "/status", "response": {"ok": true}, "headers": {"X-Mock": "1"}},
                {"method": "GET", "path": "/profile", "schema": {"$ref": "#/definitions/Profile"}}
            ],
            "definitions": {
                "Profile": {
                    "type": "object",
                    "properties": {"bio": {"type": "string"}},
                    "required": ["bio"]
                }
            }
        })
    }

    fn service(scenario: ScenarioPolicy) -> MockService {
        MockService::new(
            &user_schema(),
            RouteOptions::default(),
            Arc::new(ValueGenerator::seeded(42)),
            scenario,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_route_is_404() {
        let service = service(ScenarioPolicy::default());
        let response = service
            .handle(MockRequest::new(HttpMethod::Get, "/nope"))
            .await;
        assert_eq!(response.status, 404);
        assert_eq!(response.body.unwrap()["error"]["kind"], "route_not_found");
    }

    #[tokio::test]
    async fn test_static_route_headers() {
        let service = service(ScenarioPolicy::default());
        let response = service
            .handle(MockRequest::new(HttpMethod::Get, "/status"))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Some(json!({"ok": true})));
        assert_eq!(response.header("x-mock"), Some("1"));
    }

    #[tokio::test]
    async fn test_schema_route_resolves_against_root() {
        let service = service(ScenarioPolicy::default());
        let response = service
            .handle(MockRequest::new(HttpMethod::Get, "/profile"))
            .await;
        assert_eq!(response.status, 200);
        assert!(response.body.unwrap()["bio"].is_string());
    }

    #[tokio::test]
    async fn test_crud_round_trip() {
        let service = service(ScenarioPolicy::default());
        let created = service
            .handle(MockRequest::new(HttpMethod::Post, "/api/users").with_body(json!({"name": "Ann"})))
            .await;
        assert_eq!(created.status, 201);
        let id = created.body.unwrap()["id"].to_string();

        let fetched = service
            .handle(MockRequest::new(HttpMethod::Get, format!("/api/users/{}", id)))
            .await;
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.body.unwrap()["name"], "Ann");
    }

    #[tokio::test]
    async fn test_injected_fault_skips_handler() {
        let service = service(ScenarioPolicy::new(Scenario::ErrorHeavy))
            .with_scenario_source(RandomSource::scripted(vec![0.0]));
        let response = service
            .handle(MockRequest::new(HttpMethod::Post, "/api/users").with_body(json!({"name": "Ann"})))
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(response.body.unwrap()["error"]["injected"], true);
        assert!(service.store().list("users").await.is_empty());
    }

    #[tokio::test]
    async fn test_reload_swaps_routes() {
        let service = service(ScenarioPolicy::default());
        service
            .reload(&json!({"title": "Post", "type": "object"}))
            .unwrap();
        let table = service.routes();
        assert_eq!(table.resource_name(), "posts");
        assert!(table.match_route(HttpMethod::Get, "/status").is_none());

        assert!(service.reload(&json!(42)).is_err());
        assert_eq!(service.routes().resource_name(), "posts");
    }

    #[tokio::test]
    async fn test_reset_clears_store() {
        let service = service(ScenarioPolicy::default());
        service
            .handle(MockRequest::new(HttpMethod::Post, "/api/users").with_body(json!({"name": "Ann"})))
            .await;
        service.reset().await;
        assert!(service.store().snapshot().await.is_empty());
    }
}

pub mod crud_handler;
pub mod health_handler;
pub mod heuristics;
pub mod http_handler;
pub mod metrics_handler;
pub mod mock_service;
pub mod pattern;
pub mod random_source;
pub mod result_cache;
pub mod route_table;
pub mod scenario;
pub mod state_manager;
pub mod value_generator;

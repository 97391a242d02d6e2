use clap::Parser;
use schemock::adapters::metrics_handler::MetricsCollector;
use schemock::adapters::mock_service::MockService;
use schemock::cli::Cli;
use schemock::config::{load_schema_file, watcher::ConfigWatcher, Settings};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let cli = Cli::parse();
    let settings = Settings::new_with_cli(&cli)?;
    let host = settings.server.host.clone();
    let port = settings.server.port;

    let schema = settings.load_schema()?;
    let metrics = Arc::new(MetricsCollector::new()?);
    let service = Arc::new(MockService::from_settings(
        &settings,
        &schema,
        Some(metrics.clone()),
    )?);

    // Start schema watcher
    let _watcher = match (&settings.schema.path, settings.schema.watch) {
        (Some(path), true) => {
            let service = service.clone();
            Some(ConfigWatcher::new(vec![path.clone()], move |path| {
                match load_schema_file(path) {
                    Ok(schema) => match service.reload(&schema) {
                        Ok(()) => info!("Schema reloaded successfully"),
                        Err(e) => error!("Rejected reloaded schema: {}", e),
                    },
                    Err(e) => error!("Failed to reload schema: {}", e),
                }
            })?)
        }
        _ => None,
    };

    info!("Starting Schemock on {}:{}", host, port);
    let app = schemock::create_app(service, metrics);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

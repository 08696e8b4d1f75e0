use api::auth::middleware::log_request;
use api::routes::routes;
use api::state::AppState;
use axum::{Router, middleware::from_fn};
use chrono::Utc;
use common::config::Config;
use db::models::attendance_credential;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing_appender::rolling;

#[tokio::main]
async fn main() {
    // Load configuration and initialize logging
    let config = Config::init();
    let _log_guard = init_logging(&config.log_file, config.log_to_stdout);

    // Set up dependencies
    let db = db::connect().await;
    let app_state = AppState::new(db);

    // Periodically delete long-expired credentials (hygiene only)
    spawn_credential_sweeper(app_state.clone());

    // Configure middleware
    let cors = CorsLayer::very_permissive();

    // Build app router
    let app = Router::new()
        .nest("/api", routes(app_state.clone()))
        .layer(from_fn(log_request))
        .layer(cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid address");

    println!(
        "Starting {} on http://{}:{}",
        config.project_name, config.host, config.port
    );

    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server crashed");
}

fn init_logging(log_file: &str, log_to_stdout: bool) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let env_filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("api=info"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if log_to_stdout {
        let stdout_layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(true);
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}

fn spawn_credential_sweeper(app_state: AppState) {
    let interval = Duration::from_secs(Config::get().credential_sweep_interval_seconds);
    let db = app_state.db_clone();

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match attendance_credential::Model::purge_expired(&db, Utc::now()).await {
                Ok(0) => {}
                Ok(n) => tracing::info!(purged = n, "Purged expired attendance credentials"),
                Err(e) => tracing::warn!(error = %e, "Credential purge sweep failed"),
            }
        }
    });
}

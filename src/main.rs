//! Local agent that polls ESSL/ZKTeco biometric terminals and republishes
//! punches over HTTP for a cloud drainer.

use std::net::SocketAddr;
use std::sync::Arc;

use zk_attendance_agent::config::{ConfigLoadResult, Settings};
use zk_attendance_agent::events::EventBus;
use zk_attendance_agent::http;
use zk_attendance_agent::scheduler::PollScheduler;
use zk_attendance_agent::store::Store;

fn data_dir() -> std::path::PathBuf {
    directories::ProjectDirs::from("", "", "zk-attendance-agent")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::path::PathBuf::from("."))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let dir = data_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::error!(error = %e, dir = %dir.display(), "failed to create data directory");
        std::process::exit(1);
    }

    let config_path = Settings::default_path();
    let settings = match Settings::try_load(&config_path) {
        ConfigLoadResult::Loaded(settings) => {
            tracing::info!(path = %config_path.display(), "config loaded");
            settings
        }
        ConfigLoadResult::Missing => {
            tracing::info!(path = %config_path.display(), "config missing, using defaults");
            Settings::default()
        }
        ConfigLoadResult::Invalid(e) => {
            tracing::error!(error = %e, path = %config_path.display(), "config invalid");
            std::process::exit(1);
        }
    };

    let store_path = dir.join("store.json");
    let store = match Store::open(&store_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, path = %store_path.display(), "failed to open store");
            std::process::exit(1);
        }
    };

    let events = EventBus::new();
    let scheduler = Arc::new(PollScheduler::new(store.clone(), events.clone(), settings.poll_interval));
    let settings = Arc::new(settings);

    let state = http::AppState { store, settings: settings.clone(), scheduler: scheduler.clone() };
    let app = http::router(state);

    scheduler.start();

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.api_port));
    tracing::info!(%addr, "listening");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
        })
        .await
    {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }

    scheduler.stop();
}

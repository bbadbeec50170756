//! Golf Score Back binary entrypoint wiring the REST API, the score backends and the init
//! supervisor.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use golf_score_back::{
    config::AppConfig,
    dao::backend::{ScoreBackend, local::LocalBackend},
    routes,
    services::backend_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;
    info!(
        data_dir = %config.data_dir.display(),
        namespace = %config.namespace,
        "local fallback store configured"
    );

    let local: Arc<dyn ScoreBackend> = Arc::new(LocalBackend::new(
        config.data_dir.clone(),
        config.namespace.clone(),
    ));
    let remote = build_remote(&config);
    let app_state = AppState::new(config, remote, local);

    // Initialization runs in the background; requests get "please wait" until it settles.
    backend_supervisor::start(&app_state).await;
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the Google Sheets backend, or `None` to run on the local store only.
#[cfg(feature = "sheets-store")]
fn build_remote(config: &AppConfig) -> Option<Arc<dyn ScoreBackend>> {
    use golf_score_back::dao::backend::sheets::RemoteBackend;

    match RemoteBackend::new(config.sheets_config()) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(err) => {
            tracing::error!(error = %err, "failed to build the Google Sheets client");
            None
        }
    }
}

#[cfg(not(feature = "sheets-store"))]
fn build_remote(_config: &AppConfig) -> Option<Arc<dyn ScoreBackend>> {
    info!("built without the sheets-store feature; only the local store is available");
    None
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::Router;
use tracing::{error, info};

use crate::catalog::ChannelCatalog;
use crate::config::Config;
use crate::playlist::PlaylistResolver;
use crate::segment::SegmentFetcher;
use crate::session::SessionManager;
use crate::telemetry::NoopSink;
use state::AppState;

/// Wires the HTTP client, session manager, catalog, playlist resolver and
/// segment fetcher together and builds the router. Split out from `serve`
/// so tests can exercise the router without binding a socket.
pub fn build_router(config: &Config) -> Router {
    let session = Arc::new(SessionManager::new(
        config.username.clone(),
        config.password.clone(),
        config.rest_base.clone(),
    ));
    let catalog = Arc::new(ChannelCatalog::new(Arc::clone(&session)));
    let playlists = Arc::new(PlaylistResolver::new(
        Arc::clone(&session),
        Arc::clone(&catalog),
        Arc::new(NoopSink),
        config.cdn_root.clone(),
    ));
    let segments = Arc::new(SegmentFetcher::new(
        Arc::clone(&session),
        Arc::clone(&playlists),
        config.cdn_root.clone(),
    ));

    let state = AppState { playlists, segments };

    Router::new()
        .fallback(handlers::dispatch)
        .with_state(state)
}

/// Binds and serves the HTTP front-end.
pub async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("0.0.0.0:{}", config.port);
    let app = build_router(&config);

    let listener = match tokio::net::TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind to address {addr}: {e}");
            return Err(e.into());
        }
    };

    info!("proxy listening on http://{addr}");

    if let Err(e) = axum::serve(listener, app).await {
        error!("server error: {e}");
        return Err(e.into());
    }

    Ok(())
}

//! Router assembly and the `axum::serve` entry point.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::{Error, Result};
use crate::rtp::RtpSinkHandle;
use crate::state::SharedState;

use super::handlers;

#[derive(Clone)]
pub struct ApiState {
    pub shared: Arc<SharedState>,
    pub rtp_sink: RtpSinkHandle,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/events", get(handlers::events))
        .route("/fmmod", get(handlers::fmmod_dump))
        .route("/fmmod/gain", post(handlers::fmmod_set_gain))
        .route("/fmmod/stereo_mode", post(handlers::fmmod_set_stereo_mode))
        .route("/fmmod/lpf", post(handlers::fmmod_set_lpf))
        .route("/fmmod/preemphasis", post(handlers::fmmod_set_preemphasis))
        .route("/rds", get(handlers::rds_dump))
        .route("/rds/enabled", post(handlers::rds_set_enabled))
        .route("/rds/pi", post(handlers::rds_set_pi))
        .route("/rds/pty", post(handlers::rds_set_pty))
        .route("/rds/ps", post(handlers::rds_set_ps))
        .route("/rds/ptyn", post(handlers::rds_set_ptyn))
        .route("/rds/rt", post(handlers::rds_set_rt))
        .route("/rds/ecc", post(handlers::rds_set_ecc))
        .route("/rds/lic", post(handlers::rds_set_lic))
        .route("/rtp", get(handlers::rtp_dump))
        .route("/rtp/receivers", post(handlers::rtp_receivers))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

/// Binds and serves the control API until the process is signalled to
/// shut down (the caller races this future against signal handling).
pub async fn run(bind_address: &str, state: ApiState) -> Result<()> {
    let listener = TcpListener::bind(bind_address).await.map_err(|e| Error::Http(format!("failed to bind {bind_address}: {e}")))?;
    info!(%bind_address, "control API listening");
    let router = build_router(state);
    axum::serve(listener, router).await.map_err(|e| Error::Http(format!("control API server error: {e}")))?;
    Ok(())
}

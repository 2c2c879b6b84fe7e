//! HTTP API module
//!
//! The status-card context exposed over HTTP: the live card, the record,
//! and the three command actuators.

pub mod handlers;
pub mod responses;

use std::{sync::Arc, time::Instant};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{state::TimerContext, utils::format_uptime};
use handlers::*;

/// Shared state behind every handler
pub struct ServerState {
    pub ctx: Arc<TimerContext>,
    pub start_time: Instant,
    pub host: String,
    pub port: u16,
}

impl ServerState {
    pub fn new(ctx: Arc<TimerContext>, host: impl Into<String>, port: u16) -> Self {
        Self {
            ctx,
            start_time: Instant::now(),
            host: host.into(),
            port,
        }
    }

    pub fn uptime(&self) -> String {
        format_uptime(self.start_time.elapsed())
    }
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/card", get(card_handler))
        .route("/status", get(status_handler))
        .route("/pause", post(pause_handler))
        .route("/resume", post(resume_handler))
        .route("/cancel", post(cancel_handler))
        .route("/duration", post(duration_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! HTTP endpoint handlers

use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use tracing::info;

use super::{
    responses::{
        ApiError, ApiResponse, CardResponse, DurationRequest, HealthResponse, StatusResponse,
        TimerView,
    },
    ServerState,
};

/// Handle GET /card - The live status card as currently rendered
pub async fn card_handler(State(state): State<Arc<ServerState>>) -> Response {
    let ctx = &state.ctx;
    match ctx.services().cards.live_card(ctx.timer_id()) {
        Some(card) => Json(CardResponse::new(card, ctx.now())).into_response(),
        None => (StatusCode::NOT_FOUND, "no live status card").into_response(),
    }
}

/// Handle GET /status - Persisted record with derived values
pub async fn status_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<StatusResponse>, ApiError> {
    let ctx = &state.ctx;
    let record = ctx.services().store.fetch_required(ctx.timer_id())?;

    Ok(Json(StatusResponse {
        timer: TimerView::new(&record, ctx.now()),
        card_active: ctx.services().cards.is_active(ctx.timer_id()),
        countdown_active: ctx.has_countdown(),
        uptime: state.uptime(),
        host: state.host.clone(),
        port: state.port,
    }))
}

/// Handle POST /pause
pub async fn pause_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let record = state.ctx.pause()?;
    info!("Pause endpoint called");
    Ok(Json(ApiResponse::ok("Timer paused", &record, state.ctx.now())))
}

/// Handle POST /resume - Start or resume the countdown
pub async fn resume_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let record = state.ctx.start()?;
    info!("Resume endpoint called");
    Ok(Json(ApiResponse::ok("Timer running", &record, state.ctx.now())))
}

/// Handle POST /cancel - Reset to the full duration
pub async fn cancel_handler(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<ApiResponse>, ApiError> {
    let record = state.ctx.reset()?;
    info!("Cancel endpoint called");
    Ok(Json(ApiResponse::ok("Timer reset", &record, state.ctx.now())))
}

/// Handle POST /duration - Change the configured duration (and sound)
pub async fn duration_handler(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<DurationRequest>,
) -> Result<Json<ApiResponse>, ApiError> {
    let record = state
        .ctx
        .set_duration(Duration::from_secs(body.seconds), body.sound)?;
    info!("Duration endpoint called - {}s", body.seconds);
    Ok(Json(ApiResponse::ok(
        format!("Duration set to {}s", body.seconds),
        &record,
        state.ctx.now(),
    )))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

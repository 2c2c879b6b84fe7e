//! API response structures

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::TimerError,
    services::status::LiveCard,
    state::{record::remaining_until, Sound, TimerRecord, TimerStatus},
};

/// Snapshot of the record at one instant, with derived values filled in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerView {
    pub id: String,
    pub status: TimerStatus,
    pub is_paused: bool,
    pub total_ms: u64,
    pub remaining_ms: u64,
    pub progress: f64,
    pub end_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub sound: Sound,
}

impl TimerView {
    pub fn new(record: &TimerRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id.clone(),
            status: record.status(now),
            is_paused: record.is_paused(),
            total_ms: record.total.as_millis() as u64,
            remaining_ms: record.remaining(now).as_millis() as u64,
            progress: record.progress(now),
            end_at: record.end_at(),
            started_at: record.started_at,
            sound: record.sound_or_default(),
        }
    }
}

/// API response structure for command endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub timer: TimerView,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, record: &TimerRecord, now: DateTime<Utc>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
            timestamp: now,
            timer: TimerView::new(record, now),
        }
    }
}

/// GET /status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub timer: TimerView,
    pub card_active: bool,
    pub countdown_active: bool,
    pub uptime: String,
    pub host: String,
    pub port: u16,
}

/// GET /card: the live card plus what it currently shows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardResponse {
    pub card: LiveCard,
    pub remaining_ms: u64,
    pub progress: f64,
    pub stale: bool,
}

impl CardResponse {
    pub fn new(card: LiveCard, now: DateTime<Utc>) -> Self {
        let content = &card.content;
        let remaining = if content.is_completed() {
            Duration::ZERO
        } else if content.is_paused {
            content.adjusted_remaining.unwrap_or(content.total)
        } else {
            content
                .end_at
                .map(|end_at| remaining_until(end_at, now))
                .unwrap_or_default()
        };
        let total = content.total.as_secs_f64();
        let progress = if total > 0.0 {
            (1.0 - remaining.as_secs_f64() / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            stale: card.is_stale(now),
            remaining_ms: remaining.as_millis() as u64,
            progress,
            card,
        }
    }
}

/// POST /duration body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationRequest {
    pub seconds: u64,
    #[serde(default)]
    pub sound: Option<Sound>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

/// Maps timer errors onto HTTP status codes
#[derive(Debug)]
pub struct ApiError(pub TimerError);

impl From<TimerError> for ApiError {
    fn from(e: TimerError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            TimerError::InvalidTransition(_) => StatusCode::CONFLICT,
            TimerError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            TimerError::InvalidDuration => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

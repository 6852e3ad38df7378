use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::job::JobCounts;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
    pub jobs: JobCounts,
    pub queue_depth: u64,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub decoder: ComponentHealth,
    pub queue: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            latency_ms: Some(latency_ms),
        }
    }

    fn error() -> Self {
        Self {
            status: "error".to_string(),
            latency_ms: None,
        }
    }
}

/// GET /health — decoder and worker status plus job totals.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // Check ffmpeg/ffprobe can be launched
    let start = std::time::Instant::now();
    let decoder_check = match state.pipeline.decoder().health_check().await {
        Ok(_) => ComponentHealth::ok(start.elapsed().as_millis() as u64),
        Err(e) => {
            tracing::warn!(error = %e, "Decoder health check failed");
            ComponentHealth::error()
        }
    };

    // Check the worker loop is still draining the queue
    let queue_start = std::time::Instant::now();
    let queue_check = match state.queue.health_check() {
        Ok(_) => ComponentHealth::ok(queue_start.elapsed().as_millis() as u64),
        Err(_) => ComponentHealth::error(),
    };

    let all_healthy = decoder_check.status == "ok" && queue_check.status == "ok";
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            decoder: decoder_check,
            queue: queue_check,
        },
        jobs: state.jobs.counts(),
        queue_depth: state.queue.queue_depth(),
    };

    (status_code, Json(response))
}

use axum::routing::get;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use apple_counter::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{decoder::FfmpegDecoder, detector::WorkersAiDetector, queue::JobQueue},
    worker,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing apple-counter server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    // Video decoding is delegated to ffmpeg
    tracing::info!(ffmpeg = %config.ffmpeg_path, ffprobe = %config.ffprobe_path, "Using ffmpeg decoder");
    let decoder = FfmpegDecoder::new(&config.ffmpeg_path, &config.ffprobe_path);

    // The detection client is built once and shared read-only
    tracing::info!(model = %config.detection_model, "Initializing Workers AI detector");
    let detector = WorkersAiDetector::new(
        &config.cf_account_id,
        &config.cf_api_token,
        &config.detection_model,
        config.min_confidence,
    );

    if let Some(dir) = &config.upload_dir {
        std::fs::create_dir_all(dir).expect("Failed to create upload directory");
    }

    let (queue, receiver) = JobQueue::new();
    let state = AppState::new(
        Arc::new(decoder),
        Arc::new(detector),
        queue,
        config.target_samples,
        config.upload_dir.clone(),
    );

    // Start background workers
    worker::spawn(state.clone(), receiver, config.worker_concurrency);

    // Build API routes
    let app = routes::router(state, config.max_upload_bytes).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    tracing::info!("Starting apple-counter on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}

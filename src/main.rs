use anyhow::Context;
use dotenvy::dotenv;
use render_worker::config::settings::AppConfig;
use render_worker::infrastructure::storage::VideoUploader;
use render_worker::infrastructure::storage::s3::StorageService;
use render_worker::infrastructure::webhook::WebhookNotifier;
use render_worker::state::AppState;
use render_worker::workers::capture::ChromiumRenderer;
use render_worker::workers::encoder::VideoEncoder;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting render worker...");

    let config = AppConfig::new().context("missing required environment variable")?;

    let storage = StorageService::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_bucket,
        &config.s3_access_key,
        &config.s3_secret_key,
    );
    let uploader = VideoUploader::new(Arc::new(storage), &config.cdn_base_url);
    let renderer = ChromiumRenderer::new(
        config.chrome_path.clone(),
        config.render_backend,
        VideoEncoder::new(config.ffmpeg_path.clone()),
    );
    let notifier = WebhookNotifier::new()?;

    info!(
        backend = %config.render_backend,
        work_dir = %config.work_dir.display(),
        mapbox = config.mapbox_api_key.is_some(),
        "🎥 Render pipeline ready"
    );

    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = AppState::new(config, Arc::new(renderer), uploader, notifier);
    let app = render_worker::app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

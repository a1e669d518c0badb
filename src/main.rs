// Image gallery with AI captions
//
// Environment (all optional, see `Config`):
//   PORT, GALLERY_BUCKET, STORAGE_BACKEND, LOCAL_STORAGE_ROOT, UPLOAD_DIR,
//   GEMINI_ENDPOINT, GEMINI_MODEL, GEMINI_SECRET_NAME, SECRETS_DIR,
//   CAPTION_TIMEOUT_SECS, MAX_UPLOAD_BYTES, STRICT_CONTENT_TYPE, RUST_LOG

use std::sync::Arc;

use image_gallery::caption::{Captioner, DisabledCaptioner, GeminiCaptioner};
use image_gallery::secrets::{EnvSecretProvider, FileSecretProvider, SecretProvider};
use image_gallery::storage::ObjectBlobStore;
use image_gallery::{router, AppState, Config};
use tracing_subscriber::EnvFilter;

async fn build_captioner(config: &Config) -> anyhow::Result<Box<dyn Captioner>> {
    let secrets: Box<dyn SecretProvider> = match &config.secrets_dir {
        Some(dir) => Box::new(FileSecretProvider::new(dir)),
        None => Box::new(EnvSecretProvider),
    };

    match secrets.get_secret(&config.gemini_secret_name).await {
        Ok(api_key) => {
            let captioner = GeminiCaptioner::new(
                config.gemini_endpoint.clone(),
                config.gemini_model.clone(),
                api_key,
                config.caption_timeout,
            )?;
            tracing::info!(model = %config.gemini_model, "captioning enabled");
            Ok(Box::new(captioner))
        }
        Err(e) => {
            tracing::warn!(error = %e, "captioning disabled, uploads will get placeholder captions");
            Ok(Box::new(DisabledCaptioner))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let store = ObjectBlobStore::from_config(&config)?;
    let captioner = build_captioner(&config).await?;

    let state = Arc::new(AppState::new(&config, Box::new(store), captioner));
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🚀 Server running on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}

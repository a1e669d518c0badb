use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::caption::{sniff_mime_type, Captioner};
use crate::config::Config;
use crate::error::{GalleryError, Result};
use crate::gallery::{list_images, load_gallery, render_index};
use crate::keys::{caption_key, upload_key};
use crate::storage::BlobStore;

pub const UPLOAD_FIELD: &str = "form_file";

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct AppState {
    pub store: Box<dyn BlobStore>,
    pub captioner: Box<dyn Captioner>,
    pub upload_dir: PathBuf,
    pub strict_content_type: bool,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &Config, store: Box<dyn BlobStore>, captioner: Box<dyn Captioner>) -> Self {
        Self {
            store,
            captioner,
            upload_dir: config.upload_dir.clone(),
            strict_content_type: config.strict_content_type,
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/files", get(list_files))
        .route("/files/:filename", get(get_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let items = load_gallery(state.store.as_ref()).await?;
    Ok(Html(render_index(&items)))
}

async fn list_files(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>> {
    Ok(Json(list_images(state.store.as_ref()).await?))
}

async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GalleryError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = field
            .file_name()
            .and_then(upload_key)
            .ok_or_else(|| GalleryError::BadRequest("upload has no file name".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| GalleryError::BadRequest(format!("failed to read upload: {e}")))?;
        upload = Some((name, data));
        break;
    }

    let (name, data) = upload
        .ok_or_else(|| GalleryError::BadRequest(format!("missing {UPLOAD_FIELD} field")))?;
    tracing::info!(file = %name, bytes = data.len(), "📥 upload received");

    // Same-name uploads race in the store; the last writer wins. Scratch
    // copies get a per-upload prefix so they never collide.
    tokio::fs::create_dir_all(&state.upload_dir).await?;
    let scratch_id = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let local_path = state.upload_dir.join(format!("{scratch_id}-{name}"));
    tokio::fs::write(&local_path, &data).await?;

    let local_copy = tokio::fs::read(&local_path).await?;
    if let Err(e) = tokio::fs::remove_file(&local_path).await {
        tracing::warn!(path = %local_path.display(), error = %e, "failed to remove scratch copy");
    }
    let caption = state
        .captioner
        .caption(&local_copy, sniff_mime_type(&local_copy))
        .await
        .into_caption();

    state.store.put(&name, data).await?;

    let sidecar = serde_json::to_vec(&caption)
        .map_err(|e| GalleryError::Internal(format!("failed to encode caption: {e}")))?;
    state.store.put(&caption_key(&name), Bytes::from(sidecar)).await?;

    tracing::info!(file = %name, title = %caption.title, "upload stored");
    Ok((StatusCode::FOUND, [(header::LOCATION, "/")]))
}

async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    let data = state.store.get(&filename).await?;

    let sniffed = sniff_mime_type(&data);
    let content_type = if state.strict_content_type {
        sniffed
    } else {
        if sniffed != "image/jpeg" {
            tracing::warn!(file = %filename, actual = sniffed, "serving non-JPEG content as image/jpeg");
        }
        "image/jpeg"
    };

    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

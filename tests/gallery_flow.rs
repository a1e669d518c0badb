use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image_gallery::caption::{Caption, CaptionResult, Captioner, GeminiCaptioner};
use image_gallery::storage::{BlobStore, ObjectBlobStore};
use image_gallery::{router, AppState, Config};
use tower::ServiceExt;

const BOUNDARY: &str = "----GalleryTestBoundary7MA4YWxk";
const JPEG_BYTES: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0fake-jpeg-body";
const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRfake-png-body";

/// Always answers with the same result.
struct FixedCaptioner(CaptionResult);

#[async_trait::async_trait]
impl Captioner for FixedCaptioner {
    async fn caption(&self, _image: &[u8], _mime_type: &str) -> CaptionResult {
        self.0.clone()
    }
}

fn unavailable() -> Box<dyn Captioner> {
    Box::new(FixedCaptioner(CaptionResult::Unavailable {
        reason: "not configured".to_string(),
    }))
}

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    upload_dir: tempfile::TempDir,
}

fn test_app(captioner: Box<dyn Captioner>, strict_content_type: bool) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let config = Config {
        upload_dir: upload_dir.path().to_path_buf(),
        strict_content_type,
        ..Config::default()
    };
    let state = Arc::new(AppState::new(
        &config,
        Box::new(ObjectBlobStore::in_memory()),
        captioner,
    ));
    TestApp {
        app: router(state.clone()),
        state,
        upload_dir,
    }
}

fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, filename, data)))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_text(response: axum::response::Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

async fn upload(app: &Router, filename: &str, data: &[u8]) {
    let response = app
        .clone()
        .oneshot(upload_request("form_file", filename, data))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/");
}

/// Mock `generateContent` endpoint that always replies with `reply_text`.
async fn start_mock_gemini(reply_text: &'static str) -> String {
    let app = Router::new().route(
        "/v1beta/models/test-model:generateContent",
        axum::routing::post(move || async move {
            axum::Json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": reply_text }] }
                }]
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

#[tokio::test]
async fn homepage_loads_with_upload_form() {
    let t = test_app(unavailable(), false);

    let response = t.app.clone().oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Upload an Image"));
    assert!(html.contains("name=\"form_file\""));
}

#[tokio::test]
async fn uploaded_cat_is_captioned_and_listed() {
    let endpoint =
        start_mock_gemini(r#"{"title":"A Cat","description":"A cat sitting."}"#).await;
    let captioner =
        GeminiCaptioner::new(endpoint, "test-model", "test-key", Duration::from_secs(5)).unwrap();
    let t = test_app(Box::new(captioner), false);

    upload(&t.app, "cat.jpg", JPEG_BYTES).await;

    let html = body_text(t.app.clone().oneshot(get_request("/")).await.unwrap()).await;
    assert!(html.contains("<img src='/files/cat.jpg'>"), "{html}");
    assert!(html.contains("A Cat"));
    assert!(html.contains("A cat sitting."));

    // The sidecar reads back to the generated caption.
    let sidecar = t.state.store.get("cat.json").await.unwrap();
    let caption: Caption = serde_json::from_slice(&sidecar).unwrap();
    assert_eq!(caption, Caption::new("A Cat", "A cat sitting."));
}

#[tokio::test]
async fn network_failure_stores_placeholder_caption() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let captioner = GeminiCaptioner::new(
        format!("http://127.0.0.1:{port}"),
        "test-model",
        "test-key",
        Duration::from_secs(5),
    )
    .unwrap();
    let t = test_app(Box::new(captioner), false);

    upload(&t.app, "dog.png", PNG_BYTES).await;

    let html = body_text(t.app.clone().oneshot(get_request("/")).await.unwrap()).await;
    assert!(html.contains("<img src='/files/dog.png'>"));
    assert!(html.contains("No title generated"));
    assert!(html.contains("No description generated"));

    let sidecar: serde_json::Value =
        serde_json::from_slice(&t.state.store.get("dog.json").await.unwrap()).unwrap();
    let object = sidecar.as_object().unwrap();
    assert_eq!(object.len(), 2);
    assert_eq!(object["title"], "No title generated");
    assert_eq!(object["description"], "No description generated");
}

#[tokio::test]
async fn uploaded_file_is_served_byte_identical() {
    let t = test_app(
        Box::new(FixedCaptioner(CaptionResult::Success(Caption::new("T", "D")))),
        false,
    );

    upload(&t.app, "cat.jpg", JPEG_BYTES).await;

    let response = t
        .app
        .clone()
        .oneshot(get_request("/files/cat.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(body_bytes(response).await, JPEG_BYTES);
}

#[tokio::test]
async fn png_is_served_as_jpeg_unless_strict() {
    for (strict, expected) in [(false, "image/jpeg"), (true, "image/png")] {
        let t = test_app(
            Box::new(FixedCaptioner(CaptionResult::Success(Caption::new("T", "D")))),
            strict,
        );
        upload(&t.app, "dog.png", PNG_BYTES).await;

        let response = t
            .app
            .clone()
            .oneshot(get_request("/files/dog.png"))
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], expected);
        assert_eq!(body_bytes(response).await, PNG_BYTES);
    }
}

#[tokio::test]
async fn missing_file_is_not_found() {
    let t = test_app(unavailable(), false);

    let response = t
        .app
        .clone()
        .oneshot(get_request("/files/ghost.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn upload_without_form_file_is_rejected() {
    let t = test_app(unavailable(), false);

    let response = t
        .app
        .clone()
        .oneshot(upload_request("image", "cat.jpg", JPEG_BYTES))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(t.state.store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_is_newest_first() {
    let t = test_app(
        Box::new(FixedCaptioner(CaptionResult::Success(Caption::new("T", "D")))),
        false,
    );

    upload(&t.app, "first.jpg", JPEG_BYTES).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    upload(&t.app, "second.png", PNG_BYTES).await;

    let response = t.app.clone().oneshot(get_request("/files")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let names: Vec<String> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(names, vec!["second.png", "first.jpg"]);

    let html = body_text(t.app.clone().oneshot(get_request("/")).await.unwrap()).await;
    let second = html.find("/files/second.png").unwrap();
    let first = html.find("/files/first.jpg").unwrap();
    assert!(second < first);
}

#[tokio::test]
async fn image_without_sidecar_renders_not_available() {
    let t = test_app(unavailable(), false);
    t.state
        .store
        .put("orphan.jpg", bytes::Bytes::from_static(JPEG_BYTES))
        .await
        .unwrap();

    let response = t.app.clone().oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<img src='/files/orphan.jpg'>"));
    assert!(html.contains("N/A"));
}

#[tokio::test]
async fn client_directories_are_stripped_from_upload_name() {
    let t = test_app(
        Box::new(FixedCaptioner(CaptionResult::Success(Caption::new("T", "D")))),
        false,
    );

    upload(&t.app, "../../outside.jpg", JPEG_BYTES).await;

    assert!(t.state.store.get("outside.jpg").await.is_ok());
    assert!(t.state.store.get("outside.json").await.is_ok());
}

#[tokio::test]
async fn scratch_copy_is_removed_after_upload() {
    let t = test_app(
        Box::new(FixedCaptioner(CaptionResult::Success(Caption::new("T", "D")))),
        false,
    );

    upload(&t.app, "cat.jpg", JPEG_BYTES).await;

    let leftovers = std::fs::read_dir(t.upload_dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
    assert_eq!(&t.state.store.get("cat.jpg").await.unwrap()[..], JPEG_BYTES);
}

#[tokio::test]
async fn reserved_characters_round_trip_through_listing() {
    let t = test_app(
        Box::new(FixedCaptioner(CaptionResult::Success(Caption::new("T", "D")))),
        false,
    );
    t.state
        .store
        .put("50%off.jpg", bytes::Bytes::from_static(JPEG_BYTES))
        .await
        .unwrap();
    t.state
        .store
        .put(
            "50%off.json",
            bytes::Bytes::from_static(br#"{"title":"Sale","description":"Half price."}"#),
        )
        .await
        .unwrap();

    let response = t.app.clone().oneshot(get_request("/files")).await.unwrap();
    let names: Vec<String> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(names, vec!["50%off.jpg"]);

    let html = body_text(t.app.clone().oneshot(get_request("/")).await.unwrap()).await;
    assert!(html.contains("<img src='/files/50%25off.jpg'>"), "{html}");
    assert!(html.contains("Sale"));

    let response = t
        .app
        .clone()
        .oneshot(get_request("/files/50%25off.jpg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, JPEG_BYTES);
}

#[tokio::test]
async fn concurrent_same_name_uploads_both_succeed() {
    let t = test_app(
        Box::new(FixedCaptioner(CaptionResult::Success(Caption::new("T", "D")))),
        false,
    );

    let (a, b) = tokio::join!(
        t.app
            .clone()
            .oneshot(upload_request("form_file", "cat.jpg", JPEG_BYTES)),
        t.app
            .clone()
            .oneshot(upload_request("form_file", "cat.jpg", PNG_BYTES)),
    );
    assert_eq!(a.unwrap().status(), StatusCode::FOUND);
    assert_eq!(b.unwrap().status(), StatusCode::FOUND);

    let stored = t.state.store.get("cat.jpg").await.unwrap();
    assert!(&stored[..] == JPEG_BYTES || &stored[..] == PNG_BYTES);
    assert_eq!(std::fs::read_dir(t.upload_dir.path()).unwrap().count(), 0);
}

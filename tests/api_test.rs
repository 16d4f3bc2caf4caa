use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower::ServiceExt; // for `oneshot`

use audiobox::api::{build_state, router};
use audiobox::config::{Config, HumanDuration};
use audiobox::extractor::{AudioRequest, ExtractError, Extractor, MediaMetadata};

const SOURCE: &str = "https://soundcloud.com/artist/track";

/// Stand-in for yt-dlp: writes a tiny artifact, optionally blocking or failing
#[derive(Default)]
struct FakeExtractor {
    thumbnail_url: Option<String>,
    fail: bool,
    gate: Option<Arc<Notify>>,
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn fetch_metadata(&self, _url: &str) -> Result<MediaMetadata, ExtractError> {
        if self.fail {
            return Err(ExtractError::Failed {
                status: "exit status: 1".to_string(),
                message: "Unsupported URL".to_string(),
            });
        }
        Ok(MediaMetadata::new(
            Some("Test Track".to_string()),
            self.thumbnail_url.clone(),
        ))
    }

    async fn extract_audio(&self, request: &AudioRequest) -> Result<MediaMetadata, ExtractError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail {
            return Err(ExtractError::Failed {
                status: "exit status: 1".to_string(),
                message: "Unable to download".to_string(),
            });
        }
        tokio::fs::write(request.artifact_path(), b"ID3audio").await?;
        Ok(MediaMetadata::new(
            Some("Test Track".to_string()),
            self.thumbnail_url.clone(),
        ))
    }
}

/// Builds a test app over a temporary download directory
fn build_test_app(extractor: FakeExtractor) -> (Router, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut config = Config::default();
    config.storage.download_dir = temp_dir.path().join("downloads");
    config.cover.timeout = HumanDuration::from_secs(2);
    config.download.wait_budget = HumanDuration::from_secs(5);

    let state = build_state(config, Arc::new(extractor)).expect("Failed to build state");
    (router(state), temp_dir)
}

/// Serves a cover image on an ephemeral port, returns its URL
async fn cover_host() -> String {
    let app = Router::new().route("/art.png", axum::routing::get(|| async { "pngbytes" }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/art.png")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = ServiceExt::<Request<Body>>::oneshot(app.clone(), request)
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn start(app: &Router, track_id: &str) {
    let (status, body) = send_json(
        app,
        post_json("/start_download", json!({"url": SOURCE, "track_id": track_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

/// Polls progress until a terminal status, asserting progress never decreases
async fn poll_until_terminal(app: &Router, track_id: &str) -> Value {
    let mut last = 0;
    for _ in 0..250 {
        let (status, body) = send_json(app, get(&format!("/download_progress/{track_id}"))).await;
        assert_eq!(status, StatusCode::OK);

        let progress = body["progress"].as_u64().unwrap();
        match body["status"].as_str().unwrap() {
            "completed" | "error" => return body,
            _ => {
                assert!(progress >= last, "progress went backwards: {last} -> {progress}");
                last = progress;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {track_id} never reached a terminal state");
}

#[tokio::test]
async fn test_health() {
    let (app, _temp_dir) = build_test_app(FakeExtractor::default());

    let (status, body) = send_json(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_progress_unknown_track_is_not_found() {
    let (app, _temp_dir) = build_test_app(FakeExtractor::default());

    for uri in ["/download_progress/nosuchjob", "/download_progress/bad%20id!"] {
        let (status, body) = send_json(&app, get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "not_found", "progress": 0}));
    }
}

#[tokio::test]
async fn test_metadata_success_mints_track_id() {
    let (app, _temp_dir) = build_test_app(FakeExtractor {
        thumbnail_url: Some("https://i1.sndcdn.com/artworks-1-t500x500.PNG?sig=1".to_string()),
        ..FakeExtractor::default()
    });

    let (status, body) = send_json(&app, post_json("/download", json!({"url": SOURCE}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["title"], "Test Track");
    assert_eq!(body["cover_ext"], "png");
    assert_eq!(body["original_url"], SOURCE);
    assert_eq!(body["track_id"].as_str().unwrap().len(), 12);
}

#[tokio::test]
async fn test_metadata_failure_is_structured() {
    let (app, temp_dir) = build_test_app(FakeExtractor {
        fail: true,
        ..FakeExtractor::default()
    });

    let (status, body) = send_json(&app, post_json("/download", json!({"url": SOURCE}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Unsupported URL"));
    assert!(std::fs::read_dir(temp_dir.path().join("downloads")).unwrap().next().is_none());
}

#[tokio::test]
async fn test_validation_errors_are_400() {
    let (app, _temp_dir) = build_test_app(FakeExtractor::default());

    let cases = [
        post_json("/download", json!({})),
        post_json("/download", json!({"url": "https://example.com/track"})),
        post_json("/start_download", json!({"url": "ftp://soundcloud.com/a", "track_id": "abc"})),
        post_json("/start_download", json!({"url": SOURCE, "track_id": "../../etc"})),
        post_json("/start_download", json!({"url": SOURCE})),
        Request::builder()
            .uri("/start_download")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    ];

    for request in cases {
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_PAYLOAD");
    }
}

#[tokio::test]
async fn test_full_download_flow() {
    let cover_url = cover_host().await;
    let (app, _temp_dir) = build_test_app(FakeExtractor {
        thumbnail_url: Some(cover_url),
        ..FakeExtractor::default()
    });

    start(&app, "flow1").await;
    let report = poll_until_terminal(&app, "flow1").await;

    assert_eq!(report["status"], "completed");
    assert_eq!(report["progress"], 100);
    assert_eq!(report["title"], "Test Track");
    assert_eq!(report["cover_ext"], "png");
    assert_eq!(report["primary_available"], true);
    assert_eq!(report["cover_available"], true);

    let (status, headers, body) = send(&app, get("/download_mp3/flow1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ID3audio");
    assert_eq!(headers[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(headers[header::CONTENT_LENGTH], "8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"flow1.mp3\""
    );

    let (status, headers, body) = send(&app, get("/download_cover/flow1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pngbytes");
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");

    let (status, _, body) = send(&app, get("/download_file/flow1_cover.png")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pngbytes");
}

#[tokio::test]
async fn test_cover_served_under_recorded_extension() {
    let cover_url = cover_host().await;
    let (app, _temp_dir) = build_test_app(FakeExtractor {
        thumbnail_url: Some(cover_url),
        ..FakeExtractor::default()
    });

    start(&app, "extmix").await;
    let report = poll_until_terminal(&app, "extmix").await;
    assert_eq!(report["cover_ext"], "png");

    // Client guessed jpg; the stored png is served without a second run
    let uri = format!("/download_cover/extmix?cover_ext=jpg&url={SOURCE}");
    let (status, headers, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"pngbytes");
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");

    let (_, health) = send_json(&app, get("/health")).await;
    assert_eq!(health["metrics"]["jobs_started"], 1);
}

#[tokio::test]
async fn test_broken_cover_still_completes() {
    let (app, _temp_dir) = build_test_app(FakeExtractor {
        thumbnail_url: Some("http://127.0.0.1:9/art.jpg".to_string()),
        ..FakeExtractor::default()
    });

    start(&app, "nocover").await;
    let report = poll_until_terminal(&app, "nocover").await;

    assert_eq!(report["status"], "completed");
    assert_eq!(report["primary_available"], true);
    assert_eq!(report["cover_available"], false);

    let (status, _) = send_json(&app, get("/download_cover/nocover?cover_ext=jpg")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_extraction_reports_error() {
    let (app, _temp_dir) = build_test_app(FakeExtractor {
        fail: true,
        ..FakeExtractor::default()
    });

    start(&app, "broken").await;
    let report = poll_until_terminal(&app, "broken").await;

    assert_eq!(report["status"], "error");
    assert_eq!(report["progress"], 0);
    assert!(report["error"].as_str().unwrap().contains("Unable to download"));

    let (status, body) = send_json(&app, get("/download_mp3/broken")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "DOWNLOAD_FAILED");
}

#[tokio::test]
async fn test_retrieval_in_progress_then_cancel() {
    let gate = Arc::new(Notify::new());
    let (app, _temp_dir) = build_test_app(FakeExtractor {
        gate: Some(gate.clone()),
        ..FakeExtractor::default()
    });

    start(&app, "slow").await;

    let (status, body) = send_json(&app, get("/download_mp3/slow")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["code"], "IN_PROGRESS");

    let request = Request::builder()
        .uri("/download/slow")
        .method("DELETE")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled"], true);

    let report = poll_until_terminal(&app, "slow").await;
    assert_eq!(report["status"], "error");
    assert_eq!(report["error"], "download cancelled");
}

#[tokio::test]
async fn test_retrieval_missing_without_url_is_404() {
    let (app, _temp_dir) = build_test_app(FakeExtractor::default());

    let (status, body) = send_json(&app, get("/download_mp3/ghost")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send_json(&app, get("/download_file/ghost.mp3")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_retrieval_with_url_runs_missing_job() {
    let (app, _temp_dir) = build_test_app(FakeExtractor::default());

    let uri = format!("/download_mp3/late?url={}", url_encode(SOURCE));
    let (status, _, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ID3audio");

    let report = poll_until_terminal(&app, "late").await;
    assert_eq!(report["status"], "completed");

    // Served straight from disk the second time
    let (status, _, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ID3audio");
}

fn url_encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

use axum::{
    extract::Path,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use sdgen::{
    ClientConfig, Gallery, GallerySource, GenerationController, GenerationState, HttpImageApi,
    ImageApi, SdError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn generate_handler(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    match body["prompt"].as_str().unwrap_or_default() {
        "server detail" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "X"})),
        ),
        "no detail" => (StatusCode::BAD_GATEWAY, Json(json!({}))),
        "list detail" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": [{"loc": ["body", "seed"], "msg": "bad seed"}]})),
        ),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            (StatusCode::OK, Json(json!({"image_url": "/static/images/late.png"})))
        }
        "garbled" => (StatusCode::OK, Json(json!({"url": 5}))),
        _ => (
            StatusCode::OK,
            Json(json!({
                "image_url": "/static/images/out.png",
                "prompt": body["prompt"],
                "generation_params": {
                    "steps": body["num_inference_steps"],
                    "guidance_scale": body["guidance_scale"],
                    "width": body["width"],
                    "seed": body.get("seed").cloned().unwrap_or(Value::Null)
                }
            })),
        ),
    }
}

async fn list_handler() -> Json<Value> {
    Json(json!([
        {"filename": "b.png", "url": "/static/images/b.png", "prompt": "an owl", "created_at": "2024-02-01T10:00:00.123456"},
        {"filename": "a.png", "prompt": "A Red Fox"}
    ]))
}

async fn delete_handler(Path(filename): Path<String>) -> (StatusCode, Json<Value>) {
    if filename == "a.png" || filename == "a?b#c%d.png" {
        (
            StatusCode::OK,
            Json(json!({"message": format!("{} deleted successfully", filename)})),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Image not found"})),
        )
    }
}

async fn image_handler(Path(_filename): Path<String>) -> Vec<u8> {
    b"\x89PNG-bytes".to_vec()
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "healthy", "model_loaded": true, "device": "cuda"}))
}

async fn spawn_backend() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/api/v1/generate", post(generate_handler))
        .route("/api/v1/images", get(list_handler))
        .route("/api/v1/images/:filename", delete(delete_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/static/images/:filename", get(image_handler));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

fn config_for(origin: &str) -> ClientConfig {
    ClientConfig::new()
        .with_base_url(origin)
        .with_generation_timeout(Duration::from_millis(500))
}

async fn controller_for(origin: &str) -> GenerationController {
    let config = config_for(origin);
    let api = Arc::new(HttpImageApi::new(config.clone()).unwrap());
    GenerationController::new(api, config)
}

#[tokio::test]
async fn red_fox_round_trip_resolves_relative_url() {
    let origin = spawn_backend().await;
    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("a red fox").unwrap();
    ctl.set_seed("42").unwrap();

    let state = ctl.submit().await.unwrap();
    let result = state.result().expect("generation should succeed");
    assert_eq!(result.image_url, format!("{}/static/images/out.png", origin));
    assert_eq!(result.generation_params["steps"], json!(10));
    assert_eq!(result.generation_params["width"], json!(256));
    assert_eq!(result.generation_params["seed"], json!(42));
}

#[tokio::test]
async fn detail_string_is_reported_verbatim() {
    let origin = spawn_backend().await;
    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("server detail").unwrap();
    ctl.submit().await.unwrap();
    assert_eq!(ctl.state().error_message(), Some("X"));
}

#[tokio::test]
async fn missing_detail_falls_back_to_status_message() {
    let origin = spawn_backend().await;
    let api = HttpImageApi::new(config_for(&origin)).unwrap();
    let request = sdgen::GenerationForm {
        prompt: "no detail".into(),
        ..Default::default()
    }
    .to_request()
    .unwrap();

    let err = api.generate(&request).await.unwrap_err();
    assert!(matches!(err, SdError::Transport(_)));
    assert_eq!(err.user_message(), "Request failed with status code 502");
}

#[tokio::test]
async fn structured_detail_is_rendered_as_json() {
    let origin = spawn_backend().await;
    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("list detail").unwrap();
    ctl.submit().await.unwrap();
    let message = ctl.state().error_message().unwrap();
    assert!(message.contains("bad seed"));
}

#[tokio::test]
async fn timeout_fails_then_reset_returns_to_idle() {
    let origin = spawn_backend().await;
    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("slow").unwrap();

    ctl.submit().await.unwrap();
    let message = ctl.state().error_message().expect("should fail on timeout");
    assert!(!message.is_empty());

    ctl.reset().unwrap();
    assert_eq!(ctl.state(), &GenerationState::Idle);
    assert_eq!(ctl.form().prompt, "slow");
}

#[tokio::test]
async fn undecodable_success_body_fails_the_attempt() {
    let origin = spawn_backend().await;
    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("garbled").unwrap();
    ctl.submit().await.unwrap();
    assert!(ctl.state().error_message().unwrap().starts_with("Response error"));
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("anything").unwrap();
    ctl.submit().await.unwrap();
    assert!(!ctl.state().error_message().unwrap().is_empty());
}

/// Answers one request with a 500 whose body ends before its declared length.
async fn spawn_truncating_backend() -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }
        socket
            .write_all(
                b"HTTP/1.1 500 Internal Server Error\r\n\
                  Content-Type: application/json\r\n\
                  Content-Length: 64\r\n\r\n{\"detail\": \"cut",
            )
            .await
            .unwrap();
        socket.shutdown().await.ok();
    });
    origin
}

#[tokio::test]
async fn truncated_error_body_falls_back_to_status_message() {
    let origin = spawn_truncating_backend().await;
    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("anything").unwrap();

    let state = ctl.submit().await.unwrap();
    assert_eq!(
        state.error_message(),
        Some("Request failed with status code 500")
    );
}

#[tokio::test]
async fn abandoned_submit_can_be_reset() {
    let origin = spawn_backend().await;
    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("slow").unwrap();

    let outer = tokio::time::timeout(Duration::from_millis(100), ctl.submit()).await;
    assert!(outer.is_err());
    assert!(matches!(ctl.state(), GenerationState::Failed { .. }));

    ctl.reset().unwrap();
    ctl.set_prompt("a red fox").unwrap();
    let state = ctl.submit().await.unwrap();
    assert!(state.result().is_some());
}

#[tokio::test]
async fn delete_sends_reserved_characters_as_one_segment() {
    let origin = spawn_backend().await;
    let api = HttpImageApi::new(config_for(&origin)).unwrap();
    api.delete_image("a?b#c%d.png").await.unwrap();
    assert!(matches!(
        api.delete_image("..").await,
        Err(SdError::InvalidState(_))
    ));
}

#[tokio::test]
async fn download_fetches_resolved_image() {
    let origin = spawn_backend().await;
    let mut ctl = controller_for(&origin).await;
    ctl.set_prompt("a red fox").unwrap();
    ctl.submit().await.unwrap();

    let dir = std::env::temp_dir().join(format!("sdgen-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = ctl.download(&dir).await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG-bytes");
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn gallery_lists_searches_and_deletes() {
    let origin = spawn_backend().await;
    let api = Arc::new(HttpImageApi::new(config_for(&origin)).unwrap());
    let mut gallery = Gallery::new(api);

    assert_eq!(gallery.refresh().await, GallerySource::Live);
    let items = gallery.visible();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].url, "/static/images/b.png");
    assert_eq!(items[0].display_date(), "February 1, 2024");
    assert_eq!(items[1].prompt, "A Red Fox");

    gallery.set_search("red fox");
    assert_eq!(gallery.visible().len(), 1);
    gallery.clear_search();

    gallery.delete("a.png").await.unwrap();
    assert_eq!(gallery.filtered().len(), 1);

    let err = gallery.delete("b.png").await.unwrap_err();
    assert_eq!(err.user_message(), "Image not found");
    assert_eq!(gallery.filtered().len(), 1);
}

#[tokio::test]
async fn gallery_falls_back_to_samples_when_offline() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let api = Arc::new(HttpImageApi::new(config_for(&origin)).unwrap());
    let mut gallery = Gallery::new(api);
    assert_eq!(gallery.refresh().await, GallerySource::Sample);
    assert!(gallery.notice().is_some());
    assert!(!gallery.visible().is_empty());
}

#[tokio::test]
async fn health_reports_model_state() {
    let origin = spawn_backend().await;
    let api = HttpImageApi::new(config_for(&origin)).unwrap();
    let status = api.health().await.unwrap();
    assert!(status.is_ready());
    assert_eq!(status.device, "cuda");
}

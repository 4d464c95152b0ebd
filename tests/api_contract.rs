use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::IntoResponse,
};
use cyber_card::features::image::{GlyphAssets, ImageService};
use cyber_card::{AppConfig, AppError, AppState};
use tower::ServiceExt;

fn build_app(config: &AppConfig) -> Router {
    let service = ImageService::new(&config.image, Arc::new(GlyphAssets::default()));
    cyber_card::build_app(config, AppState::new(service))
}

fn default_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.image.max_parallel = 3;
    config
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

/// 全局错误统一为 RFC7807 ProblemDetails（application/problem+json）。
#[tokio::test]
async fn app_error_into_response_is_problem_details() {
    let resp = AppError::InvalidInput("缺少 username 字段".to_string()).into_response();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .expect("missing Content-Type")
        .to_str()
        .expect("invalid Content-Type");
    assert_eq!(content_type, "application/problem+json");

    let v = json_body(resp).await;
    assert_eq!(v["status"], 400);
    assert_eq!(v["code"], "INVALID_INPUT");
    assert!(v.get("type").is_some());
    assert!(v.get("title").is_some());
    assert!(v.get("detail").is_some());
}

#[tokio::test]
async fn timeout_maps_to_gateway_timeout() {
    let resp = AppError::Timeout("profile 渲染超过 1s".to_string()).into_response();
    assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(resp).await["code"], "RENDER_TIMEOUT");
}

#[tokio::test]
async fn health_reports_idle_render_slots() {
    let resp = build_app(&default_config())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .expect("request /health");

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("x-request-id").is_some());
    let v = json_body(resp).await;
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["service"], "cyber-card");
    assert_eq!(v["idleRenderSlots"], 3);
}

#[tokio::test]
async fn openapi_document_lists_generate_route() {
    let resp = build_app(&default_config())
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request openapi.json");

    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert!(v["paths"].get("/generate/{kind}").is_some());
    assert!(v["paths"].get("/health").is_some());
    assert!(v["components"]["schemas"].get("ProblemDetails").is_some());
    assert_eq!(v["info"]["title"], "Cyber Card API");
}

#[tokio::test]
async fn generate_route_follows_configured_prefix() {
    let mut config = default_config();
    config.api.prefix = "/v1/cards/".to_string();

    let request = |uri: &str| {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(Body::from("--x--\r\n"))
            .unwrap()
    };

    // 空表单：路由命中后因缺少字段返回 400
    let resp = build_app(&config)
        .oneshot(request("/v1/cards/generate/profile"))
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = build_app(&config)
        .oneshot(request("/api/generate/profile"))
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn empty_prefix_mounts_generate_at_root() {
    let mut config = default_config();
    config.api.prefix = String::new();

    let resp = build_app(&config)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/generate/welcome")
                .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
                .body(Body::from("--x--\r\n"))
                .unwrap(),
        )
        .await
        .expect("request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

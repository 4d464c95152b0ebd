use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::features::health::health_check;
use crate::features::image::create_image_router;
use crate::openapi::ApiDoc;
use crate::request_id::request_id_middleware;
use crate::state::AppState;

/// 装配完整的 HTTP 应用：健康检查、业务接口（挂在 `api.prefix` 下）、Swagger UI
///
/// 中间件由外到内：request_id（含请求 span）→ TraceLayer → 路由。
pub fn build_app(config: &AppConfig, state: AppState) -> Router {
    let api_router = create_image_router(config.image.max_upload_bytes);

    let prefix = config.api.prefix.trim_matches('/');
    let router = Router::<AppState>::new().route("/health", get(health_check));
    // axum 不允许在根路径 nest，空前缀时直接合并
    let router = if prefix.is_empty() {
        router.merge(api_router)
    } else {
        router.nest(&format!("/{prefix}"), api_router)
    };

    router
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
}

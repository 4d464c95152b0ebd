use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// 服务状态
    #[schema(example = "healthy")]
    pub status: String,
    /// 服务名称
    #[schema(example = "cyber-card")]
    pub service: String,
    /// 当前版本（Cargo package version）
    #[schema(example = "0.1.0")]
    pub version: String,
    /// 当前空闲的渲染许可数
    #[schema(example = 8)]
    pub idle_render_slots: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "用于探活的健康检查端点，返回服务状态、版本与空闲渲染许可数。",
    responses((status = 200, description = "服务健康", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            idle_render_slots: state.image_service.available_permits(),
        }),
    )
}

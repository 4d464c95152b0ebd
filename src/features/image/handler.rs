use std::str::FromStr;
use std::time::Instant;

use axum::body::Bytes;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
    routing::post,
};

use crate::{error::AppError, state::AppState};

use super::types::{EffectFlags, RecipeKind, RenderRequest, StatusTier};

/// multipart 表单字段（仅用于 OpenAPI 文档）
#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct GenerateForm {
    /// 用户名（必填，渲染时转大写）
    username: String,
    /// 头像图片文件（必填，PNG/JPEG/GIF/WebP 等）
    #[schema(value_type = String, format = Binary)]
    avatar: Vec<u8>,
    /// 服务器名（横幅使用，缺省 CyberServer）
    server_name: Option<String>,
    /// "true" 表示付费用户
    is_premium: Option<String>,
    /// "true" 表示所有者（优先于 isPremium）
    is_owner: Option<String>,
    extra_glow: Option<String>,
    scan_effect: Option<String>,
    matrix_rain: Option<String>,
    circuit_bg: Option<String>,
}

/// 解析后的上传表单
#[derive(Debug, Default)]
struct UploadForm {
    username: Option<String>,
    avatar: Option<Vec<u8>>,
    server_name: Option<String>,
    is_premium: bool,
    is_owner: bool,
    effects: EffectFlags,
}

impl UploadForm {
    fn into_request(self, kind: RecipeKind) -> Result<RenderRequest, AppError> {
        let username = self
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput("缺少 username 字段".to_string()))?;
        let avatar = self
            .avatar
            .filter(|a| !a.is_empty())
            .ok_or_else(|| AppError::InvalidInput("缺少 avatar 文件".to_string()))?;

        let mut req = RenderRequest::new(kind, username, avatar)
            .with_tier(StatusTier::from_flags(self.is_premium, self.is_owner))
            .with_effects(self.effects);
        if let Some(server_name) = self.server_name {
            req = req.with_server_name(server_name);
        }
        Ok(req)
    }
}

/// 只有字面量 `true`（不区分大小写）视为开启
fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "avatar" => form.avatar = Some(field.bytes().await?.to_vec()),
            "username" => form.username = Some(field.text().await?),
            "serverName" => form.server_name = Some(field.text().await?),
            "isPremium" => form.is_premium = parse_flag(&field.text().await?),
            "isOwner" => form.is_owner = parse_flag(&field.text().await?),
            "extraGlow" => form.effects.extra_glow = parse_flag(&field.text().await?),
            "scanEffect" => form.effects.scan_effect = parse_flag(&field.text().await?),
            "matrixRain" => form.effects.matrix_rain = parse_flag(&field.text().await?),
            "circuitBg" => form.effects.circuit_bg = parse_flag(&field.text().await?),
            other => {
                return Err(AppError::InvalidInput(format!("未知表单字段: '{other}'")));
            }
        }
    }
    Ok(form)
}

#[utoipa::path(
    post,
    path = "/generate/{kind}",
    summary = "生成赛博朋克风格卡片",
    description = "上传头像与用户名，按配方生成 PNG：profile（1280×480 个人资料卡）、welcome / goodbye（1920×768 横幅）。布尔字段仅在值为 \"true\" 时开启，未知字段会被拒绝。",
    params(
        ("kind" = String, Path, description = "配方：profile | welcome | goodbye")
    ),
    request_body(content = GenerateForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "PNG 图片", body = Vec<u8>, content_type = "image/png"),
        (status = 400, description = "输入无效", body = crate::error::ProblemDetails, content_type = "application/problem+json"),
        (status = 413, description = "上传体积超限"),
        (status = 422, description = "头像无法解码", body = crate::error::ProblemDetails, content_type = "application/problem+json"),
        (status = 500, description = "渲染失败", body = crate::error::ProblemDetails, content_type = "application/problem+json"),
        (status = 504, description = "渲染超时", body = crate::error::ProblemDetails, content_type = "application/problem+json")
    ),
    tag = "Image"
)]
pub async fn generate_card(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let t_total = Instant::now();
    let kind = RecipeKind::from_str(&kind)?;
    let req = read_form(multipart).await?.into_request(kind)?;
    tracing::debug!(
        kind = %kind,
        tier = req.tier.label(),
        avatar_bytes = req.avatar.len(),
        "收到生成请求"
    );

    let result = state.image_service.render(req).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(result.mime_type),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

    tracing::info!(
        kind = %kind,
        "生成请求完成，字节大小: {}, 总耗时: {:?}",
        result.bytes.len(),
        t_total.elapsed()
    );
    Ok((headers, Bytes::from(result.bytes)))
}

pub fn create_image_router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/generate/:kind", post(generate_card))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_literal_true_enables_flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag(" True "));
        assert!(!parse_flag("1"));
        assert!(!parse_flag("yes"));
        assert!(!parse_flag("on"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn form_without_avatar_is_invalid() {
        let form = UploadForm {
            username: Some("neo".to_string()),
            ..Default::default()
        };
        let err = form.into_request(RecipeKind::Profile).expect_err("must fail");
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn owner_flag_wins_and_blank_server_keeps_default() {
        let form = UploadForm {
            username: Some("neo".to_string()),
            avatar: Some(vec![1, 2, 3]),
            server_name: Some("  ".to_string()),
            is_premium: true,
            is_owner: true,
            ..Default::default()
        };
        let req = form.into_request(RecipeKind::Welcome).expect("request");
        assert_eq!(req.tier, StatusTier::Owner);
        assert_eq!(req.server_name, "CyberServer");
    }
}

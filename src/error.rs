use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 应用统一错误类型
///
/// 渲染引擎只会产生前三类错误；其余变体属于接入层（HTTP 适配）。
/// 任一错误对本次渲染都是终态：不存在“部分成功”的图片输出。
#[derive(Error, Debug, utoipa::ToSchema)]
pub enum AppError {
    /// 输入缺失或非法（用户名为空、头像缺失、未知字段等），在任何画布工作之前拒绝
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 头像字节无法解码为位图
    #[error("头像解码失败: {0}")]
    DecodeFailure(String),

    /// 底层绘制/栅格化/编码失败（如画布分配失败）
    #[error("图像渲染失败: {0}")]
    RenderFailure(String),

    /// 上传体积超过 `image.max_upload_bytes`
    #[error("上传体积超限: {0}")]
    PayloadTooLarge(String),

    /// 渲染超出调用方设定的时限
    #[error("渲染超时: {0}")]
    Timeout(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// RFC7807 风格的错误响应（Problem Details）。
///
/// 设计目标：
/// - 让所有 API 错误返回结构化 JSON，便于调用方稳定处理
/// - 与 OpenAPI 一致（content-type = application/problem+json）
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Bad Request")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 400)]
    pub status: u16,

    /// 人类可读的详细信息（尽量稳定，不建议依赖解析）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "INVALID_INPUT")]
    pub code: String,

    /// 可选：请求追踪 ID（由 request-id 中间件注入）。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::DecodeFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::RenderFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn stable_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::DecodeFailure(_) => "AVATAR_DECODE_FAILED",
            AppError::RenderFailure(_) => "RENDER_FAILED",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Timeout(_) => "RENDER_TIMEOUT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNPROCESSABLE_ENTITY => "Unprocessable Entity",
            StatusCode::PAYLOAD_TOO_LARGE => "Payload Too Large",
            StatusCode::GATEWAY_TIMEOUT => "Gateway Timeout",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 服务端故障需要留痕；输入类错误只记 debug，避免日志被刷屏
        if status.is_server_error() {
            tracing::error!(code = self.stable_code(), "请求失败: {}", self);
        } else {
            tracing::debug!(code = self.stable_code(), "请求被拒绝: {}", self);
        }

        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}

// =============== 常见外部错误的转换 ===============

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::DecodeFailure(err.to_string())
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge(err.body_text());
        }
        AppError::InvalidInput(format!("multipart 解析失败: {}", err.body_text()))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("阻塞渲染任务执行失败: {err}"))
    }
}

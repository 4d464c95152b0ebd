use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// 请求 ID 头（请求与响应共用）
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

tokio::task_local! {
    /// 当前请求的 request_id，供 ProblemDetails 回填 `requestId`
    static TASK_REQUEST_ID: String;
}

/// 当前异步任务所属请求的 request_id；不在请求上下文中时为 None
pub fn current_request_id() -> Option<String> {
    TASK_REQUEST_ID.try_with(Clone::clone).ok()
}

fn is_valid_request_id(v: &str) -> bool {
    (1..=MAX_REQUEST_ID_LEN).contains(&v.len())
        && v.bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// 客户端传入的合法 ID 原样沿用，否则生成 `card_<uuid>`
fn resolve_request_id(req: &Request) -> String {
    req.headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|raw| is_valid_request_id(raw))
        .map(str::to_string)
        .unwrap_or_else(|| format!("card_{}", Uuid::new_v4().simple()))
}

/// request_id 中间件
///
/// 整个请求（包括阻塞线程池中的渲染）都在 `request` span 内执行，
/// 因此渲染耗时日志会自动带上 request_id；响应头回写同一个 ID。
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = resolve_request_id(&req);
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut res = TASK_REQUEST_ID
        .scope(request_id.clone(), next.run(req))
        .instrument(span)
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_safe_client_ids() {
        assert!(is_valid_request_id("req-123_abc.def"));
        assert!(is_valid_request_id(&"a".repeat(MAX_REQUEST_ID_LEN)));
    }

    #[test]
    fn rejects_empty_oversized_and_unsafe_ids() {
        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id(&"a".repeat(MAX_REQUEST_ID_LEN + 1)));
        assert!(!is_valid_request_id("bad id"));
        assert!(!is_valid_request_id("bad/xx"));
    }

    #[test]
    fn generated_ids_are_prefixed_and_valid() {
        let req = Request::builder()
            .header("x-request-id", "has spaces")
            .body(axum::body::Body::empty())
            .unwrap();
        let id = resolve_request_id(&req);
        assert!(id.starts_with("card_"));
        assert!(is_valid_request_id(&id));
    }

    #[test]
    fn outside_request_scope_there_is_no_id() {
        assert_eq!(current_request_id(), None);
    }
}

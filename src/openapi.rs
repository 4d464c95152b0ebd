use utoipa::OpenApi;
use utoipa::openapi::server::{ServerBuilder, ServerVariableBuilder};
use utoipa::{Modify, openapi};

/// 为 Swagger UI 提供正确的“业务接口前缀”Servers 配置。
///
/// - 生成接口默认挂载在 `/api` 下（对应 `config.api.prefix` / `APP_API_PREFIX`）。
/// - `/health` 不带前缀，因此额外提供 `/` 作为备用 server。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("业务接口（默认 /api）"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/api")
                    .description(Some(
                        "业务接口前缀：对应 config.api.prefix（可通过 APP_API_PREFIX 覆盖）",
                    )),
            )
            .build();

        let root = ServerBuilder::new()
            .url("/")
            .description(Some("根路径（用于 /health）"))
            .build();

        openapi.servers = Some(vec![api, root]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::image::handler::generate_card,
    ),
    components(schemas(
        crate::error::ProblemDetails,
        crate::features::health::HealthResponse,
        crate::features::image::handler::GenerateForm,
        crate::features::image::types::EffectFlags,
    )),
    modifiers(&ApiServers),
    tags(
        (
            name = "Image",
            description = "卡片生成：上传头像，渲染 profile / welcome / goodbye 三种 PNG。"
        ),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "Cyber Card API",
        version = env!("CARGO_PKG_VERSION"),
        description = "赛博朋克风格头像卡片 / 横幅生成服务（Axum + utoipa）。除 /health 外，接口实际挂载在 `config.api.prefix`（默认 /api）下，OpenAPI 的 paths 不包含该前缀。"
    )
)]
pub struct ApiDoc;

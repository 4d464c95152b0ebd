use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 初始化全局 tracing 订阅者
///
/// `RUST_LOG` 优先；未设置时使用 `cyber_card=<logging.level>,tower_http=info`。
/// 重复初始化（例如测试中）会被忽略。
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("cyber_card={},tower_http=info", config.level))
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.format.eq_ignore_ascii_case("compact") {
        builder.compact().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        tracing::debug!("tracing 已初始化，跳过: {}", e);
    }
}

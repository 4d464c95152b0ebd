use cyber_card::features::image::ImageService;
use cyber_card::logging::init_tracing;
use cyber_card::startup::run_startup_checks;
use cyber_card::{AppConfig, AppState, ShutdownManager, build_app};

#[tokio::main]
async fn main() {
    // Load config
    if let Err(e) = AppConfig::init_global() {
        eprintln!("Config init failed: {e}");
        std::process::exit(1);
    }
    let config = AppConfig::global();
    init_tracing(&config.logging);

    // 创建优雅退出管理器并启动信号处理器
    let shutdown_manager = ShutdownManager::new();
    if let Err(e) = shutdown_manager.start_signal_handler() {
        tracing::error!("信号处理器启动失败: {}", e);
        std::process::exit(1);
    }

    // Run startup checks
    let glyphs = match run_startup_checks(config).await {
        Ok(glyphs) => glyphs,
        Err(e) => {
            tracing::error!("Startup checks failed: {}", e);
            std::process::exit(1);
        }
    };

    let image_service = ImageService::new(&config.image, glyphs);
    tracing::info!(
        "渲染并发许可: {}, 单次超时: {:?}, 上传上限: {} 字节",
        config.image.effective_parallelism(),
        config.image.render_timeout(),
        config.image.max_upload_bytes
    );
    let app = build_app(config, AppState::new(image_service.clone()));

    let addr = config.server_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Bind address failed {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server: http://{}", addr);
    tracing::info!("Docs: http://{}/docs", addr);
    tracing::info!("Health: http://{}/health", addr);
    tracing::info!(
        "Generate API: http://{}{}/generate/{{profile|welcome|goodbye}}",
        addr,
        config.api.prefix
    );

    let signal_manager = shutdown_manager.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                signal_manager.wait_for_shutdown().await;
                tracing::info!("开始优雅关闭HTTP服务器...");
            })
            .await
    });

    tokio::select! {
        res = &mut server => {
            // 未收到退出信号服务器就结束了，只可能是运行错误
            match res {
                Ok(Ok(())) => tracing::warn!("服务器意外退出"),
                Ok(Err(e)) => tracing::error!("服务器运行错误: {}", e),
                Err(e) => tracing::error!("服务器任务异常: {}", e),
            }
            std::process::exit(1);
        }
        reason = shutdown_manager.wait_for_shutdown() => {
            tracing::info!("接收到退出信号: {:?}，开始优雅退出...", reason);
        }
    }

    let shutdown_timeout = config.shutdown.timeout_duration();
    tracing::info!("优雅退出超时时间: {}秒", config.shutdown.timeout_secs);
    let finished = tokio::time::timeout(shutdown_timeout, async {
        if let Ok(Err(e)) = (&mut server).await {
            tracing::error!("服务器运行错误: {}", e);
        }
        // 连接已关闭，但超时请求留下的阻塞渲染任务可能仍在运行
        image_service.drain(shutdown_timeout).await
    })
    .await;

    match finished {
        Ok(true) => tracing::info!("服务器已优雅关闭"),
        Ok(false) | Err(_) => {
            tracing::warn!("优雅退出超时，强制退出");
            std::process::exit(1);
        }
    }
}

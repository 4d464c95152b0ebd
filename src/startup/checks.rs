use crate::config::AppConfig;
use crate::error::AppError;
use crate::features::image::GlyphAssets;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// 执行启动检查
///
/// 1. 检查并创建 resources 与字体文件夹
/// 2. 预热全局字体数据库
/// 3. 加载皇冠 / 认证徽章素材（失败时回退为矢量字形，不阻断启动）
pub async fn run_startup_checks(config: &AppConfig) -> Result<Arc<GlyphAssets>, AppError> {
    tracing::info!("🔍 开始执行启动检查...");

    ensure_folder("resources", &config.resources_path())?;
    ensure_folder("fonts", &config.fonts_path())?;

    // 扫描系统字体与自定义字体较慢，放到阻塞线程池中完成
    let t_prewarm = std::time::Instant::now();
    let fonts_dir = config.fonts_path();
    let faces = tokio::task::spawn_blocking(move || {
        crate::features::image::prewarm_fonts(&fonts_dir)
    })
    .await?;
    if faces == 0 {
        tracing::warn!("⚠️ 未发现任何可用字体，文字将无法绘制；请在字体目录放置 .ttf/.otf 文件");
    } else {
        tracing::info!(
            "✅ 字体数据库预热完成: {} 个字形面, {}ms",
            faces,
            t_prewarm.elapsed().as_millis()
        );
    }

    let glyphs = GlyphAssets::load(&config.resources).await;
    tracing::info!(
        "✅ 装饰素材: 皇冠={}, 认证徽章={}",
        if glyphs.crown.is_some() { "位图" } else { "矢量回退" },
        if glyphs.badge.is_some() { "位图" } else { "矢量回退" }
    );

    tracing::info!("✅ 启动检查完成");
    Ok(Arc::new(glyphs))
}

/// 确保目录存在，缺失时创建
fn ensure_folder(label: &str, path: &Path) -> Result<(), AppError> {
    if path.exists() {
        tracing::info!("✅ {} 文件夹已存在: {:?}", label, path);
        return Ok(());
    }

    tracing::warn!("📁 未找到 {} 文件夹，正在创建: {:?}", label, path);
    fs::create_dir_all(path)
        .map_err(|e| AppError::Internal(format!("创建 {label} 文件夹失败: {e}")))?;
    tracing::info!("✅ {} 文件夹创建成功", label);
    Ok(())
}

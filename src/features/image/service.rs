use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;

use super::assets::GlyphAssets;
use super::renderer::{self, RenderOptions};
use super::types::{RenderRequest, RenderResult};
use crate::config::ImageRenderConfig;
use crate::error::AppError;

/// 渲染服务：限制并发、放到阻塞线程池执行并施加超时
///
/// 克隆开销很小，所有克隆共享同一个信号量与字形素材。
#[derive(Clone)]
pub struct ImageService {
    semaphore: Arc<Semaphore>,
    parallelism: usize,
    glyphs: Arc<GlyphAssets>,
    options: RenderOptions,
    timeout: Option<Duration>,
}

impl ImageService {
    pub fn new(config: &ImageRenderConfig, glyphs: Arc<GlyphAssets>) -> Self {
        let parallelism = config.effective_parallelism();
        Self {
            semaphore: Arc::new(Semaphore::new(parallelism)),
            parallelism,
            glyphs,
            options: RenderOptions::from_config(config),
            timeout: config.render_timeout(),
        }
    }

    /// 当前空闲的渲染许可数
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 等待所有进行中的渲染结束（退出阶段使用）；在时限内排空返回 true
    pub async fn drain(&self, limit: Duration) -> bool {
        let total = u32::try_from(self.parallelism).unwrap_or(u32::MAX);
        tokio::time::timeout(limit, self.semaphore.acquire_many(total))
            .await
            .is_ok()
    }

    /// 渲染一张图片。超时只影响本次响应，已开始的阻塞任务会在后台跑完并释放许可。
    pub async fn render(&self, req: RenderRequest) -> Result<RenderResult, AppError> {
        // 输入错误不占用渲染许可
        req.validate()?;

        let kind = req.kind;
        let work = self.render_inner(req);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                tracing::warn!(kind = %kind, "渲染超时（{:?}）", limit);
                AppError::Timeout(format!("{kind} 渲染超过 {}s", limit.as_secs()))
            })?,
            None => work.await,
        }
    }

    async fn render_inner(&self, req: RenderRequest) -> Result<RenderResult, AppError> {
        let t_wait = Instant::now();
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(format!("获取渲染信号量失败: {e}")))?;
        tracing::debug!(
            "渲染许可获取完成，剩余许可: {}, 等待: {:?}",
            self.semaphore.available_permits(),
            t_wait.elapsed()
        );

        let glyphs = Arc::clone(&self.glyphs);
        let options = self.options;
        let span = tracing::Span::current();
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _entered = span.enter();
            let mut rng = rand::thread_rng();
            renderer::render(&req, &glyphs, &mut rng, options)
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::image::types::RecipeKind;

    fn config() -> ImageRenderConfig {
        serde_json::from_str(r#"{"max_parallel": 2}"#).expect("config")
    }

    #[tokio::test]
    async fn invalid_request_does_not_take_a_permit() {
        let service = ImageService::new(&config(), Arc::new(GlyphAssets::default()));
        let req = RenderRequest::new(RecipeKind::Profile, "", vec![1, 2, 3]);
        let err = service.render(req).await.expect_err("must fail");
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(service.available_permits(), 2);
    }

    #[tokio::test]
    async fn decode_failure_propagates_from_blocking_pool() {
        let service = ImageService::new(&config(), Arc::new(GlyphAssets::default()));
        let req = RenderRequest::new(RecipeKind::Goodbye, "ghost", b"nope".to_vec());
        let err = service.render(req).await.expect_err("must fail");
        assert!(matches!(err, AppError::DecodeFailure(_)));
        assert_eq!(service.available_permits(), 2);
    }

    #[tokio::test]
    async fn idle_service_drains_immediately() {
        let service = ImageService::new(&config(), Arc::new(GlyphAssets::default()));
        assert!(service.drain(Duration::from_millis(50)).await);
        assert_eq!(service.available_permits(), 2);
    }
}

use crate::features::image::ImageService;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 渲染服务（内部持有并发信号量与只读字形素材）
    pub image_service: ImageService,
}

impl AppState {
    pub fn new(image_service: ImageService) -> Self {
        Self { image_service }
    }
}

pub mod assets;
pub mod fonts;
pub mod handler;
pub mod palette;
pub mod primitives;
pub mod recipes;
pub mod renderer;
mod service;
pub mod surface;
pub mod types;

/// 启动期预热字体数据库，避免首个渲染请求承担系统字体扫描的延迟
pub(crate) fn prewarm_fonts(fonts_dir: &std::path::Path) -> usize {
    fonts::init_global_font_db(fonts_dir).len()
}

pub use assets::GlyphAssets;
pub use handler::create_image_router;
pub use renderer::{RenderOptions, rasterize, render};
pub use service::ImageService;
pub use types::{EffectFlags, RecipeKind, RenderRequest, RenderResult, StatusTier};

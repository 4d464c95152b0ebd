//! 位图素材：头像解码与装饰字形（皇冠、认证徽章）

use base64::{Engine as _, engine::general_purpose::STANDARD as base64_engine};
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use crate::config::ResourcesConfig;
use crate::error::AppError;

/// 远程素材下载超时
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// 已解码的位图
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
}

impl RasterImage {
    /// 自动识别格式并解码；无法解码时返回 `DecodeFailure`
    pub fn decode(bytes: &[u8]) -> Result<Self, AppError> {
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("图片数据为空".to_string()));
        }
        let image = image::load_from_memory(bytes)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(AppError::DecodeFailure("图片尺寸为 0".to_string()));
        }
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// 拉伸到目标尺寸后编码为 PNG data URI（保留透明通道）
    pub fn to_data_uri(&self, target_w: u32, target_h: u32, fast: bool) -> Result<String, AppError> {
        let target_w = target_w.max(1);
        let target_h = target_h.max(1);
        let filter = if fast {
            FilterType::Triangle
        } else {
            FilterType::Lanczos3
        };
        let scaled = if self.width() == target_w && self.height() == target_h {
            self.image.clone()
        } else {
            self.image.resize_exact(target_w, target_h, filter)
        };
        png_data_uri(&DynamicImage::ImageRgba8(scaled.to_rgba8()))
    }

    /// 按原尺寸编码为 PNG data URI
    pub fn to_data_uri_original(&self) -> Result<String, AppError> {
        png_data_uri(&DynamicImage::ImageRgba8(self.image.to_rgba8()))
    }
}

fn png_data_uri(image: &DynamicImage) -> Result<String, AppError> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| AppError::RenderFailure(format!("位图编码失败: {e}")))?;
    let b64 = base64_engine.encode(out.into_inner());
    Ok(format!("data:image/png;base64,{b64}"))
}

/// 装饰字形素材（启动时加载一次，之后以 `Arc` 只读共享）
///
/// 缺失的字形由配方以内置矢量图形代替。
#[derive(Debug, Clone, Default)]
pub struct GlyphAssets {
    /// 皇冠 PNG data URI
    pub crown: Option<String>,
    /// 认证徽章 PNG data URI
    pub badge: Option<String>,
}

impl GlyphAssets {
    /// 从配置的来源（文件路径或 http(s) URL）加载皇冠与徽章
    pub async fn load(resources: &ResourcesConfig) -> Self {
        let base = Path::new(&resources.base_path);
        let crown = match resources.crown_source.as_deref() {
            Some(src) => load_glyph("crown", src, base).await,
            None => None,
        };
        let badge = match resources.badge_source.as_deref() {
            Some(src) => load_glyph("badge", src, base).await,
            None => None,
        };
        Self { crown, badge }
    }
}

async fn load_glyph(name: &str, source: &str, base: &Path) -> Option<String> {
    let source = source.trim();
    if source.is_empty() {
        return None;
    }
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        match fetch_remote(source).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!("下载装饰素材 {} 失败（将使用矢量回退）: {}", name, e);
                return None;
            }
        }
    } else {
        let path = base.join(source);
        match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(
                    "读取装饰素材 {} 失败 '{}'（将使用矢量回退）: {}",
                    name,
                    path.display(),
                    e
                );
                return None;
            }
        }
    };

    match RasterImage::decode(&bytes).and_then(|img| img.to_data_uri_original()) {
        Ok(uri) => {
            tracing::info!("装饰素材 {} 已加载（{} 字节）", name, bytes.len());
            Some(uri)
        }
        Err(e) => {
            tracing::warn!("装饰素材 {} 无法解码（将使用矢量回退）: {}", name, e);
            None
        }
    }
}

async fn fetch_remote(url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let resp = client.get(url).send().await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

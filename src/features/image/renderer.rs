//! 渲染管线：校验 → 头像解码 → 配方合成 → 栅格化 → PNG 编码
//!
//! 全部为同步 CPU 密集型操作，调用方需自行放到阻塞线程池中执行。

use rand::RngCore;
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{self, Options as UsvgOptions};
use std::time::{Duration, Instant};

use super::assets::{GlyphAssets, RasterImage};
use super::fonts::global_font_db;
use super::recipes::{self, RecipeInput};
use super::types::{RenderRequest, RenderResult};
use crate::config::ImageRenderConfig;
use crate::error::AppError;

/// 栅格化与编码选项
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// true：速度优先（快速抗锯齿、快速压缩）；false：质量优先
    pub optimize_speed: bool,
}

impl RenderOptions {
    pub fn from_config(cfg: &ImageRenderConfig) -> Self {
        Self {
            optimize_speed: cfg.optimize_speed,
        }
    }
}

/// 栅格化各阶段耗时
#[derive(Debug, Clone, Copy)]
struct RasterTimings {
    parse: Duration,
    raster: Duration,
    encode: Duration,
}

/// 执行一次完整渲染。任何一步失败都直接返回错误，不产生部分图片。
pub fn render(
    req: &RenderRequest,
    glyphs: &GlyphAssets,
    rng: &mut dyn RngCore,
    options: RenderOptions,
) -> Result<RenderResult, AppError> {
    req.validate()?;

    let t0 = Instant::now();
    let avatar = RasterImage::decode(&req.avatar)?;
    let t_decode = t0.elapsed();

    let input = RecipeInput {
        username: req.username.trim(),
        server_name: &req.server_name,
        tier: req.tier,
        effects: req.effects,
        avatar: &avatar,
        glyphs,
        fast: options.optimize_speed,
    };
    let svg = recipes::compose(req.kind, &input, rng)?.finish();
    let t_compose = t0.elapsed() - t_decode;

    let (bytes, timings) = rasterize_timed(&svg, options)?;

    tracing::info!(
        kind = %req.kind,
        tier = req.tier.label(),
        "渲染完成: 解码={:?}, 合成={:?}, 解析={:?}, 栅格化={:?}, 编码={:?}, 输出={} 字节",
        t_decode,
        t_compose,
        timings.parse,
        timings.raster,
        timings.encode,
        bytes.len()
    );

    Ok(RenderResult::png(bytes))
}

/// 把 SVG 场景栅格化并编码为 PNG
pub fn rasterize(svg: &str, options: RenderOptions) -> Result<Vec<u8>, AppError> {
    rasterize_timed(svg, options).map(|(bytes, _)| bytes)
}

fn rasterize_timed(svg: &str, options: RenderOptions) -> Result<(Vec<u8>, RasterTimings), AppError> {
    let t0 = Instant::now();
    let speed = options.optimize_speed;
    let opts = UsvgOptions {
        fontdb: global_font_db(),
        font_family: "sans-serif".to_string(),
        font_size: 16.0,
        languages: vec!["en".to_string()],
        shape_rendering: if speed {
            usvg::ShapeRendering::OptimizeSpeed
        } else {
            usvg::ShapeRendering::GeometricPrecision
        },
        text_rendering: if speed {
            usvg::TextRendering::OptimizeSpeed
        } else {
            usvg::TextRendering::OptimizeLegibility
        },
        image_rendering: if speed {
            usvg::ImageRendering::OptimizeSpeed
        } else {
            usvg::ImageRendering::OptimizeQuality
        },
        ..Default::default()
    };
    let tree = usvg::Tree::from_data(svg.as_bytes(), &opts)
        .map_err(|e| AppError::RenderFailure(format!("SVG 场景解析失败: {e}")))?;
    let t_parse = t0.elapsed();

    let size = tree.size().to_int_size();
    let (width, height) = (size.width(), size.height());
    let mut pixmap = Pixmap::new(width, height)
        .ok_or_else(|| AppError::RenderFailure(format!("无法分配 {width}x{height} 画布")))?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());
    let t_raster = t0.elapsed();

    // tiny-skia 内部为预乘 alpha，PNG 需要直通 alpha
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }

    let mut out = Vec::with_capacity(rgba.len() / 4);
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        if options.optimize_speed {
            encoder.set_compression(png::Compression::Fast);
            encoder.set_filter(png::FilterType::NoFilter);
        } else {
            encoder.set_compression(png::Compression::Default);
            encoder.set_filter(png::FilterType::Paeth);
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::RenderFailure(format!("PNG 写入文件头失败: {e}")))?;
        writer
            .write_image_data(&rgba)
            .map_err(|e| AppError::RenderFailure(format!("PNG 写入像素失败: {e}")))?;
        writer
            .finish()
            .map_err(|e| AppError::RenderFailure(format!("PNG 收尾失败: {e}")))?;
    }
    let t_encode = t0.elapsed();

    tracing::debug!(
        "栅格化内部分段: 解析={:?}, 栅格化={:?}, 编码={:?}",
        t_parse,
        t_raster - t_parse,
        t_encode - t_raster
    );

    Ok((
        out,
        RasterTimings {
            parse: t_parse,
            raster: t_raster - t_parse,
            encode: t_encode - t_raster,
        },
    ))
}

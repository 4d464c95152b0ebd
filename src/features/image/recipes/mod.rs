//! 合成配方：个人资料卡与欢迎/告别横幅
//!
//! 每个配方只负责把场景画到一张独占的 `DrawSurface` 上；栅格化与编码由 renderer 完成。

mod banner;
mod profile;

use rand::RngCore;

use super::assets::{GlyphAssets, RasterImage};
use super::surface::DrawSurface;
use super::types::{EffectFlags, RecipeKind, StatusTier};
use crate::error::AppError;

pub use banner::{BannerTheme, GOODBYE_THEME, GlitchIntensity, TerminalStyle, WELCOME_THEME};

/// 配方输入（头像已解码）
pub struct RecipeInput<'a> {
    pub username: &'a str,
    pub server_name: &'a str,
    pub tier: StatusTier,
    pub effects: EffectFlags,
    pub avatar: &'a RasterImage,
    pub glyphs: &'a GlyphAssets,
    /// 头像缩放是否优先速度
    pub fast: bool,
}

/// 按配方类型合成场景
pub fn compose(
    kind: RecipeKind,
    input: &RecipeInput<'_>,
    rng: &mut dyn RngCore,
) -> Result<DrawSurface, AppError> {
    match kind {
        RecipeKind::Profile => profile::compose(input, rng),
        RecipeKind::Welcome => banner::compose(&WELCOME_THEME, input, rng),
        RecipeKind::Goodbye => banner::compose(&GOODBYE_THEME, input, rng),
    }
}

/// 头像贴图：缩放到 2r × 2r 的方形区域
fn avatar_href(input: &RecipeInput<'_>, radius: f32) -> Result<String, AppError> {
    let side = (radius * 2.0).round() as u32;
    input.avatar.to_data_uri(side, side, input.fast)
}

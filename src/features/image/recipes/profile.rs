//! 个人资料卡（1280×480）

use rand::RngCore;

use super::{RecipeInput, avatar_href};
use crate::error::AppError;
use crate::features::image::fonts::FontSpec;
use crate::features::image::palette::{
    BLACK, CYBER_BLUE, CYBER_GOLD, CYBER_GREEN, DARK_BG, DARKER_BG, Rgba, ThemeColors, WHITE,
    recipe_accent,
};
use crate::features::image::primitives::{
    SCAN_LINE_HEIGHT, apply_glow, circuit_pattern, cyber_grid, hexagonal_avatar, matrix_rain,
    scan_line,
};
use crate::features::image::surface::{DrawSurface, TextAlign, TextBaseline};
use crate::features::image::types::{RecipeKind, StatusTier};

const AVATAR_CENTER: (f32, f32) = (240.0, 240.0);
const AVATAR_RADIUS: f32 = 120.0;

const USERNAME_ANCHOR: (f32, f32) = (700.0, 260.0);
const UNDERLINE_Y: f32 = 270.0;

/// 皇冠位置与尺寸 (x, y, 边长)
const CROWN_BOX: (f32, f32, f32) = (190.0, 10.0, 100.0);
const BADGE_SIZE: f32 = 50.0;

/// 状态按钮 (x, y, w, h)
const BUTTON: (f32, f32, f32, f32) = (130.0, 400.0, 220.0, 60.0);

const SIGNATURE: &str = "Created By SatzzDev";
const SIGNATURE_ANCHOR: (f32, f32) = (1170.0, 465.0);

pub(super) fn compose(
    input: &RecipeInput<'_>,
    rng: &mut dyn RngCore,
) -> Result<DrawSurface, AppError> {
    let (w, h) = RecipeKind::Profile.canvas_size();
    let mut s = DrawSurface::new(w, h)?;
    let (w, h) = (w as f32, h as f32);

    let theme = ThemeColors::resolve(input.tier, recipe_accent(RecipeKind::Profile));
    let effects = input.effects;

    s.layer("background", |s| {
        let bg = s.linear_gradient(0.0, 0.0, w, h, &[(0.0, DARKER_BG), (1.0, DARK_BG)]);
        s.set_fill(bg);
        s.fill_rect(0.0, 0.0, w, h);
    });

    cyber_grid(&mut s, 0.0, 0.0, w, h, theme.tier_or(CYBER_BLUE), 0.2);
    if effects.circuit_bg {
        circuit_pattern(&mut s, rng, 0.0, 0.0, w, h, theme.tier_or(CYBER_BLUE), 0.1);
    }
    if effects.matrix_rain {
        matrix_rain(&mut s, rng, 0.0, 0.0, w, h, theme.tier_or(CYBER_GREEN), 0.15);
    }
    if effects.scan_effect {
        scan_line(
            &mut s,
            0.0,
            h / 3.0,
            w,
            SCAN_LINE_HEIGHT,
            theme.tier_or(CYBER_BLUE),
            0.5,
        );
    }

    if input.tier == StatusTier::Owner {
        let crown = input.glyphs.crown.as_deref();
        s.layer("crown", |s| {
            apply_glow(s, CYBER_GOLD, 25.0);
            let (x, y, side) = CROWN_BOX;
            match crown {
                Some(href) => s.draw_image(href, x, y, side, side),
                None => draw_vector_crown(s, x, y, side),
            }
        });
    }

    let href = avatar_href(input, AVATAR_RADIUS)?;
    let (ax, ay) = AVATAR_CENTER;
    hexagonal_avatar(
        &mut s,
        ax,
        ay,
        AVATAR_RADIUS,
        &href,
        theme.border,
        effects.extra_glow,
    );

    let username = input.username.to_uppercase();
    let (ux, uy) = USERNAME_ANCHOR;
    let text_width = s.layer("username", |s| {
        s.set_font(FontSpec::sans_bold(60.0));
        apply_glow(s, theme.border, if effects.extra_glow { 30.0 } else { 15.0 });
        s.set_fill(WHITE);
        s.set_text_align(TextAlign::Center);
        s.fill_text(&username, ux, uy);

        let text_width = s.measure_text(&username);
        s.set_stroke(theme.border);
        s.set_line_width(4.0);
        s.begin_path();
        s.move_to(ux - text_width / 2.0, UNDERLINE_Y);
        s.line_to(ux + text_width / 2.0, UNDERLINE_Y);
        s.stroke();
        text_width
    });

    if input.tier.is_gold() {
        let badge = input.glyphs.badge.as_deref();
        s.layer("badge", |s| {
            apply_glow(s, CYBER_GOLD, 15.0);
            let x = ux + text_width / 2.0 + 10.0;
            let y = uy - 40.0;
            match badge {
                Some(href) => s.draw_image(href, x, y, BADGE_SIZE, BADGE_SIZE),
                None => draw_vector_badge(s, x, y, BADGE_SIZE),
            }
        });
    }

    draw_status_button(&mut s, &theme, input.tier);

    s.layer("signature", |s| {
        s.set_global_alpha(0.7);
        s.set_font(FontSpec::mono_bold(18.0));
        apply_glow(s, CYBER_BLUE, 5.0);
        s.set_fill(WHITE);
        s.set_text_align(TextAlign::Center);
        s.set_text_baseline(TextBaseline::Middle);
        let (x, y) = SIGNATURE_ANCHOR;
        s.fill_text(SIGNATURE, x, y);
    });

    Ok(s)
}

/// 渐变底色 + 边框 + 等级文字 + 网格罩层
fn draw_status_button(s: &mut DrawSurface, theme: &ThemeColors, tier: StatusTier) {
    let (bx, by, bw, bh) = BUTTON;
    s.layer("status-button", |s| {
        s.scoped(|s| {
            let fill = s.linear_gradient(
                bx,
                by,
                bx + bw,
                by,
                &[
                    (0.0, theme.button.with_alpha(0x40)),
                    (1.0, theme.button.with_alpha(0x10)),
                ],
            );
            s.set_fill(fill);
            apply_glow(s, theme.button, 15.0);
            s.fill_rect(bx, by, bw, bh);
        });

        s.set_stroke(theme.button);
        s.set_line_width(2.0);
        s.stroke_rect(bx, by, bw, bh);

        s.scoped(|s| {
            s.set_font(FontSpec::sans_bold(30.0));
            s.set_fill(theme.text);
            apply_glow(s, theme.tier_or(CYBER_BLUE), 15.0);
            s.set_text_align(TextAlign::Center);
            s.set_text_baseline(TextBaseline::Middle);
            s.fill_text(tier.label(), bx + bw / 2.0, by + bh / 2.0);
        });

        cyber_grid(s, bx, by, bw, bh, theme.button, 0.3);
    });
}

/// 皇冠素材缺失时的矢量替代：三尖冠 + 底座
fn draw_vector_crown(s: &mut DrawSurface, x: f32, y: f32, side: f32) {
    let unit = side / 10.0;
    s.set_fill(CYBER_GOLD);
    s.begin_path();
    s.move_to(x + unit, y + 8.0 * unit);
    s.line_to(x + unit, y + 3.0 * unit);
    s.line_to(x + 3.0 * unit, y + 5.5 * unit);
    s.line_to(x + 5.0 * unit, y + 1.5 * unit);
    s.line_to(x + 7.0 * unit, y + 5.5 * unit);
    s.line_to(x + 9.0 * unit, y + 3.0 * unit);
    s.line_to(x + 9.0 * unit, y + 8.0 * unit);
    s.close_path();
    s.fill();
    s.fill_rect(x + unit, y + 8.4 * unit, 8.0 * unit, unit);

    s.set_fill(Rgba::rgb(0xFF, 0xF3, 0xC4));
    s.begin_path();
    for (cx, cy) in [(1.0, 3.0), (5.0, 1.5), (9.0, 3.0)] {
        s.circle(x + cx * unit, y + cy * unit, 0.6 * unit);
    }
    s.fill();
}

/// 认证徽章素材缺失时的矢量替代：金色圆章 + 黑色对勾
fn draw_vector_badge(s: &mut DrawSurface, x: f32, y: f32, side: f32) {
    let r = side / 2.0;
    let (cx, cy) = (x + r, y + r);
    s.set_fill(CYBER_GOLD);
    s.begin_path();
    s.circle(cx, cy, r);
    s.fill();

    s.clear_glow();
    s.set_stroke(BLACK);
    s.set_line_width(side / 10.0);
    s.begin_path();
    s.move_to(cx - r * 0.45, cy);
    s.line_to(cx - r * 0.1, cy + r * 0.35);
    s.line_to(cx + r * 0.5, cy - r * 0.35);
    s.stroke();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::image::assets::{GlyphAssets, RasterImage};
    use crate::features::image::types::EffectFlags;
    use image::{DynamicImage, ImageFormat, Rgba as Px, RgbaImage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;

    fn avatar() -> RasterImage {
        let img = RgbaImage::from_pixel(8, 8, Px([0, 128, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode");
        RasterImage::decode(&out.into_inner()).expect("decode")
    }

    fn scene(username: &str, tier: StatusTier, effects: EffectFlags) -> String {
        let avatar = avatar();
        let glyphs = GlyphAssets::default();
        let input = RecipeInput {
            username,
            server_name: "",
            tier,
            effects,
            avatar: &avatar,
            glyphs: &glyphs,
            fast: true,
        };
        let mut rng = StdRng::seed_from_u64(3);
        compose(&input, &mut rng).expect("compose").finish()
    }

    #[test]
    fn free_profile_has_no_crown_or_badge() {
        let svg = scene("neo", StatusTier::Free, EffectFlags::default());
        assert!(svg.contains(r#"width="1280" height="480""#));
        assert!(svg.contains(">NEO</text>"));
        assert!(svg.contains(">FREE</text>"));
        assert!(!svg.contains(r#"class="crown""#));
        assert!(!svg.contains(r#"class="badge""#));
        assert!(!svg.contains("#FFC107"));
    }

    #[test]
    fn owner_profile_gets_crown_badge_and_gold() {
        let effects = EffectFlags {
            extra_glow: true,
            ..Default::default()
        };
        let svg = scene("admin", StatusTier::Owner, effects);
        assert!(svg.contains(r#"class="crown""#));
        assert!(svg.contains(r#"class="badge""#));
        assert!(svg.contains(">OWNER</text>"));
        assert!(svg.contains("#FFC107"));
        assert!(!svg.contains("#00FFFF\" stroke-width=\"0.5\""));
        // 用户名光晕 30 → stdDeviation 15
        assert!(svg.contains(r#"stdDeviation="15""#));
    }

    #[test]
    fn premium_profile_has_badge_without_crown() {
        let svg = scene("vip", StatusTier::Premium, EffectFlags::default());
        assert!(svg.contains(r#"class="badge""#));
        assert!(!svg.contains(r#"class="crown""#));
        assert!(svg.contains(">PREMIUM</text>"));
    }

    #[test]
    fn scan_effect_adds_single_band() {
        let effects = EffectFlags {
            scan_effect: true,
            ..Default::default()
        };
        let svg = scene("neo", StatusTier::Free, effects);
        assert_eq!(svg.matches(r#"class="scan-line""#).count(), 1);
        assert!(svg.contains(r#"y="160""#));
    }

    #[test]
    fn deterministic_without_effects() {
        let a = scene("neo", StatusTier::Premium, EffectFlags::default());
        let b = scene("neo", StatusTier::Premium, EffectFlags::default());
        assert_eq!(a, b);
    }
}

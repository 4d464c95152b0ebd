//! 欢迎 / 告别横幅（1920×768）
//!
//! 两种横幅共用同一套绘制顺序，差异全部收敛在 `BannerTheme` 描述符里：
//! 配色、文案、终端面板样式，以及“故障感”强度。

use rand::{Rng, RngCore};
use std::f32::consts::PI;

use super::{RecipeInput, avatar_href};
use crate::error::AppError;
use crate::features::image::fonts::FontSpec;
use crate::features::image::palette::{
    BLACK, CYBER_BLUE, CYBER_GREEN, CYBER_PINK, CYBER_PURPLE, CYBER_RED, DARK_GREEN, DARK_PURPLE,
    DARKER_BG, Rgba, ThemeColors, WHITE,
};
use crate::features::image::primitives::{
    SCAN_LINE_HEIGHT, apply_glow, circuit_pattern, cyber_grid, hexagon_path, hexagonal_avatar,
    matrix_rain, scan_line,
};
use crate::features::image::surface::{DrawSurface, TextAlign};
use crate::features::image::types::RecipeKind;

const AVATAR_RADIUS: f32 = 100.0;

/// 故障感强度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlitchIntensity {
    /// 同心圆环、放射数据线、固定位置的扫描线
    Calm,
    /// 随机断线、残影用户名、随机扫描线、破损终端边框
    Corrupted,
}

/// 终端面板样式
#[derive(Debug, Clone, Copy)]
pub struct TerminalStyle {
    pub width: f32,
    pub height: f32,
    pub corner: f32,
    pub glow_blur: f32,
    /// 背景渐变是否沿对角线方向
    pub diagonal: bool,
    /// 渐变中点的 alpha 字节
    pub mid_alpha: u8,
    /// 中点是否使用次要色
    pub mid_secondary: bool,
    /// 边框虚线（空为实线）
    pub border_dash: &'static [f32],
    /// 左上角横向与右上角纵向的刻意错位
    pub notch: (f32, f32),
}

/// 横幅主题描述符
#[derive(Debug, Clone, Copy)]
pub struct BannerTheme {
    pub kind: RecipeKind,
    /// 基础强调色（付费/所有者时整体替换为金色）
    pub accent: Rgba,
    /// 次要色（不随等级变化）
    pub secondary: Rgba,
    /// 径向背景中心色
    pub background_core: Rgba,
    /// 环境光 alpha 字节
    pub ambient_alpha: u8,
    pub grid_opacity: f32,
    pub circuit_opacity: f32,
    pub matrix_opacity: f32,
    /// 用户名光晕（普通, extra_glow）
    pub username_glow: (f32, f32),
    /// 下划线两端的额外留白
    pub underline_pad: f32,
    /// 服务器名前缀
    pub greeting: &'static str,
    pub captions: [&'static str; 2],
    /// 终端文字光晕色；None 表示使用强调色
    pub caption_glow: Option<Rgba>,
    pub caption_glow_blur: f32,
    pub terminal: TerminalStyle,
    pub scatter_count: usize,
    /// 散布图形尺寸区间 [min, min + span)
    pub scatter_size: (f32, f32),
    pub glitch: GlitchIntensity,
}

pub const WELCOME_THEME: BannerTheme = BannerTheme {
    kind: RecipeKind::Welcome,
    accent: CYBER_GREEN,
    secondary: CYBER_BLUE,
    background_core: DARK_GREEN,
    ambient_alpha: 0x20,
    grid_opacity: 0.2,
    circuit_opacity: 0.15,
    matrix_opacity: 0.2,
    username_glow: (25.0, 40.0),
    underline_pad: 20.0,
    greeting: "WELCOME TO",
    captions: ["// ACCESS GRANTED //", "// CONNECTION ESTABLISHED //"],
    caption_glow: None,
    caption_glow_blur: 20.0,
    terminal: TerminalStyle {
        width: 500.0,
        height: 80.0,
        corner: 10.0,
        glow_blur: 20.0,
        diagonal: false,
        mid_alpha: 0x30,
        mid_secondary: false,
        border_dash: &[],
        notch: (0.0, 0.0),
    },
    scatter_count: 8,
    scatter_size: (30.0, 80.0),
    glitch: GlitchIntensity::Calm,
};

pub const GOODBYE_THEME: BannerTheme = BannerTheme {
    kind: RecipeKind::Goodbye,
    accent: CYBER_PINK,
    secondary: CYBER_PURPLE,
    background_core: DARK_PURPLE,
    ambient_alpha: 0x15,
    grid_opacity: 0.15,
    circuit_opacity: 0.15,
    matrix_opacity: 0.25,
    username_glow: (20.0, 35.0),
    underline_pad: 30.0,
    greeting: "GOODBYE FROM",
    captions: ["// CONNECTION TERMINATED //", "// SYSTEM OFFLINE //"],
    caption_glow: Some(CYBER_RED),
    caption_glow_blur: 25.0,
    terminal: TerminalStyle {
        width: 520.0,
        height: 100.0,
        corner: 15.0,
        glow_blur: 15.0,
        diagonal: true,
        mid_alpha: 0x20,
        mid_secondary: true,
        border_dash: &[15.0, 5.0, 2.0, 5.0],
        notch: (5.0, -3.0),
    },
    scatter_count: 12,
    scatter_size: (20.0, 100.0),
    glitch: GlitchIntensity::Corrupted,
};

/// 单次合成用到的已解析颜色
struct Colors {
    /// 随等级变化的强调色
    primary: Rgba,
    secondary: Rgba,
}

pub(super) fn compose(
    theme: &BannerTheme,
    input: &RecipeInput<'_>,
    rng: &mut dyn RngCore,
) -> Result<DrawSurface, AppError> {
    let (w, h) = theme.kind.canvas_size();
    let mut s = DrawSurface::new(w, h)?;
    let (w, h) = (w as f32, h as f32);
    let (cx, cy) = (w / 2.0, h / 3.0);

    let resolved = ThemeColors::resolve(input.tier, theme.accent);
    let colors = Colors {
        primary: resolved.accent,
        secondary: theme.secondary,
    };
    let effects = input.effects;

    draw_background(&mut s, theme, &colors, w, h);
    cyber_grid(&mut s, 0.0, 0.0, w, h, colors.primary, theme.grid_opacity);

    match theme.glitch {
        GlitchIntensity::Calm => draw_rings(&mut s, &colors, w / 2.0, h / 2.0),
        GlitchIntensity::Corrupted => draw_disconnect_strokes(&mut s, rng, &colors, w, h),
    }

    if effects.circuit_bg {
        circuit_pattern(&mut s, rng, 0.0, 0.0, w, h, colors.primary, theme.circuit_opacity);
    }
    if effects.matrix_rain {
        matrix_rain(&mut s, rng, 0.0, 0.0, w, h, colors.primary, theme.matrix_opacity);
    }
    if effects.scan_effect {
        match theme.glitch {
            GlitchIntensity::Calm => {
                for (y, opacity) in [(h / 4.0, 0.6), (h / 2.0, 0.4), (h * 3.0 / 4.0, 0.6)] {
                    scan_line(&mut s, 0.0, y, w, SCAN_LINE_HEIGHT, colors.primary, opacity);
                }
            }
            GlitchIntensity::Corrupted => {
                for _ in 0..6 {
                    let y = rng.r#gen::<f32>() * h;
                    let opacity = 0.3 + rng.r#gen::<f32>() * 0.4;
                    scan_line(&mut s, 0.0, y, w, SCAN_LINE_HEIGHT, colors.primary, opacity);
                }
            }
        }
    }

    let href = avatar_href(input, AVATAR_RADIUS)?;
    hexagonal_avatar(
        &mut s,
        cx,
        cy,
        AVATAR_RADIUS,
        &href,
        colors.primary,
        effects.extra_glow,
    );

    match theme.glitch {
        GlitchIntensity::Calm => draw_data_lines(&mut s, &colors, cx, cy),
        GlitchIntensity::Corrupted => draw_corrupted_lines(&mut s, rng, &colors, cx, cy),
    }

    let username = input.username.to_uppercase();
    let text_width = draw_username(&mut s, theme, &colors, &username, cx, cy, effects.extra_glow);
    draw_underline(&mut s, theme, &colors, rng, text_width, cx, cy);

    let server_line = format!("{} {}", theme.greeting, input.server_name.to_uppercase());
    s.layer("server-line", |s| {
        let fill = s.linear_gradient(
            cx - 200.0,
            cy + 300.0,
            cx + 200.0,
            cy + 300.0,
            &[(0.0, colors.primary), (1.0, colors.secondary)],
        );
        s.set_font(FontSpec::sans_bold(40.0));
        apply_glow(s, colors.primary, 15.0);
        s.set_fill(fill);
        s.set_text_align(TextAlign::Center);
        s.fill_text(&server_line, cx, cy + 300.0);
    });

    draw_terminal(&mut s, theme, &colors, cx, cy + 350.0);
    draw_scatter(&mut s, theme, rng, &colors, w, h);

    Ok(s)
}

fn draw_background(s: &mut DrawSurface, theme: &BannerTheme, colors: &Colors, w: f32, h: f32) {
    s.layer("background", |s| {
        let bg = s.radial_gradient(
            w / 2.0,
            h / 2.0,
            w / 1.5,
            &[(0.0, theme.background_core), (0.6, DARKER_BG), (1.0, BLACK)],
        );
        s.set_fill(bg);
        s.fill_rect(0.0, 0.0, w, h);

        let ambient = s.radial_gradient(
            w / 2.0,
            h / 2.0,
            h / 2.0,
            &[
                (0.0, colors.primary.with_alpha(theme.ambient_alpha)),
                (1.0, colors.primary.transparent()),
            ],
        );
        s.set_fill(ambient);
        s.fill_rect(0.0, 0.0, w, h);
    });
}

/// 画布中心的三道同心圆环，第二道外侧再加一圈虚线
fn draw_rings(s: &mut DrawSurface, colors: &Colors, ox: f32, oy: f32) {
    s.layer("rings", |s| {
        s.set_stroke(colors.primary.with_alpha(0x30));
        s.set_line_width(1.0);
        for i in 0..3 {
            let radius = 100.0 + i as f32 * 150.0;
            s.begin_path();
            s.circle(ox, oy, radius);
            s.stroke();

            if i == 1 {
                s.scoped(|s| {
                    s.set_line_dash(&[5.0, 15.0]);
                    s.begin_path();
                    s.circle(ox, oy, radius + 10.0);
                    s.stroke();
                });
            }
        }
    });
}

/// 随机的水平断线，表现“连接中断”
fn draw_disconnect_strokes(s: &mut DrawSurface, rng: &mut dyn RngCore, colors: &Colors, w: f32, h: f32) {
    s.layer("glitch-lines", |s| {
        s.set_stroke(colors.primary.with_alpha(0x40));
        s.set_line_width(2.0);
        for _ in 0..15 {
            let y = rng.r#gen::<f32>() * h;
            let len = 50.0 + rng.r#gen::<f32>() * 200.0;
            let x = rng.r#gen::<f32>() * (w - len);
            s.begin_path();
            s.move_to(x, y);
            s.line_to(x + len, y);
            s.stroke();
        }
    });
}

/// 每 45° 一条从头像向外的虚线，末端带圆点
fn draw_data_lines(s: &mut DrawSurface, colors: &Colors, cx: f32, cy: f32) {
    s.layer("data-lines", |s| {
        s.set_stroke(colors.primary);
        s.set_fill(colors.primary);
        s.set_line_dash(&[5.0, 10.0]);
        s.set_line_width(1.0);
        for step in 0..8 {
            let rad = (step as f32 * 45.0) * PI / 180.0;
            let (sin, cos) = rad.sin_cos();
            let (end_x, end_y) = (cx + cos * 200.0, cy + sin * 200.0);

            s.begin_path();
            s.move_to(cx + cos * 130.0, cy + sin * 130.0);
            s.line_to(end_x, end_y);
            s.stroke();

            s.begin_path();
            s.circle(end_x, end_y, 3.0);
            s.fill();
        }
    });
}

/// 头像周围随机角度、随机透明度的破损射线
fn draw_corrupted_lines(s: &mut DrawSurface, rng: &mut dyn RngCore, colors: &Colors, cx: f32, cy: f32) {
    s.layer("corrupted-lines", |s| {
        s.set_stroke(colors.primary);
        s.set_line_width(1.0);
        for _ in 0..20 {
            let rad = rng.r#gen::<f32>() * 2.0 * PI;
            let len = 30.0 + rng.r#gen::<f32>() * 100.0;
            let start = 110.0 + rng.r#gen::<f32>() * 20.0;
            let (sin, cos) = rad.sin_cos();

            s.set_global_alpha(0.3 + rng.r#gen::<f32>() * 0.5);
            s.begin_path();
            s.move_to(cx + cos * start, cy + sin * start);
            s.line_to(cx + cos * (start + len), cy + sin * (start + len));
            s.stroke();
        }
    });
}

/// 用户名（告别主题先画一层偏移的紫色残影），返回测得的文字宽度
fn draw_username(
    s: &mut DrawSurface,
    theme: &BannerTheme,
    colors: &Colors,
    username: &str,
    cx: f32,
    cy: f32,
    extra_glow: bool,
) -> f32 {
    s.layer("username", |s| {
        s.set_font(FontSpec::sans_bold(60.0));
        let (normal, extra) = theme.username_glow;
        apply_glow(s, colors.primary, if extra_glow { extra } else { normal });
        s.set_text_align(TextAlign::Center);

        if theme.glitch == GlitchIntensity::Corrupted {
            s.set_fill(colors.secondary.with_alpha(0x90));
            s.fill_text(username, cx + 4.0, cy + 224.0);
        }

        s.set_fill(WHITE);
        s.fill_text(username, cx, cy + 220.0);
        s.measure_text(username)
    })
}

fn draw_underline(
    s: &mut DrawSurface,
    theme: &BannerTheme,
    colors: &Colors,
    rng: &mut dyn RngCore,
    text_width: f32,
    cx: f32,
    cy: f32,
) {
    let pad = theme.underline_pad;
    let (x0, x1, y) = (cx - text_width / 2.0 - pad, cx + text_width / 2.0 + pad, cy + 235.0);

    s.layer("underline", |s| {
        let stops = match theme.glitch {
            GlitchIntensity::Calm => vec![
                (0.0, colors.primary.transparent()),
                (0.2, colors.primary),
                (0.8, colors.primary),
                (1.0, colors.primary.transparent()),
            ],
            GlitchIntensity::Corrupted => vec![
                (0.0, colors.primary.transparent()),
                (0.3, colors.primary),
                (0.7, colors.secondary),
                (1.0, colors.secondary.transparent()),
            ],
        };
        let line = s.linear_gradient(x0, y, x1, y, &stops);
        s.set_stroke(line);
        s.set_line_width(3.0);
        s.begin_path();
        s.move_to(x0, y);
        s.line_to(x1, y);
        s.stroke();

        s.set_line_width(1.0);
        match theme.glitch {
            GlitchIntensity::Calm => {
                s.begin_path();
                s.move_to(cx - text_width / 4.0, cy + 245.0);
                s.line_to(cx + text_width / 4.0, cy + 245.0);
                s.stroke();
            }
            GlitchIntensity::Corrupted => {
                for i in 0..3 {
                    let tick = text_width * (0.2 + rng.r#gen::<f32>() * 0.3);
                    let x = cx - text_width / 2.0 + rng.r#gen::<f32>() * (text_width - tick);
                    let ty = cy + 245.0 + i as f32 * 4.0;
                    let color = if rng.r#gen::<f32>() > 0.5 {
                        colors.primary
                    } else {
                        colors.secondary
                    };
                    s.set_stroke(color);
                    s.begin_path();
                    s.move_to(x, ty);
                    s.line_to(x + tick, ty);
                    s.stroke();
                }
            }
        }
    });
}

/// 终端面板：渐变底、边框、四角装饰与两行说明文字
fn draw_terminal(s: &mut DrawSurface, theme: &BannerTheme, colors: &Colors, cx: f32, top: f32) {
    let style = theme.terminal;
    let (tw, th, corner) = (style.width, style.height, style.corner);
    let (tx, ty) = (cx - tw / 2.0, top);

    s.layer("terminal", |s| {
        apply_glow(s, colors.primary, style.glow_blur);

        let mid = if style.mid_secondary {
            colors.secondary
        } else {
            colors.primary
        };
        let (gx1, gy1) = if style.diagonal { (tx + tw, ty + th) } else { (tx + tw, ty) };
        let fill = s.linear_gradient(
            tx,
            ty,
            gx1,
            gy1,
            &[
                (0.0, colors.primary.with_alpha(0x10)),
                (0.5, mid.with_alpha(style.mid_alpha)),
                (1.0, colors.primary.with_alpha(0x10)),
            ],
        );
        s.set_fill(fill);
        s.fill_rect(tx, ty, tw, th);

        s.set_stroke(colors.primary);
        s.set_line_width(2.0);
        s.scoped(|s| {
            s.set_line_dash(style.border_dash);
            s.stroke_rect(tx, ty, tw, th);
        });

        let (tl_extra, tr_extra) = style.notch;
        let corners = [
            [(tx, ty + corner), (tx, ty), (tx + corner + tl_extra, ty)],
            [(tx + tw - corner, ty), (tx + tw, ty), (tx + tw, ty + corner + tr_extra)],
            [(tx, ty + th - corner), (tx, ty + th), (tx + corner, ty + th)],
            [(tx + tw - corner, ty + th), (tx + tw, ty + th), (tx + tw, ty + th - corner)],
        ];
        for [a, b, c] in corners {
            s.begin_path();
            s.move_to(a.0, a.1);
            s.line_to(b.0, b.1);
            s.line_to(c.0, c.1);
            s.stroke();
        }

        s.set_font(FontSpec::mono_bold(22.0));
        apply_glow(
            s,
            theme.caption_glow.unwrap_or(colors.primary),
            theme.caption_glow_blur,
        );
        s.set_fill(WHITE);
        s.set_text_align(TextAlign::Center);
        let [first, second] = theme.captions;
        s.fill_text(first, cx, ty + 30.0);
        s.fill_text(second, cx, ty + 50.0);
    });
}

/// 随机散布的半透明几何图形
fn draw_scatter(
    s: &mut DrawSurface,
    theme: &BannerTheme,
    rng: &mut dyn RngCore,
    colors: &Colors,
    w: f32,
    h: f32,
) {
    let (min, span) = theme.scatter_size;
    s.layer("scatter", |s| {
        s.set_line_width(1.0);
        for _ in 0..theme.scatter_count {
            let size = min + rng.r#gen::<f32>() * span;
            let x = rng.r#gen::<f32>() * w;
            let y = rng.r#gen::<f32>() * h;

            s.scoped(|s| match theme.glitch {
                GlitchIntensity::Calm => {
                    s.set_stroke(colors.primary.with_alpha(0x20));
                    if rng.r#gen::<f32>() > 0.5 {
                        hexagon_path(s, x, y, size);
                    } else {
                        s.begin_path();
                        s.circle(x, y, size);
                    }
                    s.stroke();
                }
                GlitchIntensity::Corrupted => {
                    s.set_global_alpha(0.1 + rng.r#gen::<f32>() * 0.2);
                    if rng.r#gen::<f32>() > 0.7 {
                        s.set_stroke(colors.primary);
                        hexagon_path(s, x, y, size);
                        s.stroke();
                    } else if rng.r#gen::<f32>() > 0.5 {
                        s.set_stroke(colors.secondary);
                        s.begin_path();
                        s.circle(x, y, size);
                        s.stroke();
                    } else {
                        s.set_stroke(CYBER_RED);
                        s.stroke_rect(x - size / 2.0, y - size / 2.0, size, size);
                        if rng.r#gen::<f32>() > 0.5 {
                            let d = size / 3.0;
                            s.begin_path();
                            s.move_to(x - d, y - d);
                            s.line_to(x + d, y + d);
                            s.move_to(x + d, y - d);
                            s.line_to(x - d, y + d);
                            s.stroke();
                        }
                    }
                }
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::image::assets::{GlyphAssets, RasterImage};
    use crate::features::image::palette::CYBER_GOLD;
    use crate::features::image::types::{EffectFlags, StatusTier};
    use image::{DynamicImage, ImageFormat, Rgba as Px, RgbaImage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;

    fn avatar() -> RasterImage {
        let img = RgbaImage::from_pixel(6, 6, Px([10, 200, 90, 255]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .expect("encode");
        RasterImage::decode(&out.into_inner()).expect("decode")
    }

    fn scene(theme: &BannerTheme, tier: StatusTier, effects: EffectFlags, seed: u64) -> String {
        let avatar = avatar();
        let glyphs = GlyphAssets::default();
        let input = RecipeInput {
            username: "new_user",
            server_name: "the_grid",
            tier,
            effects,
            avatar: &avatar,
            glyphs: &glyphs,
            fast: true,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        compose(theme, &input, &mut rng).expect("compose").finish()
    }

    #[test]
    fn welcome_scan_effect_draws_three_bands_and_caption() {
        let effects = EffectFlags {
            scan_effect: true,
            ..Default::default()
        };
        let svg = scene(&WELCOME_THEME, StatusTier::Free, effects, 1);
        assert!(svg.contains(r#"width="1920" height="768""#));
        assert_eq!(svg.matches(r#"class="scan-line""#).count(), 3);
        assert!(svg.contains(">WELCOME TO THE_GRID</text>"));
        assert!(svg.contains(">// ACCESS GRANTED //</text>"));
        assert!(svg.contains(">NEW_USER</text>"));
    }

    #[test]
    fn goodbye_has_ghost_username_and_six_bands() {
        let effects = EffectFlags {
            scan_effect: true,
            ..Default::default()
        };
        let svg = scene(&GOODBYE_THEME, StatusTier::Free, effects, 2);
        assert_eq!(svg.matches(r#"class="scan-line""#).count(), 6);
        assert_eq!(svg.matches(">NEW_USER</text>").count(), 2);
        assert!(svg.contains(">GOODBYE FROM THE_GRID</text>"));
        assert!(svg.contains(r#"stroke-dasharray="15 5 2 5""#));
        assert!(svg.contains(&CYBER_RED.hex()));
    }

    #[test]
    fn premium_banner_turns_gold() {
        let free = scene(&WELCOME_THEME, StatusTier::Free, EffectFlags::default(), 5);
        let premium = scene(&WELCOME_THEME, StatusTier::Premium, EffectFlags::default(), 5);
        assert!(!free.contains(&CYBER_GOLD.hex()));
        assert!(premium.contains(&CYBER_GOLD.hex()));
    }

    #[test]
    fn same_seed_reproduces_scene() {
        let effects = EffectFlags {
            circuit_bg: true,
            matrix_rain: true,
            scan_effect: true,
            extra_glow: true,
        };
        let a = scene(&GOODBYE_THEME, StatusTier::Owner, effects, 9);
        let b = scene(&GOODBYE_THEME, StatusTier::Owner, effects, 9);
        assert_eq!(a, b);
    }

    #[test]
    fn calm_theme_draws_eight_data_lines() {
        let svg = scene(&WELCOME_THEME, StatusTier::Free, EffectFlags::default(), 4);
        assert!(svg.contains(r#"class="data-lines""#));
        assert!(svg.contains(r#"stroke-dasharray="5 10""#));
        assert!(!svg.contains(r#"class="corrupted-lines""#));
    }
}

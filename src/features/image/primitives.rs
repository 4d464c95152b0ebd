//! 可复用的绘图原语
//!
//! 所有原语只依赖绘图表面与几何/颜色参数，不感知具体配方。
//! 每个原语都在自己的 save/restore 作用域内修改状态，调用结束后表面状态与调用前一致。

use rand::{Rng, RngCore};
use std::f32::consts::PI;

use super::fonts::FontSpec;
use super::palette::Rgba;
use super::surface::{BlendMode, DrawSurface};

/// 扫描线光带默认高度
pub const SCAN_LINE_HEIGHT: f32 = 5.0;

/// 电路网格间距
const CIRCUIT_SPACING: f32 = 40.0;
/// 电路走线数量与每条的拐点数
const CIRCUIT_TRACES: usize = 10;
const CIRCUIT_TURNS: usize = 3;

/// 字符雨列距与行距
const MATRIX_COLUMN_STRIDE: f32 = 15.0;
const MATRIX_ROW_STRIDE: f32 = 12.0;

/// 数字网格间距
const GRID_SPACING: f32 = 20.0;

/// 设置光晕：之后的填充、描边与文字都会带上该颜色的模糊光晕，直到被清除或状态被恢复
pub fn apply_glow(surface: &mut DrawSurface, color: Rgba, blur: f32) {
    surface.set_glow(color, blur);
}

/// 构造正六边形路径（顶点角度 60°·i − 30°），不填充也不描边
pub fn hexagon_path(surface: &mut DrawSurface, cx: f32, cy: f32, size: f32) {
    surface.begin_path();
    for i in 0..6 {
        let angle = (60.0 * i as f32 - 30.0) * PI / 180.0;
        let x = cx + size * angle.cos();
        let y = cy + size * angle.sin();
        if i == 0 {
            surface.move_to(x, y);
        } else {
            surface.line_to(x, y);
        }
    }
    surface.close_path();
}

/// 六边形头像：发光边框 + 裁剪到六边形内的头像 + overlay 渐变罩层
///
/// 边框与头像处于两个独立的作用域，边框光晕不会作用到头像上。
pub fn hexagonal_avatar(
    surface: &mut DrawSurface,
    cx: f32,
    cy: f32,
    size: f32,
    avatar_href: &str,
    border: Rgba,
    extra_glow: bool,
) {
    surface.layer("hex-avatar", |s| {
        s.scoped(|s| {
            apply_glow(s, border, if extra_glow { 30.0 } else { 15.0 });
            s.set_fill(border);
            hexagon_path(s, cx, cy, size + 10.0);
            s.fill();
        });

        s.scoped(|s| {
            hexagon_path(s, cx, cy, size);
            s.clip();

            s.draw_image(avatar_href, cx - size, cy - size, size * 2.0, size * 2.0);

            let overlay = s.linear_gradient(
                cx,
                cy - size,
                cx,
                cy + size,
                &[(0.0, border.with_alpha(0x20)), (1.0, border.transparent())],
            );
            s.set_fill(overlay);
            s.set_blend(BlendMode::Overlay);
            hexagon_path(s, cx, cy, size);
            s.fill();
        });
    });
}

/// 电路板纹理：40px 网格线、随机节点与 10 条吸附网格的随机走线
#[allow(clippy::too_many_arguments)]
pub fn circuit_pattern(
    surface: &mut DrawSurface,
    rng: &mut dyn RngCore,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    color: Rgba,
    opacity: f32,
) {
    surface.layer("circuit", |s| {
        s.set_global_alpha(opacity);
        s.set_stroke(color);
        s.set_fill(color);
        s.set_line_width(1.0);

        let mut i = 0.0;
        while i < h {
            s.begin_path();
            s.move_to(x, y + i);
            s.line_to(x + w, y + i);
            s.stroke();
            i += CIRCUIT_SPACING;
        }

        let mut i = 0.0;
        while i < w {
            s.begin_path();
            s.move_to(x + i, y);
            s.line_to(x + i, y + h);
            s.stroke();
            i += CIRCUIT_SPACING;
        }

        // 节点互不重叠，合并为一条路径
        s.begin_path();
        let mut i = 0.0;
        while i < w {
            let mut j = 0.0;
            while j < h {
                if rng.r#gen::<f32>() > 0.7 {
                    s.circle(x + i, y + j, 2.0);
                }
                j += CIRCUIT_SPACING;
            }
            i += CIRCUIT_SPACING;
        }
        s.fill();

        for _ in 0..CIRCUIT_TRACES {
            let mut cur_x = x + rng.r#gen::<f32>() * w;
            let mut cur_y = y + rng.r#gen::<f32>() * h;
            s.begin_path();
            s.move_to(cur_x, cur_y);
            for _ in 0..CIRCUIT_TURNS {
                if rng.r#gen::<f32>() > 0.5 {
                    let jitter = (rng.r#gen::<f32>() - 0.5) * 200.0;
                    cur_x = x + ((cur_x - x + jitter) / CIRCUIT_SPACING).round() * CIRCUIT_SPACING;
                } else {
                    let jitter = (rng.r#gen::<f32>() - 0.5) * 200.0;
                    cur_y = y + ((cur_y - y + jitter) / CIRCUIT_SPACING).round() * CIRCUIT_SPACING;
                }
                s.line_to(cur_x, cur_y);
            }
            s.stroke();
        }
    });
}

/// 水平扫描光带：透明 → 半透明 → 实色 → 半透明 → 透明
pub fn scan_line(
    surface: &mut DrawSurface,
    x: f32,
    y: f32,
    w: f32,
    height: f32,
    color: Rgba,
    opacity: f32,
) {
    surface.layer("scan-line", |s| {
        s.set_global_alpha(opacity);
        let band = s.linear_gradient(
            x,
            y,
            x + w,
            y,
            &[
                (0.0, color.transparent()),
                (0.3, color.with_alpha(0x80)),
                (0.5, color),
                (0.7, color.with_alpha(0x80)),
                (1.0, color.transparent()),
            ],
        );
        s.set_fill(band);
        s.fill_rect(x, y, w, height);
    });
}

/// 0/1 字符雨（单帧静态效果）
#[allow(clippy::too_many_arguments)]
pub fn matrix_rain(
    surface: &mut DrawSurface,
    rng: &mut dyn RngCore,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    color: Rgba,
    opacity: f32,
) {
    surface.layer("matrix-rain", |s| {
        s.set_global_alpha(opacity);
        s.set_fill(color);
        s.set_font(FontSpec::mono(10.0));

        let mut i = 0.0;
        while i < w {
            let column_height = rng.r#gen::<f32>() * h;
            let mut j = 0.0;
            while j < column_height {
                if rng.r#gen::<f32>() > 0.5 {
                    let glyph = if rng.r#gen::<bool>() { "1" } else { "0" };
                    s.fill_text(glyph, x + i, y + j);
                }
                j += MATRIX_ROW_STRIDE;
            }
            i += MATRIX_COLUMN_STRIDE;
        }
    });
}

/// 20px 正交数字网格（包含右/下边界线）
pub fn cyber_grid(
    surface: &mut DrawSurface,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    color: Rgba,
    opacity: f32,
) {
    surface.layer("cyber-grid", |s| {
        s.set_global_alpha(opacity);
        s.set_stroke(color);
        s.set_line_width(0.5);

        let mut i = 0.0;
        while i <= w {
            s.begin_path();
            s.move_to(x + i, y);
            s.line_to(x + i, y + h);
            s.stroke();
            i += GRID_SPACING;
        }

        let mut i = 0.0;
        while i <= h {
            s.begin_path();
            s.move_to(x, y + i);
            s.line_to(x + w, y + i);
            s.stroke();
            i += GRID_SPACING;
        }
    });
}

//! 保留模式的 2D 绘图表面
//!
//! 提供与 canvas 2D 上下文同构的绘图接口（路径、填充/描边、裁剪、渐变、光晕、文字、贴图），
//! 每次绘制调用都会把当前绘图状态“烘焙”进一个 SVG 元素；最终场景交给 resvg 栅格化。
//!
//! 绘图状态（颜色、线宽、透明度、光晕、裁剪、混合模式、字体）只通过 `save` / `restore`
//! 成对地压栈出栈，`scoped` 保证闭包结束时状态一定被恢复。

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use resvg::usvg::fontdb::Database;

use super::fonts::{self, FontSpec};
use super::palette::{BLACK, Rgba};
use crate::error::AppError;

/// 单个画布允许的最大边长，避免异常尺寸耗尽内存
const MAX_CANVAS_SIDE: u32 = 8192;

/// 填充或描边所用的颜料
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    /// 已登记的渐变定义 id
    Gradient(String),
}

impl From<Rgba> for Paint {
    fn from(color: Rgba) -> Self {
        Paint::Solid(color)
    }
}

/// 光晕：零偏移的彩色模糊阴影
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub color: Rgba,
    pub blur: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Overlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Start,
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextBaseline {
    #[default]
    Alphabetic,
    Middle,
}

/// 可压栈的绘图状态快照
#[derive(Debug, Clone)]
struct DrawState {
    fill: Paint,
    stroke: Paint,
    line_width: f32,
    line_dash: Vec<f32>,
    global_alpha: f32,
    glow: Option<Glow>,
    blend: BlendMode,
    clip: Option<String>,
    font: FontSpec,
    text_align: TextAlign,
    text_baseline: TextBaseline,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            fill: Paint::Solid(BLACK),
            stroke: Paint::Solid(BLACK),
            line_width: 1.0,
            line_dash: Vec::new(),
            global_alpha: 1.0,
            glow: None,
            blend: BlendMode::Normal,
            clip: None,
            font: FontSpec::default(),
            text_align: TextAlign::Start,
            text_baseline: TextBaseline::Alphabetic,
        }
    }
}

/// 一次渲染独占的绘图表面
pub struct DrawSurface {
    width: u32,
    height: u32,
    defs: String,
    body: String,
    next_id: u32,
    state: DrawState,
    saved: Vec<DrawState>,
    path: String,
    glow_filters: HashMap<(Rgba, u32), String>,
    font_db: Arc<Database>,
}

/// 数值输出：两位小数并去掉多余的 0，保持 SVG 紧凑
fn num(v: f32) -> String {
    if !v.is_finite() {
        return "0".to_string();
    }
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// XML 1.0 `Char` 产生式允许的字符
fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..=char::MAX
    )
}

/// 去掉 XML 无法承载的字符；测量与绘制都使用这份文本
fn xml_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| is_xml_char(c)).collect())
    }
}

/// XML 文本转义（非法字符直接丢弃）
fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars().filter(|&c| is_xml_char(c)) {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

impl DrawSurface {
    /// 使用全局字体数据库分配画布
    pub fn new(width: u32, height: u32) -> Result<Self, AppError> {
        Self::with_font_db(width, height, fonts::global_font_db())
    }

    pub fn with_font_db(width: u32, height: u32, font_db: Arc<Database>) -> Result<Self, AppError> {
        if width == 0 || height == 0 || width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
            return Err(AppError::RenderFailure(format!(
                "非法画布尺寸 {width}x{height}"
            )));
        }
        Ok(Self {
            width,
            height,
            defs: String::new(),
            body: String::new(),
            next_id: 0,
            state: DrawState::default(),
            saved: Vec::new(),
            path: String::new(),
            glow_filters: HashMap::new(),
            font_db,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn font_db(&self) -> &Arc<Database> {
        &self.font_db
    }

    fn alloc_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    // ---------------------------------------------------------------- 状态栈

    pub fn save(&mut self) {
        self.saved.push(self.state.clone());
    }

    /// 栈为空时不做任何事
    pub fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.state = state;
        }
    }

    /// 在一对 save/restore 之间执行闭包
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.save();
        let out = f(self);
        self.restore();
        out
    }

    /// 当前未弹出的快照数量
    pub fn saved_depth(&self) -> usize {
        self.saved.len()
    }

    /// 以 `<g class="name">` 包裹一组绘制，便于按图层检视场景
    pub fn layer<R>(&mut self, name: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        let _ = write!(self.body, r#"<g class="{}">"#, escape_xml(name));
        let out = self.scoped(f);
        self.body.push_str("</g>");
        out
    }

    pub fn set_fill(&mut self, paint: impl Into<Paint>) {
        self.state.fill = paint.into();
    }

    pub fn set_stroke(&mut self, paint: impl Into<Paint>) {
        self.state.stroke = paint.into();
    }

    pub fn set_line_width(&mut self, width: f32) {
        if width.is_finite() && width > 0.0 {
            self.state.line_width = width;
        }
    }

    /// 空切片表示实线
    pub fn set_line_dash(&mut self, dash: &[f32]) {
        if dash.iter().all(|d| d.is_finite() && *d >= 0.0) {
            self.state.line_dash = dash.to_vec();
        }
    }

    pub fn global_alpha(&self) -> f32 {
        self.state.global_alpha
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        if alpha.is_finite() {
            self.state.global_alpha = alpha.clamp(0.0, 1.0);
        }
    }

    /// 设置光晕；`blur <= 0` 等同于关闭
    pub fn set_glow(&mut self, color: Rgba, blur: f32) {
        self.state.glow = (blur.is_finite() && blur > 0.0).then_some(Glow { color, blur });
    }

    pub fn clear_glow(&mut self) {
        self.state.glow = None;
    }

    pub fn glow(&self) -> Option<Glow> {
        self.state.glow
    }

    pub fn set_blend(&mut self, blend: BlendMode) {
        self.state.blend = blend;
    }

    pub fn set_font(&mut self, font: FontSpec) {
        self.state.font = font;
    }

    pub fn set_text_align(&mut self, align: TextAlign) {
        self.state.text_align = align;
    }

    pub fn set_text_baseline(&mut self, baseline: TextBaseline) {
        self.state.text_baseline = baseline;
    }

    // ---------------------------------------------------------------- 路径

    pub fn begin_path(&mut self) {
        self.path.clear();
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        let _ = write!(self.path, "M{} {} ", num(x), num(y));
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        if self.path.is_empty() {
            self.move_to(x, y);
        } else {
            let _ = write!(self.path, "L{} {} ", num(x), num(y));
        }
    }

    pub fn close_path(&mut self) {
        if !self.path.is_empty() {
            self.path.push_str("Z ");
        }
    }

    /// 以两段半圆弧追加一个完整圆
    pub fn circle(&mut self, cx: f32, cy: f32, r: f32) {
        let r = r.max(0.0);
        let _ = write!(
            self.path,
            "M{x0} {y} A{r} {r} 0 1 0 {x1} {y} A{r} {r} 0 1 0 {x0} {y} Z ",
            x0 = num(cx + r),
            x1 = num(cx - r),
            y = num(cy),
            r = num(r),
        );
    }

    pub fn rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let _ = write!(
            self.path,
            "M{x0} {y0} L{x1} {y0} L{x1} {y1} L{x0} {y1} Z ",
            x0 = num(x),
            y0 = num(y),
            x1 = num(x + w),
            y1 = num(y + h),
        );
    }

    fn path_data(&self) -> Option<String> {
        let d = self.path.trim_end();
        (!d.is_empty()).then(|| d.to_string())
    }

    // ---------------------------------------------------------------- 定义

    /// 线性渐变（用户坐标），stops 为 `(offset, color)`
    pub fn linear_gradient(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, stops: &[(f32, Rgba)]) -> Paint {
        let id = self.alloc_id("lg");
        let _ = write!(
            self.defs,
            r#"<linearGradient id="{id}" gradientUnits="userSpaceOnUse" x1="{}" y1="{}" x2="{}" y2="{}">"#,
            num(x0),
            num(y0),
            num(x1),
            num(y1)
        );
        self.push_stops(stops);
        self.defs.push_str("</linearGradient>");
        Paint::Gradient(id)
    }

    /// 径向渐变：圆心 (cx, cy)，从半径 0 过渡到 r
    pub fn radial_gradient(&mut self, cx: f32, cy: f32, r: f32, stops: &[(f32, Rgba)]) -> Paint {
        let id = self.alloc_id("rg");
        let _ = write!(
            self.defs,
            r#"<radialGradient id="{id}" gradientUnits="userSpaceOnUse" cx="{c_x}" cy="{c_y}" fx="{c_x}" fy="{c_y}" r="{}">"#,
            num(r.max(0.0)),
            c_x = num(cx),
            c_y = num(cy),
        );
        self.push_stops(stops);
        self.defs.push_str("</radialGradient>");
        Paint::Gradient(id)
    }

    fn push_stops(&mut self, stops: &[(f32, Rgba)]) {
        for (offset, color) in stops {
            let _ = write!(
                self.defs,
                r#"<stop offset="{}" stop-color="{}""#,
                num(offset.clamp(0.0, 1.0)),
                color.hex()
            );
            if !color.is_opaque() {
                let _ = write!(self.defs, r#" stop-opacity="{}""#, num(color.opacity()));
            }
            self.defs.push_str("/>");
        }
    }

    fn glow_filter_id(&mut self, glow: Glow) -> String {
        let key = (glow.color, (glow.blur * 100.0).round() as u32);
        if let Some(id) = self.glow_filters.get(&key) {
            return id.clone();
        }
        let id = self.alloc_id("glow");
        let _ = write!(
            self.defs,
            r#"<filter id="{id}" filterUnits="userSpaceOnUse" x="0" y="0" width="{w}" height="{h}"><feDropShadow dx="0" dy="0" stdDeviation="{sd}" flood-color="{c}" flood-opacity="{o}"/></filter>"#,
            w = self.width,
            h = self.height,
            sd = num(glow.blur / 2.0),
            c = glow.color.hex(),
            o = num(glow.color.opacity()),
        );
        self.glow_filters.insert(key, id.clone());
        id
    }

    // ---------------------------------------------------------------- 绘制

    fn paint_attr(attr: &str, paint: &Paint) -> String {
        match paint {
            Paint::Solid(c) if c.is_opaque() => format!(r#" {attr}="{}""#, c.hex()),
            Paint::Solid(c) => format!(
                r#" {attr}="{}" {attr}-opacity="{}""#,
                c.hex(),
                num(c.opacity())
            ),
            Paint::Gradient(id) => format!(r#" {attr}="url(#{id})""#),
        }
    }

    fn stroke_attrs(&self) -> String {
        let mut out = Self::paint_attr("stroke", &self.state.stroke);
        let _ = write!(out, r#" stroke-width="{}""#, num(self.state.line_width));
        if !self.state.line_dash.is_empty() {
            let dash: Vec<String> = self.state.line_dash.iter().map(|d| num(*d)).collect();
            let _ = write!(out, r#" stroke-dasharray="{}""#, dash.join(" "));
        }
        out
    }

    /// 透明度、光晕、裁剪、混合模式
    fn common_attrs(&mut self) -> String {
        let mut out = String::new();
        if self.state.global_alpha < 1.0 {
            let _ = write!(out, r#" opacity="{}""#, num(self.state.global_alpha));
        }
        if let Some(glow) = self.state.glow {
            let id = self.glow_filter_id(glow);
            let _ = write!(out, r#" filter="url(#{id})""#);
        }
        if let Some(clip) = &self.state.clip {
            let _ = write!(out, r#" clip-path="url(#{clip})""#);
        }
        if self.state.blend == BlendMode::Overlay {
            out.push_str(r#" style="mix-blend-mode:overlay""#);
        }
        out
    }

    fn emit_path(&mut self, d: &str, paint: &str) {
        let common = self.common_attrs();
        let _ = write!(self.body, r#"<path d="{d}"{paint}{common}/>"#);
    }

    /// 填充当前路径
    pub fn fill(&mut self) {
        if let Some(d) = self.path_data() {
            let paint = Self::paint_attr("fill", &self.state.fill);
            self.emit_path(&d, &paint);
        }
    }

    /// 描边当前路径
    pub fn stroke(&mut self) {
        if let Some(d) = self.path_data() {
            let paint = format!(r#" fill="none"{}"#, self.stroke_attrs());
            self.emit_path(&d, &paint);
        }
    }

    /// 以当前路径与已有裁剪区求交，作为新的裁剪区
    pub fn clip(&mut self) {
        let Some(d) = self.path_data() else {
            return;
        };
        let id = self.alloc_id("clip");
        let parent = self
            .state
            .clip
            .as_ref()
            .map(|p| format!(r#" clip-path="url(#{p})""#))
            .unwrap_or_default();
        let _ = write!(
            self.defs,
            r#"<clipPath id="{id}" clipPathUnits="userSpaceOnUse"{parent}><path d="{d}"/></clipPath>"#
        );
        self.state.clip = Some(id);
    }

    /// 直接填充矩形，不影响当前路径
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let paint = Self::paint_attr("fill", &self.state.fill);
        let common = self.common_attrs();
        let _ = write!(
            self.body,
            r#"<rect x="{}" y="{}" width="{}" height="{}"{paint}{common}/>"#,
            num(x),
            num(y),
            num(w),
            num(h)
        );
    }

    /// 直接描边矩形，不影响当前路径
    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let paint = format!(r#" fill="none"{}"#, self.stroke_attrs());
        let common = self.common_attrs();
        let _ = write!(
            self.body,
            r#"<rect x="{}" y="{}" width="{}" height="{}"{paint}{common}/>"#,
            num(x),
            num(y),
            num(w.max(0.0)),
            num(h.max(0.0))
        );
    }

    /// 以当前字体测量文本宽度
    pub fn measure_text(&self, text: &str) -> f32 {
        fonts::measure_text(&self.font_db, &self.state.font, &xml_text(text))
    }

    /// 以当前填充、字体与对齐方式绘制文本
    pub fn fill_text(&mut self, text: &str, x: f32, y: f32) {
        let text = xml_text(text);
        if text.is_empty() {
            return;
        }
        let font = self.state.font;
        let paint = Self::paint_attr("fill", &self.state.fill);
        let common = self.common_attrs();
        let anchor = match self.state.text_align {
            TextAlign::Start => "",
            TextAlign::Center => r#" text-anchor="middle""#,
        };
        let baseline = match self.state.text_baseline {
            TextBaseline::Alphabetic => "",
            TextBaseline::Middle => r#" dominant-baseline="central""#,
        };
        let weight = if font.bold { r#" font-weight="bold""# } else { "" };
        let _ = write!(
            self.body,
            r#"<text x="{}" y="{}" font-family="{}" font-size="{}"{weight}{anchor}{baseline}{paint}{common} xml:space="preserve">{}</text>"#,
            num(x),
            num(y),
            font.family.css(),
            num(font.size),
            escape_xml(&text)
        );
    }

    /// 把位图（data URI 或可解析的 href）拉伸绘制到目标矩形
    pub fn draw_image(&mut self, href: &str, x: f32, y: f32, w: f32, h: f32) {
        if w <= 0.0 || h <= 0.0 || href.is_empty() {
            return;
        }
        let common = self.common_attrs();
        let _ = write!(
            self.body,
            r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"{common}/>"#,
            num(x),
            num(y),
            num(w),
            num(h),
            escape_xml(href)
        );
    }

    /// 当前场景的 SVG 文本
    pub fn to_svg(&self) -> String {
        format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><defs>{}</defs>{}</svg>"#,
            self.defs,
            self.body,
            w = self.width,
            h = self.height,
        )
    }

    pub fn finish(self) -> String {
        self.to_svg()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::image::palette::{CYBER_BLUE, CYBER_GOLD};

    fn surface() -> DrawSurface {
        DrawSurface::with_font_db(200, 100, Arc::new(Database::new())).expect("surface")
    }

    #[test]
    fn rejects_degenerate_canvas() {
        let db = Arc::new(Database::new());
        assert!(matches!(
            DrawSurface::with_font_db(0, 10, db.clone()),
            Err(AppError::RenderFailure(_))
        ));
        assert!(DrawSurface::with_font_db(MAX_CANVAS_SIDE + 1, 10, db).is_err());
    }

    #[test]
    fn scoped_glow_does_not_leak() {
        let mut s = surface();
        s.scoped(|s| {
            s.set_glow(CYBER_GOLD, 15.0);
            s.set_global_alpha(0.3);
            s.fill_rect(0.0, 0.0, 10.0, 10.0);
        });
        assert!(s.glow().is_none());
        assert_eq!(s.global_alpha(), 1.0);
        assert_eq!(s.saved_depth(), 0);

        s.fill_rect(0.0, 0.0, 10.0, 10.0);
        let svg = s.finish();
        assert_eq!(svg.matches(r#"filter="url(#"#).count(), 1);
        assert_eq!(svg.matches(r#"opacity="0.3""#).count(), 1);
    }

    #[test]
    fn glow_filters_are_deduplicated() {
        let mut s = surface();
        s.set_glow(CYBER_BLUE, 10.0);
        s.fill_rect(0.0, 0.0, 5.0, 5.0);
        s.fill_rect(5.0, 5.0, 5.0, 5.0);
        s.set_glow(CYBER_BLUE, 0.0);
        assert!(s.glow().is_none());
        let svg = s.finish();
        assert_eq!(svg.matches("<filter ").count(), 1);
        assert!(svg.contains(r#"stdDeviation="5""#));
    }

    #[test]
    fn nested_clips_chain() {
        let mut s = surface();
        s.begin_path();
        s.rect(0.0, 0.0, 50.0, 50.0);
        s.clip();
        s.begin_path();
        s.circle(25.0, 25.0, 10.0);
        s.clip();
        s.fill_rect(0.0, 0.0, 100.0, 100.0);
        let svg = s.finish();
        assert_eq!(svg.matches("<clipPath ").count(), 2);
        assert!(svg.contains(r#"<clipPath id="clip2" clipPathUnits="userSpaceOnUse" clip-path="url(#clip1)">"#));
        assert!(svg.contains(r#"clip-path="url(#clip2)""#));
    }

    #[test]
    fn text_is_escaped_and_aligned() {
        let mut s = surface();
        s.set_text_align(TextAlign::Center);
        s.set_text_baseline(TextBaseline::Middle);
        s.fill_text("<A&B>", 10.0, 10.0);
        let svg = s.finish();
        assert!(svg.contains("&lt;A&amp;B&gt;"));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.contains(r#"dominant-baseline="central""#));
    }

    #[test]
    fn non_xml_characters_are_dropped_from_text() {
        let mut s = surface();
        assert_eq!(s.measure_text("a\u{FFFF}b\u{FFFE}"), s.measure_text("ab"));
        s.fill_text("a\u{FFFF}b\u{1}\u{FFFE}", 10.0, 10.0);
        s.fill_text("\u{FFFF}", 10.0, 30.0);
        let svg = s.finish();
        assert!(svg.contains(">ab</text>"));
        assert_eq!(svg.matches("<text ").count(), 1);
        assert!(!svg.contains('\u{FFFF}') && !svg.contains('\u{FFFE}'));
    }

    #[test]
    fn xml_char_range_keeps_unicode() {
        for c in ['\t', 'A', 'ß', '用', '\u{E000}', '\u{FFFD}', '😀'] {
            assert!(is_xml_char(c), "{c:?}");
        }
        for c in ['\u{0}', '\u{1F}', '\u{FFFE}', '\u{FFFF}'] {
            assert!(!is_xml_char(c), "{c:?}");
        }
    }

    #[test]
    fn translucent_stops_carry_opacity() {
        let mut s = surface();
        let paint = s.linear_gradient(0.0, 0.0, 10.0, 0.0, &[(0.0, CYBER_BLUE.transparent()), (1.0, CYBER_BLUE)]);
        assert!(matches!(paint, Paint::Gradient(_)));
        let svg = s.finish();
        assert!(svg.contains(r##"stop-color="#00FFFF" stop-opacity="0""##));
        assert!(svg.contains(r##"<stop offset="1" stop-color="#00FFFF"/>"##));
    }

    #[test]
    fn number_formatting_is_compact() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(-0.001), "0");
        assert_eq!(num(f32::NAN), "0");
        assert_eq!(num(12.346), "12.35");
        assert_eq!(num(100.0), "100");
    }
}

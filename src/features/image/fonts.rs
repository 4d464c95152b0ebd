//! 全局字体数据库与文本测量
//!
//! 同一个 fontdb 实例同时服务于 SVG 栅格化（usvg 文本排版）与布局阶段的文字宽度测量，
//! 保证“量出来的宽度”和“画出来的宽度”来自同一套字形。

use resvg::usvg::fontdb::{self, Database, Family, Query, Stretch, Style, Weight};
use skrifa::instance::{LocationRef, Size};
use skrifa::{FontRef, MetadataProvider};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use unicode_width::UnicodeWidthChar;

static GLOBAL_FONT_DB: OnceLock<Arc<Database>> = OnceLock::new();

/// 未初始化配置时使用的字体目录
const DEFAULT_FONTS_DIR: &str = "./resources/fonts";

/// 无衬线候选族（按优先级）
const SANS_FAMILIES: [&str; 4] = ["Arial", "Liberation Sans", "DejaVu Sans", "Noto Sans"];
/// 等宽候选族（按优先级）
const MONO_FAMILIES: [&str; 4] = [
    "Courier New",
    "Liberation Mono",
    "DejaVu Sans Mono",
    "Noto Sans Mono",
];

/// 字体回退估算：每个显示列约 0.6em
const FALLBACK_EM_PER_COLUMN: f32 = 0.6;

/// 字体族类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFamily {
    Sans,
    Mono,
}

impl FontFamily {
    /// 写入 SVG `font-family` 属性的值
    pub fn css(self) -> &'static str {
        match self {
            FontFamily::Sans => "Arial, 'Liberation Sans', 'DejaVu Sans', sans-serif",
            FontFamily::Mono => "'Courier New', 'Liberation Mono', 'DejaVu Sans Mono', monospace",
        }
    }

    fn candidates(self) -> &'static [&'static str] {
        match self {
            FontFamily::Sans => &SANS_FAMILIES,
            FontFamily::Mono => &MONO_FAMILIES,
        }
    }
}

/// 字体描述，对应 canvas 的 `bold 60px Arial` 一类写法
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSpec {
    pub family: FontFamily,
    pub size: f32,
    pub bold: bool,
}

impl FontSpec {
    pub const fn sans_bold(size: f32) -> Self {
        Self {
            family: FontFamily::Sans,
            size,
            bold: true,
        }
    }

    pub const fn mono(size: f32) -> Self {
        Self {
            family: FontFamily::Mono,
            size,
            bold: false,
        }
    }

    pub const fn mono_bold(size: f32) -> Self {
        Self {
            family: FontFamily::Mono,
            size,
            bold: true,
        }
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: FontFamily::Sans,
            size: 10.0,
            bold: false,
        }
    }
}

/// 构建字体数据库：系统字体 + 自定义字体目录
fn build_font_db(fonts_dir: &Path) -> Database {
    let mut db = Database::new();
    db.load_system_fonts();

    if fonts_dir.is_dir() {
        match std::fs::read_dir(fonts_dir) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let path = entry.path();
                    let is_font = path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
                    if path.is_file()
                        && is_font
                        && let Err(e) = db.load_font_file(&path)
                    {
                        tracing::error!("加载字体文件失败 '{}': {}", path.display(), e);
                    }
                }
            }
            Err(e) => tracing::warn!("读取字体目录失败 '{}': {}", fonts_dir.display(), e),
        }
    } else {
        tracing::debug!("自定义字体目录不存在，仅使用系统字体: {}", fonts_dir.display());
    }

    remap_generic_families(&mut db);
    tracing::info!("字体数据库就绪，共 {} 个字体面", db.len());
    db
}

/// 首选族缺失时，把通用族 `sans-serif` / `monospace` 映射到已安装的字体
fn remap_generic_families(db: &mut Database) {
    if let Some(name) = first_installed(db, FontFamily::Sans).or_else(|| any_family(db, false)) {
        db.set_sans_serif_family(name);
    }
    if let Some(name) = first_installed(db, FontFamily::Mono).or_else(|| any_family(db, true)) {
        db.set_monospace_family(name);
    }
}

fn first_installed(db: &Database, family: FontFamily) -> Option<String> {
    family
        .candidates()
        .iter()
        .find(|name| {
            db.faces()
                .any(|face| face.families.iter().any(|(f, _)| f.eq_ignore_ascii_case(name)))
        })
        .map(|s| s.to_string())
}

fn any_family(db: &Database, monospaced: bool) -> Option<String> {
    db.faces()
        .find(|face| face.monospaced == monospaced)
        .or_else(|| db.faces().next())
        .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
}

/// 以指定字体目录初始化全局字体数据库；已初始化时直接返回现有实例
pub fn init_global_font_db(fonts_dir: &Path) -> Arc<Database> {
    GLOBAL_FONT_DB
        .get_or_init(|| Arc::new(build_font_db(fonts_dir)))
        .clone()
}

/// 获取全局字体数据库（未显式初始化时使用默认字体目录）
pub fn global_font_db() -> Arc<Database> {
    GLOBAL_FONT_DB
        .get_or_init(|| Arc::new(build_font_db(&PathBuf::from(DEFAULT_FONTS_DIR))))
        .clone()
}

fn query_face(db: &Database, spec: &FontSpec) -> Option<fontdb::ID> {
    let mut families: Vec<Family<'_>> = spec
        .family
        .candidates()
        .iter()
        .copied()
        .map(Family::Name)
        .collect();
    families.push(match spec.family {
        FontFamily::Sans => Family::SansSerif,
        FontFamily::Mono => Family::Monospace,
    });

    db.query(&Query {
        families: &families,
        weight: if spec.bold {
            Weight::BOLD
        } else {
            Weight::NORMAL
        },
        stretch: Stretch::Normal,
        style: Style::Normal,
    })
}

/// 依据显示列宽估算文本宽度（无可用字体时的回退）
pub fn estimate_width(text: &str, size: f32) -> f32 {
    let columns: usize = text.chars().map(|c| c.width().unwrap_or(0)).sum();
    columns as f32 * FALLBACK_EM_PER_COLUMN * size
}

/// 测量文本在给定字体下的水平步进宽度（像素）
///
/// 优先使用实际字形步进；字体缺字时该字符按显示列宽估算。永不失败。
pub fn measure_text(db: &Database, spec: &FontSpec, text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let Some(id) = query_face(db, spec) else {
        return estimate_width(text, spec.size);
    };

    db.with_face_data(id, |data, index| {
        let font = FontRef::from_index(data, index).ok()?;
        let charmap = font.charmap();
        let metrics = font.glyph_metrics(Size::new(spec.size), LocationRef::default());
        let width = text
            .chars()
            .map(|ch| {
                charmap
                    .map(ch)
                    .and_then(|gid| metrics.advance_width(gid))
                    .unwrap_or_else(|| estimate_width(ch.encode_utf8(&mut [0; 4]), spec.size))
            })
            .sum::<f32>();
        Some(width)
    })
    .flatten()
    .unwrap_or_else(|| estimate_width(text, spec.size))
}

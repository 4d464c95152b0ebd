//! 赛博朋克配色表与等级主题解析

use std::fmt;

use super::types::{RecipeKind, StatusTier};

/// 8 位 RGBA 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// 替换 alpha 字节，对应 `#RRGGBBAA` 写法中的两位后缀
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// 完全透明（保留色相，渐变过渡时不会偏灰）
    pub const fn transparent(self) -> Self {
        self.with_alpha(0)
    }

    /// `#RRGGBB`（不含 alpha）
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// alpha 归一化到 0..=1
    pub fn opacity(&self) -> f32 {
        f32::from(self.a) / 255.0
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 0xFF
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02X}{:02X}{:02X}{:02X}",
            self.r, self.g, self.b, self.a
        )
    }
}

pub const DARK_BG: Rgba = Rgba::rgb(0x0F, 0x0F, 0x1A);
pub const DARKER_BG: Rgba = Rgba::rgb(0x09, 0x09, 0x16);
pub const CYBER_BLUE: Rgba = Rgba::rgb(0x00, 0xFF, 0xFF);
pub const CYBER_GREEN: Rgba = Rgba::rgb(0x39, 0xFF, 0x14);
pub const CYBER_PINK: Rgba = Rgba::rgb(0xFF, 0x00, 0xE6);
pub const CYBER_PURPLE: Rgba = Rgba::rgb(0xB0, 0x26, 0xFF);
pub const CYBER_GOLD: Rgba = Rgba::rgb(0xFF, 0xC1, 0x07);
pub const CYBER_RED: Rgba = Rgba::rgb(0xFF, 0x3D, 0x3D);
pub const CYBER_ORANGE: Rgba = Rgba::rgb(0xFF, 0x7D, 0x3D);
pub const WHITE: Rgba = Rgba::rgb(0xFF, 0xFF, 0xFF);
pub const BLACK: Rgba = Rgba::rgb(0x00, 0x00, 0x00);
pub const GRAY: Rgba = Rgba::rgb(0xA0, 0xA0, 0xA0);
pub const DARK_BLUE: Rgba = Rgba::rgb(0x0A, 0x19, 0x33);
pub const DARK_GREEN: Rgba = Rgba::rgb(0x0A, 0x33, 0x20);
pub const DARK_PURPLE: Rgba = Rgba::rgb(0x1A, 0x0A, 0x33);

/// 按语义名查色（大小写不敏感），供命令行与调试使用
pub fn by_name(name: &str) -> Option<Rgba> {
    let color = match name.to_ascii_uppercase().as_str() {
        "DARK_BG" => DARK_BG,
        "DARKER_BG" => DARKER_BG,
        "CYBER_BLUE" => CYBER_BLUE,
        "CYBER_GREEN" => CYBER_GREEN,
        "CYBER_PINK" => CYBER_PINK,
        "CYBER_PURPLE" => CYBER_PURPLE,
        "CYBER_GOLD" => CYBER_GOLD,
        "CYBER_RED" => CYBER_RED,
        "CYBER_ORANGE" => CYBER_ORANGE,
        "WHITE" => WHITE,
        "BLACK" => BLACK,
        "GRAY" => GRAY,
        "DARK_BLUE" => DARK_BLUE,
        "DARK_GREEN" => DARK_GREEN,
        "DARK_PURPLE" => DARK_PURPLE,
        _ => return None,
    };
    Some(color)
}

/// 由等级推导出的视觉主题（不落盘，每次渲染现算）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeColors {
    /// 配方的基础强调色（与等级无关）
    pub base_accent: Rgba,
    /// 生效的强调色：付费/所有者为金色，否则为基础强调色
    pub accent: Rgba,
    /// 头像边框色
    pub border: Rgba,
    /// 状态按钮色
    pub button: Rgba,
    /// 按钮上的文字色：非 free 为黑，free 为白
    pub text: Rgba,
    /// 是否为金色主题（premium / owner）
    pub gold: bool,
}

impl ThemeColors {
    pub fn resolve(tier: StatusTier, base_accent: Rgba) -> Self {
        let gold = tier.is_gold();
        let accent = if gold { CYBER_GOLD } else { base_accent };
        let text = if tier == StatusTier::Free { WHITE } else { BLACK };
        Self {
            base_accent,
            accent,
            border: accent,
            button: accent,
            text,
            gold,
        }
    }

    /// 等级为 free 时取 `free_color`，否则取金色
    pub fn tier_or(&self, free_color: Rgba) -> Rgba {
        if self.gold { CYBER_GOLD } else { free_color }
    }
}

/// 各配方的基础强调色
pub fn recipe_accent(kind: RecipeKind) -> Rgba {
    match kind {
        RecipeKind::Profile => CYBER_BLUE,
        RecipeKind::Welcome => CYBER_GREEN,
        RecipeKind::Goodbye => CYBER_PINK,
    }
}

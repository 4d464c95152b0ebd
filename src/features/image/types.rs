use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 默认服务器名称
pub const DEFAULT_SERVER_NAME: &str = "CyberServer";

/// 输出 MIME 类型（固定为 PNG）
pub const PNG_MIME: &str = "image/png";

/// 合成配方
#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecipeKind {
    /// 个人资料卡（1280×480）
    Profile,
    /// 欢迎横幅（1920×768）
    Welcome,
    /// 告别横幅（1920×768）
    Goodbye,
}

impl RecipeKind {
    pub const ALL: [RecipeKind; 3] = [RecipeKind::Profile, RecipeKind::Welcome, RecipeKind::Goodbye];

    /// 画布尺寸（宽, 高）
    pub fn canvas_size(self) -> (u32, u32) {
        match self {
            RecipeKind::Profile => (1280, 480),
            RecipeKind::Welcome | RecipeKind::Goodbye => (1920, 768),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecipeKind::Profile => "profile",
            RecipeKind::Welcome => "welcome",
            RecipeKind::Goodbye => "goodbye",
        }
    }
}

impl fmt::Display for RecipeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecipeKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(RecipeKind::Profile),
            "welcome" => Ok(RecipeKind::Welcome),
            "goodbye" => Ok(RecipeKind::Goodbye),
            other => Err(AppError::InvalidInput(format!(
                "未知的配方类型: {other}（可选 profile / welcome / goodbye）"
            ))),
        }
    }
}

/// 用户等级
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema, PartialEq, Eq, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusTier {
    #[default]
    Free,
    Premium,
    Owner,
}

impl StatusTier {
    /// 由两个布尔值推导等级，`is_owner` 优先
    pub fn from_flags(is_premium: bool, is_owner: bool) -> Self {
        if is_owner {
            StatusTier::Owner
        } else if is_premium {
            StatusTier::Premium
        } else {
            StatusTier::Free
        }
    }

    /// premium 与 owner 共用金色主题
    pub fn is_gold(self) -> bool {
        matches!(self, StatusTier::Premium | StatusTier::Owner)
    }

    /// 状态按钮上的文字
    pub fn label(self) -> &'static str {
        match self {
            StatusTier::Free => "FREE",
            StatusTier::Premium => "PREMIUM",
            StatusTier::Owner => "OWNER",
        }
    }
}

/// 装饰效果开关（全部默认关闭，拒绝未知键）
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, utoipa::ToSchema, PartialEq, Eq, Hash,
)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct EffectFlags {
    /// 加宽头像与用户名的光晕
    pub extra_glow: bool,
    /// 扫描线光带
    pub scan_effect: bool,
    /// 0/1 字符雨
    pub matrix_rain: bool,
    /// 电路板纹理背景
    pub circuit_bg: bool,
}

/// 单次渲染请求：构造一次，交给一个配方消费后丢弃
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub username: String,
    pub avatar: Vec<u8>,
    pub server_name: String,
    pub tier: StatusTier,
    pub kind: RecipeKind,
    pub effects: EffectFlags,
}

impl RenderRequest {
    pub fn new(kind: RecipeKind, username: impl Into<String>, avatar: Vec<u8>) -> Self {
        Self {
            username: username.into(),
            avatar,
            server_name: DEFAULT_SERVER_NAME.to_string(),
            tier: StatusTier::Free,
            kind,
            effects: EffectFlags::default(),
        }
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        let name = server_name.into();
        if !name.trim().is_empty() {
            self.server_name = name;
        }
        self
    }

    pub fn with_tier(mut self, tier: StatusTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_effects(mut self, effects: EffectFlags) -> Self {
        self.effects = effects;
        self
    }

    /// 在任何画布工作之前校验必填字段
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() {
            return Err(AppError::InvalidInput("username 不能为空".to_string()));
        }
        if self.avatar.is_empty() {
            return Err(AppError::InvalidInput("缺少头像图片 avatar".to_string()));
        }
        Ok(())
    }
}

/// 渲染结果
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl RenderResult {
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: PNG_MIME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_takes_precedence_over_premium() {
        assert_eq!(StatusTier::from_flags(true, true), StatusTier::Owner);
        assert_eq!(StatusTier::from_flags(false, true), StatusTier::Owner);
        assert_eq!(StatusTier::from_flags(true, false), StatusTier::Premium);
        assert_eq!(StatusTier::from_flags(false, false), StatusTier::Free);
    }

    #[test]
    fn effect_flags_reject_unknown_keys() {
        let ok: EffectFlags = serde_json::from_str(r#"{"scanEffect":true}"#).expect("known key");
        assert!(ok.scan_effect);
        assert!(!ok.matrix_rain);

        let err = serde_json::from_str::<EffectFlags>(r#"{"sparkles":true}"#);
        assert!(err.is_err());
    }

    #[test]
    fn recipe_kind_parses_case_insensitively() {
        assert_eq!("Welcome".parse::<RecipeKind>().ok(), Some(RecipeKind::Welcome));
        assert!("banner".parse::<RecipeKind>().is_err());
        assert_eq!(RecipeKind::Goodbye.canvas_size(), (1920, 768));
    }

    #[test]
    fn validate_rejects_blank_username_and_missing_avatar() {
        let blank = RenderRequest::new(RecipeKind::Profile, "   ", vec![1, 2, 3]);
        assert!(matches!(blank.validate(), Err(AppError::InvalidInput(_))));

        let no_avatar = RenderRequest::new(RecipeKind::Profile, "NEO", Vec::new());
        assert!(matches!(no_avatar.validate(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn blank_server_name_keeps_default() {
        let req = RenderRequest::new(RecipeKind::Welcome, "NEO", vec![1]).with_server_name("  ");
        assert_eq!(req.server_name, DEFAULT_SERVER_NAME);
    }
}

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 全局配置单例
static CONFIG: OnceCell<AppConfig> = OnceCell::new();

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// 资源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesConfig {
    /// 资源基础路径
    pub base_path: String,
    /// 自定义字体目录（相对 base_path）
    pub fonts_dir: String,
    /// 皇冠装饰素材：相对 base_path 的文件路径，或 http(s) URL
    pub crown_source: Option<String>,
    /// 认证徽章素材：相对 base_path 的文件路径，或 http(s) URL
    pub badge_source: Option<String>,
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            base_path: "./resources".to_string(),
            fonts_dir: "fonts".to_string(),
            crown_source: Some("glyphs/crown.png".to_string()),
            badge_source: Some("glyphs/verify.png".to_string()),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 日志格式：full | compact
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "full".to_string(),
        }
    }
}

/// API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API 路由前缀
    pub prefix: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: "/api".to_string(),
        }
    }
}

/// 图片渲染配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRenderConfig {
    /// 是否优先速度渲染（OptimizeSpeed + 快速 PNG 压缩），提升吞吐，可能略降画质
    #[serde(default)]
    pub optimize_speed: bool,
    /// 并发渲染许可数（0=自动，取 CPU 核心数）
    #[serde(default)]
    pub max_parallel: u32,
    /// 上传请求体上限（字节），头像文件也受此约束
    #[serde(default = "ImageRenderConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// 单次渲染超时（秒，0=不限制）
    #[serde(default = "ImageRenderConfig::default_render_timeout")]
    pub render_timeout_secs: u64,
}

impl ImageRenderConfig {
    fn default_max_upload_bytes() -> usize {
        5 * 1024 * 1024
    }
    fn default_render_timeout() -> u64 {
        30
    }

    /// 实际生效的并发许可数
    pub fn effective_parallelism(&self) -> usize {
        match self.max_parallel {
            0 => num_cpus::get().max(1),
            n => n as usize,
        }
    }

    /// 渲染超时；0 表示不限制
    pub fn render_timeout(&self) -> Option<Duration> {
        (self.render_timeout_secs > 0).then(|| Duration::from_secs(self.render_timeout_secs))
    }
}

impl Default for ImageRenderConfig {
    fn default() -> Self {
        Self {
            optimize_speed: false,
            max_parallel: 0,
            max_upload_bytes: Self::default_max_upload_bytes(),
            render_timeout_secs: Self::default_render_timeout(),
        }
    }
}

/// 优雅退出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// 优雅退出超时时间（秒）
    #[serde(default = "ShutdownConfig::default_timeout")]
    pub timeout_secs: u64,
}

impl ShutdownConfig {
    fn default_timeout() -> u64 {
        30
    }

    /// 获取优雅退出超时时间
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    /// 图片渲染配置
    #[serde(default)]
    pub image: ImageRenderConfig,
    /// 优雅退出配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl AppConfig {
    /// 从配置文件加载配置，支持环境变量覆盖（配置文件缺失时全部取默认值）
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path();

        tracing::info!("正在从 {:?} 加载配置文件", config_path);

        let builder = ConfigBuilder::builder()
            .add_source(File::from(config_path).required(false))
            // 支持环境变量覆盖，例如：APP_SERVER_PORT
            .add_source(
                Environment::with_prefix("APP")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        builder.try_deserialize()
    }

    /// 获取全局配置单例
    pub fn global() -> &'static AppConfig {
        CONFIG.get().expect("配置未初始化，请先调用 init_global()")
    }

    /// 初始化全局配置
    pub fn init_global() -> Result<(), ConfigError> {
        let config = Self::load()?;
        CONFIG
            .set(config)
            .map_err(|_| ConfigError::Message("配置已经被初始化".to_string()))?;
        Ok(())
    }

    /// 获取配置文件路径
    fn get_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    /// 获取服务器监听地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 获取资源文件夹路径
    pub fn resources_path(&self) -> PathBuf {
        PathBuf::from(&self.resources.base_path)
    }

    /// 获取自定义字体目录
    pub fn fonts_path(&self) -> PathBuf {
        self.resources_path().join(&self.resources.fonts_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_deserializes_to_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").expect("defaults");
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.api.prefix, "/api");
        assert_eq!(cfg.image.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.image.render_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"image":{"max_parallel":3,"render_timeout_secs":0}}"#)
                .expect("partial");
        assert_eq!(cfg.image.effective_parallelism(), 3);
        assert_eq!(cfg.image.render_timeout(), None);
        assert_eq!(cfg.image.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.server.host, "0.0.0.0");
    }

    #[test]
    fn zero_parallelism_means_cpu_count() {
        let cfg = ImageRenderConfig::default();
        assert!(cfg.effective_parallelism() >= 1);
    }

    #[test]
    fn fonts_path_is_under_resources() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.fonts_path(), PathBuf::from("./resources").join("fonts"));
    }
}

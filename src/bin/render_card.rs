//! 离线渲染工具：不启动 HTTP 服务，直接从本地头像文件生成卡片 PNG。
//!
//! 用法：
//!   render_card <profile|welcome|goodbye> <avatar> <username> [options]
//!
//! 配置（字体目录、装饰素材、渲染速度）与服务端共用 `config.toml` / `APP_*` 环境变量；
//! 配置缺失时使用默认值。

use std::env;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

use cyber_card::AppConfig;
use cyber_card::features::image::fonts::init_global_font_db;
use cyber_card::features::image::{
    EffectFlags, GlyphAssets, RecipeKind, RenderOptions, RenderRequest, StatusTier, render,
};
use cyber_card::features::image::types::DEFAULT_SERVER_NAME;
use cyber_card::logging::init_tracing;
use rand::SeedableRng;
use rand::rngs::StdRng;

const DEFAULT_OUTPUT: &str = "card.png";

#[derive(Debug)]
enum CliError {
    Args(String),
    Io(String),
    Render(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Args(msg) => write!(f, "参数错误: {msg}"),
            CliError::Io(msg) => write!(f, "文件错误: {msg}"),
            CliError::Render(msg) => write!(f, "渲染失败: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

#[derive(Debug, Clone)]
struct Args {
    help: bool,
    kind: Option<RecipeKind>,
    avatar: Option<PathBuf>,
    username: Option<String>,
    server_name: Option<String>,
    premium: bool,
    owner: bool,
    effects: EffectFlags,
    seed: Option<u64>,
    output: PathBuf,
}

fn help_text() -> String {
    format!(
        "render_card <profile|welcome|goodbye> <avatar> <username> [options]\n\
         \n\
         选项:\n\
         \x20 --server NAME    服务器名称（默认 {DEFAULT_SERVER_NAME}）\n\
         \x20 --premium        高级会员（金色主题）\n\
         \x20 --owner          服务器所有者（金色主题，优先于 --premium）\n\
         \x20 --extra-glow     加宽光晕\n\
         \x20 --scan           扫描线光带\n\
         \x20 --matrix         0/1 字符雨\n\
         \x20 --circuit        电路板纹理背景\n\
         \x20 --seed N         固定随机种子，输出可复现\n\
         \x20 -o, --output P   输出文件（默认 {DEFAULT_OUTPUT}）\n\
         \x20 -h, --help       显示帮助"
    )
}

fn print_help() {
    println!("{}", help_text());
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Self, CliError> {
        let mut args = Args {
            help: false,
            kind: None,
            avatar: None,
            username: None,
            server_name: None,
            premium: false,
            owner: false,
            effects: EffectFlags::default(),
            seed: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
        };
        let mut positional: Vec<String> = Vec::new();
        let mut idx = 0usize;

        while idx < argv.len() {
            let a = argv[idx].as_str();
            match a {
                "-h" | "--help" => args.help = true,
                "--premium" => args.premium = true,
                "--owner" => args.owner = true,
                "--extra-glow" => args.effects.extra_glow = true,
                "--scan" => args.effects.scan_effect = true,
                "--matrix" => args.effects.matrix_rain = true,
                "--circuit" => args.effects.circuit_bg = true,
                "--server" => {
                    idx += 1;
                    args.server_name = Some(value_of(&argv, idx, "--server")?.to_string());
                }
                "--seed" => {
                    idx += 1;
                    let raw = value_of(&argv, idx, "--seed")?;
                    args.seed = Some(raw.parse::<u64>().map_err(|_| {
                        CliError::Args(format!("--seed 需要非负整数，收到 '{raw}'"))
                    })?);
                }
                "-o" | "--output" => {
                    idx += 1;
                    args.output = PathBuf::from(value_of(&argv, idx, "--output")?);
                }
                other if other.starts_with('-') && other.len() > 1 => {
                    return Err(CliError::Args(format!("未知选项 {other}")));
                }
                _ => positional.push(argv[idx].clone()),
            }
            idx += 1;
        }

        if args.help {
            return Ok(args);
        }

        let mut positional = positional.into_iter();
        if let Some(kind) = positional.next() {
            args.kind = Some(
                kind.parse::<RecipeKind>()
                    .map_err(|e| CliError::Args(e.to_string()))?,
            );
        }
        args.avatar = positional.next().map(PathBuf::from);
        args.username = positional.next();
        if let Some(extra) = positional.next() {
            return Err(CliError::Args(format!("多余的参数 '{extra}'")));
        }
        Ok(args)
    }
}

fn value_of<'a>(argv: &'a [String], idx: usize, flag: &str) -> Result<&'a str, CliError> {
    argv.get(idx)
        .map(String::as_str)
        .ok_or_else(|| CliError::Args(format!("缺少 {flag} 的值")))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(env::args().skip(1).collect())?;
    if args.help {
        print_help();
        return Ok(());
    }

    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("配置加载失败，使用默认值: {e}");
        AppConfig::default()
    });
    init_tracing(&config.logging);

    if let Err(err) = run(args, &config).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
    Ok(())
}

async fn run(args: Args, config: &AppConfig) -> Result<(), CliError> {
    let (Some(kind), Some(avatar_path), Some(username)) = (args.kind, args.avatar, args.username)
    else {
        print_help();
        return Err(CliError::Args(
            "需要 <profile|welcome|goodbye> <avatar> <username> 三个参数".to_string(),
        ));
    };

    let avatar = read_file(&avatar_path).await?;
    let faces = init_global_font_db(&config.fonts_path()).len();
    tracing::debug!("字体数据库就绪，共 {} 个字体", faces);
    let glyphs = GlyphAssets::load(&config.resources).await;

    let mut req = RenderRequest::new(kind, username, avatar)
        .with_tier(StatusTier::from_flags(args.premium, args.owner))
        .with_effects(args.effects);
    if let Some(server) = args.server_name {
        req = req.with_server_name(server);
    }

    let options = RenderOptions::from_config(&config.image);
    let seed = args.seed;
    let result = tokio::task::spawn_blocking(move || match seed {
        Some(seed) => render(&req, &glyphs, &mut StdRng::seed_from_u64(seed), options),
        None => render(&req, &glyphs, &mut rand::thread_rng(), options),
    })
    .await
    .map_err(|e| CliError::Render(e.to_string()))?
    .map_err(|e| CliError::Render(e.to_string()))?;

    tokio::fs::write(&args.output, &result.bytes)
        .await
        .map_err(|e| CliError::Io(format!("{}: {e}", args.output.display())))?;
    println!(
        "{} -> {} ({} 字节)",
        kind,
        args.output.display(),
        result.bytes.len()
    );
    Ok(())
}

async fn read_file(path: &Path) -> Result<Vec<u8>, CliError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_positionals_and_flags() {
        let args = Args::parse(argv(&[
            "welcome",
            "me.png",
            "neo",
            "--owner",
            "--scan",
            "--seed",
            "7",
            "-o",
            "out.png",
        ]))
        .expect("parse");
        assert_eq!(args.kind, Some(RecipeKind::Welcome));
        assert_eq!(args.avatar, Some(PathBuf::from("me.png")));
        assert_eq!(args.username.as_deref(), Some("neo"));
        assert!(args.owner);
        assert!(args.effects.scan_effect);
        assert!(!args.effects.matrix_rain);
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.output, PathBuf::from("out.png"));
    }

    #[test]
    fn help_reports_real_defaults() {
        let help = help_text();
        assert!(help.contains(&format!("默认 {DEFAULT_SERVER_NAME}")));
        assert!(help.contains("默认 card.png"));
        assert!(!help.contains("THE_GRID"));
    }

    #[test]
    fn rejects_unknown_kind_and_options() {
        assert!(Args::parse(argv(&["banner", "a.png", "neo"])).is_err());
        assert!(Args::parse(argv(&["profile", "a.png", "neo", "--sparkles"])).is_err());
        assert!(Args::parse(argv(&["profile", "a.png", "neo", "--seed"])).is_err());
        assert!(Args::parse(argv(&["profile", "a.png", "neo", "extra"])).is_err());
    }
}

use std::io::Cursor;

use cyber_card::features::image::{
    EffectFlags, GlyphAssets, RecipeKind, RenderOptions, RenderRequest, StatusTier, render,
};
use image::{DynamicImage, ImageFormat, RgbImage, Rgba, RgbaImage};
use rand::SeedableRng;
use rand::rngs::StdRng;

fn avatar_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(32, 20, |x, y| Rgba([200, (x * 8) as u8, (y * 12) as u8, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode avatar");
    out.into_inner()
}

fn render_seeded(req: &RenderRequest, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    render(
        req,
        &GlyphAssets::default(),
        &mut rng,
        RenderOptions {
            optimize_speed: true,
        },
    )
    .expect("render")
    .bytes
}

#[test]
fn every_recipe_renders_at_its_canvas_size() {
    let all_effects = EffectFlags {
        extra_glow: true,
        scan_effect: true,
        matrix_rain: true,
        circuit_bg: true,
    };
    for kind in RecipeKind::ALL {
        let req = RenderRequest::new(kind, "morpheus", avatar_png())
            .with_server_name("NEBUCHADNEZZAR")
            .with_effects(all_effects);
        let png = render_seeded(&req, 42);
        let img = image::load_from_memory(&png).expect("decode png");
        assert_eq!((img.width(), img.height()), kind.canvas_size(), "{kind}");
    }
}

#[test]
fn seeded_banners_are_reproducible() {
    for kind in [RecipeKind::Welcome, RecipeKind::Goodbye] {
        let req = RenderRequest::new(kind, "neo", avatar_png());
        assert_eq!(render_seeded(&req, 9), render_seeded(&req, 9), "{kind}");
    }
}

#[test]
fn tier_changes_banner_output() {
    let free = RenderRequest::new(RecipeKind::Welcome, "neo", avatar_png());
    let premium = free.clone().with_tier(StatusTier::Premium);
    let owner = free.clone().with_tier(StatusTier::Owner);

    let free_png = render_seeded(&free, 3);
    assert_ne!(free_png, render_seeded(&premium, 3));
    assert_ne!(free_png, render_seeded(&owner, 3));
}

#[test]
fn non_square_avatar_is_accepted() {
    let img = RgbImage::from_pixel(300, 40, image::Rgb([0, 255, 0]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("encode jpeg");

    let req = RenderRequest::new(RecipeKind::Profile, "wide", out.into_inner());
    let png = render_seeded(&req, 1);
    assert!(image::load_from_memory(&png).is_ok());
}

fn solid_red_png() -> Vec<u8> {
    let img = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode avatar");
    out.into_inner()
}

fn is_red(px: [u8; 4]) -> bool {
    px[0] > 200 && px[1] < 80 && px[2] < 80
}

/// 下划线所在行的扫描窗口（避开左侧头像边框）
const SCAN_FROM: u32 = 380;

/// 第 270 行上高亮青色（免费用户下划线颜色）的水平范围
fn underline_extent(img: &RgbaImage) -> Option<(u32, u32)> {
    let xs: Vec<u32> = (SCAN_FROM..img.width())
        .filter(|&x| {
            let px = img.get_pixel(x, 270).0;
            px[0] < 60 && px[1] > 230 && px[2] > 230
        })
        .collect();
    Some((*xs.first()?, *xs.last()?))
}

/// 用户名白色笔画的水平范围
fn ink_extent(img: &RgbaImage) -> Option<(u32, u32)> {
    let mut hit: Option<(u32, u32)> = None;
    for y in 200..=262 {
        for x in SCAN_FROM..img.width() {
            let px = img.get_pixel(x, y).0;
            if px[0] > 230 && px[1] > 230 && px[2] > 230 {
                hit = Some(match hit {
                    Some((l, r)) => (l.min(x), r.max(x)),
                    None => (x, x),
                });
            }
        }
    }
    hit
}

fn render_profile(username: &str) -> RgbaImage {
    let req = RenderRequest::new(RecipeKind::Profile, username, solid_red_png());
    let png = render_seeded(&req, 5);
    let img = image::load_from_memory(&png).expect("decode png").to_rgba8();
    assert_eq!(img.dimensions(), (1280, 480), "{username:?}");
    img
}

#[test]
fn unicode_usernames_get_a_centred_underline() {
    for (name, check_ink) in [
        ("neo", true),
        ("用户名", true),
        ("😀😀", false),
        ("a\u{FFFF}b\u{FFFE}", true),
    ] {
        let img = render_profile(name);
        let (left, right) = underline_extent(&img).expect("underline drawn");
        assert!(left > SCAN_FROM && right < 1279, "{name:?} clipped: {left}..{right}");
        let centre = (left + right) as f32 / 2.0;
        assert!((centre - 700.0).abs() <= 4.0, "{name:?} centre {centre}");

        if check_ink && let Some((ink_l, ink_r)) = ink_extent(&img) {
            assert!(ink_l + 4 >= left && ink_r <= right + 4, "{name:?} ink {ink_l}..{ink_r} vs {left}..{right}");
        }
    }
}

#[test]
fn very_long_username_still_renders() {
    let name = "overflow".repeat(50);
    let img = render_profile(&name);
    let (left, right) = underline_extent(&img).expect("underline drawn");
    assert_eq!(left, SCAN_FROM);
    assert!(right >= 1278);
}

#[test]
fn non_xml_server_name_renders_banner() {
    for kind in [RecipeKind::Welcome, RecipeKind::Goodbye] {
        let req = RenderRequest::new(kind, "neo\u{FFFF}", solid_red_png()).with_server_name("srv\u{FFFE}");
        let png = render_seeded(&req, 2);
        let img = image::load_from_memory(&png).expect("decode png");
        assert_eq!((img.width(), img.height()), kind.canvas_size());
    }
}

#[test]
fn avatar_is_clipped_to_the_hexagon() {
    let img = render_profile("neo");
    assert!(is_red(img.get_pixel(240, 240).0));
    for (x, y) in [(122, 122), (357, 122), (122, 357), (357, 357)] {
        let px = img.get_pixel(x, y).0;
        assert!(!is_red(px), "profile corner ({x},{y}) = {px:?}");
    }

    let req = RenderRequest::new(RecipeKind::Welcome, "neo", solid_red_png());
    let img = image::load_from_memory(&render_seeded(&req, 4))
        .expect("decode png")
        .to_rgba8();
    assert!(is_red(img.get_pixel(960, 256).0));
    for (x, y) in [(862, 158), (1058, 158), (862, 354), (1058, 354)] {
        let px = img.get_pixel(x, y).0;
        assert!(!is_red(px), "banner corner ({x},{y}) = {px:?}");
    }
}

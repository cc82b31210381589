// ABOUTME: Integration tests for image acquisition and article assembly against a mock HTTP server.
// ABOUTME: Covers the rejection conventions, duplicate reuse, download memoization, and cover selection.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use httpmock::prelude::*;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use letterbox_curator::resource::FetchOptions;
use letterbox_curator::{
    ArticleAssembler, ImagePipeline, PerceptualHashCache, RegexScanner, TargetEncoding,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn noisy(width: u32, height: u32, seed: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x.wrapping_mul(37) ^ y.wrapping_mul(91) ^ seed) as u8,
            (x.wrapping_mul(3) + y.wrapping_mul(5) + seed) as u8,
            ((x ^ y) + seed) as u8,
        ])
    }))
}

/// Large-scale structure with a little pixel noise so the encoded file stays
/// above the compression floor.
fn textured(width: u32, height: u32, base: impl Fn(u32, u32) -> u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let noise = (x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503)) >> 27;
        let v = base(x, y).saturating_add(noise as u8);
        Rgb([v, v, v])
    }))
}

fn encoded(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn pipeline(dir: &TempDir) -> ImagePipeline {
    ImagePipeline::new(
        reqwest::Client::new(),
        FetchOptions {
            allow_private_networks: true,
        },
        dir.path().join("images"),
        75,
    )
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn small_image_is_rejected_with_source_format() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/small.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(encoded(&noisy(50, 50, 1), ImageFormat::Png));
    });

    let mut hashes = PerceptualHashCache::new();
    let result = pipeline(&dir)
        .acquire(&mut hashes, &server.url("/small.png"), TargetEncoding::Jpeg)
        .await;

    assert_eq!(result.file_id, None);
    assert_eq!(result.source_format, Some(ImageFormat::Png));
    assert!(result.is_rejected());
    assert!(hashes.is_empty());
}

#[tokio::test]
async fn missing_or_undecodable_image_reports_nothing() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/gone.jpg");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method(GET).path("/garbage.jpg");
        then.status(200)
            .header("content-type", "image/jpeg")
            .body("<html>not an image</html>");
    });

    let pipeline = pipeline(&dir);
    let mut hashes = PerceptualHashCache::new();
    for path in ["/gone.jpg", "/garbage.jpg"] {
        let result = pipeline
            .acquire(&mut hashes, &server.url(path), TargetEncoding::Jpeg)
            .await;
        assert_eq!(result.file_id, None, "{}", path);
        assert_eq!(result.source_format, None, "{}", path);
    }
    assert_eq!(files_in(pipeline.images_dir()), 0);
}

#[tokio::test]
async fn private_hosts_are_refused_by_default() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/hero.png");
        then.status(200)
            .body(encoded(&noisy(300, 200, 2), ImageFormat::Png));
    });

    let guarded = ImagePipeline::new(
        reqwest::Client::new(),
        FetchOptions::default(),
        dir.path().join("images"),
        75,
    );
    let mut hashes = PerceptualHashCache::new();
    let result = guarded
        .acquire(&mut hashes, &server.url("/hero.png"), TargetEncoding::Png)
        .await;
    assert_eq!(result.file_id, None);
    assert_eq!(result.source_format, None);
    mock.assert_calls(0);
}

#[tokio::test]
async fn same_picture_at_two_urls_is_saved_once() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let body = encoded(&noisy(320, 240, 3), ImageFormat::Png);
    for path in ["/one.png", "/two.png"] {
        let body = body.clone();
        server.mock(move |when, then| {
            when.method(GET).path(path);
            then.status(200).header("content-type", "image/png").body(body);
        });
    }

    let pipeline = pipeline(&dir);
    let mut hashes = PerceptualHashCache::new();
    let first = pipeline
        .acquire(&mut hashes, &server.url("/one.png"), TargetEncoding::Jpeg)
        .await;
    let second = pipeline
        .acquire(&mut hashes, &server.url("/two.png"), TargetEncoding::Jpeg)
        .await;

    let file_id = first.file_id.clone().unwrap();
    assert!(file_id.ends_with(".jpg"));
    assert_eq!(second.file_id, Some(file_id));
    assert_eq!(second.source_format, Some(ImageFormat::Png));
    assert_eq!(files_in(pipeline.images_dir()), 1);

    // a different target encoding is a different cache entry
    let png = pipeline
        .acquire(&mut hashes, &server.url("/one.png"), TargetEncoding::Png)
        .await;
    assert!(png.file_id.unwrap().ends_with(".png"));
    assert_eq!(files_in(pipeline.images_dir()), 2);
}

#[tokio::test]
async fn different_pictures_get_their_own_files() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let gradient = textured(400, 300, |x, _| (x * 200 / 400) as u8);
    let checkerboard = textured(400, 300, |x, y| {
        if ((x / 100) + (y / 100)) % 2 == 0 {
            20
        } else {
            200
        }
    });
    for (path, picture) in [("/gradient.png", gradient), ("/checker.png", checkerboard)] {
        let body = encoded(&picture, ImageFormat::Png);
        server.mock(move |when, then| {
            when.method(GET).path(path);
            then.status(200).header("content-type", "image/png").body(body);
        });
    }

    let pipeline = pipeline(&dir);
    let mut hashes = PerceptualHashCache::new();
    let first = pipeline
        .acquire(&mut hashes, &server.url("/gradient.png"), TargetEncoding::Jpeg)
        .await;
    let second = pipeline
        .acquire(&mut hashes, &server.url("/checker.png"), TargetEncoding::Jpeg)
        .await;

    assert!(first.file_id.is_some());
    assert!(second.file_id.is_some());
    assert_ne!(first.file_id, second.file_id);
    assert_eq!(hashes.len(), 2);
    assert_eq!(files_in(pipeline.images_dir()), 2);
}

#[tokio::test]
async fn saved_file_is_a_valid_image_of_the_target_format() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/photo.jpg");
        then.status(200)
            .header("content-type", "image/jpeg")
            .body(encoded(&noisy(400, 300, 4), ImageFormat::Jpeg));
    });

    let pipeline = pipeline(&dir);
    let mut hashes = PerceptualHashCache::new();
    let result = pipeline
        .acquire(&mut hashes, &server.url("/photo.jpg"), TargetEncoding::Png)
        .await;
    let file_id = result.file_id.unwrap();
    assert_eq!(result.source_format, Some(ImageFormat::Jpeg));

    let saved = image::open(pipeline.images_dir().join(&file_id)).unwrap();
    assert_eq!((saved.width(), saved.height()), (400, 300));
    assert_eq!(
        image::ImageFormat::from_path(&file_id).unwrap(),
        ImageFormat::Png
    );
}

#[tokio::test]
async fn assembly_drops_avatars_and_picks_body_cover() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let avatar = server.mock(|when, then| {
        when.method(GET).path("/a.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(encoded(&noisy(50, 50, 5), ImageFormat::Png));
    });
    let hero = server.mock(|when, then| {
        when.method(GET).path("/b.jpg");
        then.status(200)
            .header("content-type", "image/jpeg")
            .body(encoded(&noisy(640, 480, 6), ImageFormat::Jpeg));
    });

    let a = server.url("/a.png");
    let b = server.url("/b.jpg");
    let html = format!(
        r#"<h2>News</h2><img src="{a}" width="30"><p>Story</p><img src="{b}"><p>More</p><img src="{b}" alt="again">"#
    );

    let pipeline = pipeline(&dir);
    let mut hashes = PerceptualHashCache::new();
    let assembled = ArticleAssembler::new(&RegexScanner, &pipeline)
        .assemble(&mut hashes, &html)
        .await;

    let cover = assembled.cover.clone().unwrap();
    assert!(cover.ends_with(".png"));
    assert!(assembled.avatar_blacklist.contains(&a));
    assert!(!assembled.html.contains(&a));
    assert!(assembled.html.contains(&format!(r#"<img src="{b}">"#)));
    assert!(assembled.html.contains(r#"alt="again""#));

    let body_file = assembled.body_mappings.get(&b).unwrap();
    assert!(body_file.ends_with(".jpg"));
    assert_eq!(assembled.body_mappings.len(), 1);

    // the avatar is never downloaded; the hero once per target encoding
    avatar.assert_calls(0);
    hero.assert_calls(2);
    assert_eq!(files_in(pipeline.images_dir()), 2);
}

#[tokio::test]
async fn assembly_keeps_tags_whose_download_failed() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/down.jpg");
        then.status(503);
    });
    server.mock(|when, then| {
        when.method(GET).path("/tiny.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(encoded(&noisy(20, 20, 7), ImageFormat::Png));
    });

    let down = server.url("/down.jpg");
    let tiny = server.url("/tiny.png");
    let html = format!(r#"<p><img src="{down}"></p><p><img src='{tiny}'></p>"#);

    let pipeline = pipeline(&dir);
    let mut hashes = PerceptualHashCache::new();
    let assembled = ArticleAssembler::new(&RegexScanner, &pipeline)
        .assemble(&mut hashes, &html)
        .await;

    assert_eq!(assembled.cover, None);
    assert_eq!(
        assembled.html,
        format!(r#"<p><img src="{down}"></p><p></p>"#)
    );
    assert!(assembled.body_mappings.is_empty());
}

#[tokio::test]
async fn metadata_image_wins_cover_selection() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/og.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(encoded(&noisy(600, 315, 8), ImageFormat::Png));
    });
    let body_img = server.mock(|when, then| {
        when.method(GET).path("/body.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(encoded(&noisy(300, 300, 9), ImageFormat::Png));
    });

    let html = format!(
        r#"<html><head><meta property="og:image" content="{}"></head><body><img src="{}"></body></html>"#,
        server.url("/og.png"),
        server.url("/body.png")
    );

    let pipeline = pipeline(&dir);
    let mut hashes = PerceptualHashCache::new();
    let assembled = ArticleAssembler::new(&RegexScanner, &pipeline)
        .assemble(&mut hashes, &html)
        .await;

    assert!(assembled.cover.is_some());
    assert_ne!(
        assembled.cover.as_ref(),
        assembled.body_mappings.get(&server.url("/body.png"))
    );
    // fetched only for the body, as JPEG
    body_img.assert_calls(1);
}

#[tokio::test]
async fn entity_encoded_avatar_url_is_not_used_as_cover() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let avatar = server.mock(|when, then| {
        when.method(GET).path("/avatar.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(encoded(&noisy(300, 300, 10), ImageFormat::Png));
    });
    let hero = server.mock(|when, then| {
        when.method(GET).path("/hero.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(encoded(&noisy(500, 300, 11), ImageFormat::Png));
    });

    let avatar_src = format!("{}?s=200&amp;r=g", server.url("/avatar.png"));
    let html = format!(
        r#"<html><head><meta property="og:image" content="{avatar_src}"></head><body><img src="{avatar_src}" width="40"><img src="{}"></body></html>"#,
        server.url("/hero.png")
    );

    let pipeline = pipeline(&dir);
    let mut hashes = PerceptualHashCache::new();
    let assembled = ArticleAssembler::new(&RegexScanner, &pipeline)
        .assemble(&mut hashes, &html)
        .await;

    assert!(assembled.cover.is_some());
    assert!(!assembled.html.contains("avatar.png"));
    avatar.assert_calls(0);
    hero.assert_calls(2);
}

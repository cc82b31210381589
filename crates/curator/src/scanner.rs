// ABOUTME: HTML image scanner: finds <img> tags, classifies avatars, and picks a cover image.
// ABOUTME: Regex-based tag scanning sits behind the ImageScanner trait; meta tags are read with scraper.

use std::collections::HashSet;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::images::filters::is_avatar_tag;

static IMG_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["'][^>]*>"#).unwrap());

/// Social-preview metadata names consulted for the cover image, highest priority first.
pub const COVER_META_NAMES: &[&str] = &["og:image", "twitter:image", "image", "thumbnail"];

/// One `<img>` occurrence in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMatch {
    /// Exact tag text as it appears in the document.
    pub tag: String,
    /// `src` exactly as written, character references included.
    pub url: String,
    /// `src` with character references decoded, as a browser would request it.
    pub decoded_url: String,
    /// Byte range of `tag` within the scanned document.
    pub range: Range<usize>,
}

/// Finds image references in article HTML.
pub trait ImageScanner: Send + Sync {
    /// Every image tag in document order.
    fn find_all_image_urls(&self, html: &str) -> Vec<ImageMatch>;

    /// Picks the cover image URL: social-preview metadata first, then the first
    /// body image that is not blacklisted.
    fn select_cover_image(&self, html: &str, blacklist: &HashSet<String>) -> Option<String> {
        let matches = self.find_all_image_urls(html);
        cover_candidates(html, &matches, blacklist).into_iter().next()
    }
}

/// Scans raw markup with a pattern tuned for mail HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexScanner;

impl ImageScanner for RegexScanner {
    fn find_all_image_urls(&self, html: &str) -> Vec<ImageMatch> {
        IMG_TAG_RE
            .captures_iter(html)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let url = caps.get(1)?.as_str();
                Some(ImageMatch {
                    tag: whole.as_str().to_string(),
                    url: url.to_string(),
                    decoded_url: decode_src(whole.as_str()).unwrap_or_else(|| url.to_string()),
                    range: whole.range(),
                })
            })
            .collect()
    }
}

/// Reads `src` back through the HTML parser so entities such as `&amp;`
/// decode the same way they do in meta tag content.
fn decode_src(tag: &str) -> Option<String> {
    let sel = Selector::parse("img[src]").ok()?;
    let fragment = Html::parse_fragment(tag);
    let src = fragment.select(&sel).next()?.value().attr("src")?;
    Some(src.to_string())
}

/// Collects every decoded URL that appears at least once in an avatar-like tag.
///
/// Classification is per URL: a later full-size use of a blacklisted URL stays blacklisted.
pub fn classify_avatars(matches: &[ImageMatch]) -> HashSet<String> {
    matches
        .iter()
        .filter(|m| is_avatar_tag(&m.tag))
        .map(|m| m.decoded_url.clone())
        .collect()
}

/// Returns the trimmed `content` of the first `<meta>` whose `property` or `name`
/// equals `name`, ignoring ASCII case.
pub fn extract_meta_tag(doc: &Html, name: &str) -> Option<String> {
    let sel = Selector::parse("meta[content]").ok()?;
    for el in doc.select(&sel) {
        let element = el.value();
        let matches_name = ["property", "name"]
            .iter()
            .filter_map(|attr| element.attr(attr))
            .any(|value| value.trim().eq_ignore_ascii_case(name));
        if !matches_name {
            continue;
        }
        if let Some(content) = element.attr("content") {
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Returns the highest-priority social-preview image URL, if any.
pub fn extract_og_image(doc: &Html) -> Option<String> {
    COVER_META_NAMES
        .iter()
        .find_map(|name| extract_meta_tag(doc, name))
}

/// Ordered, de-duplicated cover candidates, as decoded URLs: the metadata image (unless
/// blacklisted) followed by non-blacklisted body images in document order.
pub fn cover_candidates(
    html: &str,
    matches: &[ImageMatch],
    blacklist: &HashSet<String>,
) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    let meta_url = extract_og_image(&doc).filter(|url| !blacklist.contains(url));
    let body_urls = matches
        .iter()
        .map(|m| m.decoded_url.clone())
        .filter(|url| !blacklist.contains(url));

    for url in meta_url.into_iter().chain(body_urls) {
        if seen.insert(url.clone()) {
            candidates.push(url);
        }
    }
    candidates
}

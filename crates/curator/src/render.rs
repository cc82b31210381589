// ABOUTME: Read-time rendering of a stored article for e-readers and read-later services.
// ABOUTME: Injects og metadata, swaps body images for local copies, and adds a header link.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::article::ArticleMapping;

static OG_META_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta[^>]+property=["']og:[^>]+>"#).unwrap());
static TWITTER_META_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<meta[^>]+name=["']twitter:[^>]+>"#).unwrap());
static H2_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</h2\s*>").unwrap());
static P_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<p[\s>]").unwrap());

/// Escapes text for use inside a double-quoted attribute.
fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Public URL of a stored image.
pub fn image_url(public_base: &str, file_id: &str) -> String {
    format!("{}/images/{}", public_base.trim_end_matches('/'), file_id)
}

/// Public URL of a stored article.
pub fn article_url(public_base: &str, filename: &str) -> String {
    format!("{}/read/{}", public_base.trim_end_matches('/'), filename)
}

/// Meta tags describing the article, pointing the preview image at the local copy.
fn og_tags(mapping: &ArticleMapping, public_base: &str) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(cover) = &mapping.og_image_local {
        let url = escape_attr(&image_url(public_base, cover));
        tags.push(format!(r#"<meta property="og:image" content="{}">"#, url));
        tags.push(format!(r#"<meta name="twitter:image" content="{}">"#, url));
    }

    let fields = [
        ("og:title", mapping.og_title.as_deref()),
        ("og:description", mapping.og_description.as_deref()),
        ("og:type", Some(mapping.og_type.as_str())),
        ("og:url", mapping.og_url.as_deref()),
    ];
    for (property, value) in fields {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            tags.push(format!(
                r#"<meta property="{}" content="{}">"#,
                property,
                escape_attr(value)
            ));
        }
    }
    tags
}

/// Puts `meta` inside the document head, creating one when needed.
fn inject_head(content: &str, meta: &str) -> String {
    if content.contains("<head>") {
        content.replacen("<head>", &format!("<head>{}", meta), 1)
    } else if content.contains("<html>") {
        content.replacen("<html>", &format!("<html><head>{}</head>", meta), 1)
    } else {
        format!("{}{}", meta, content)
    }
}

fn header_html(public_link: &str, mail_date: &str) -> String {
    format!(
        r#"
<p style="font-style: italic; color: #666; margin: 10px 0; font-size: 0.9em;">
    <a href="{}" target="_blank" style="color: #0066cc; text-decoration: underline;">makaleyi web sitesinde görüntüle</a>
    <span style="margin-left: 8px; color: #999; font-size: 0.85em;">({})</span>
</p>
"#,
        escape_attr(public_link),
        mail_date
    )
}

/// Places the header after the first `</h2>`, else before the first paragraph,
/// else at the start of the body, else at the very start.
fn inject_header(content: &str, header: &str) -> String {
    if let Some(m) = H2_CLOSE_RE.find(content) {
        return format!("{}{}{}", &content[..m.end()], header, &content[m.end()..]);
    }
    if let Some(m) = P_OPEN_RE.find(content) {
        return format!("{}{}{}", &content[..m.start()], header, &content[m.start()..]);
    }
    if content.contains("<body>") {
        return content.replacen("<body>", &format!("<body>{}", header), 1);
    }
    format!("{}{}", header, content)
}

/// Renders a stored article for serving.
///
/// `<div>` becomes `<p>` for e-reader compatibility. With a mapping, existing
/// og/twitter meta tags are replaced by ones built from the mapping and every
/// mapped body image is pointed at its local copy.
pub fn render_article(
    html: &str,
    mapping: Option<&ArticleMapping>,
    public_base: &str,
    filename: &str,
) -> String {
    let mut content = html.replace("<div", "<p").replace("</div", "</p");

    if let Some(mapping) = mapping {
        let tags = og_tags(mapping, public_base);
        if !tags.is_empty() {
            content = OG_META_RE.replace_all(&content, "").into_owned();
            content = TWITTER_META_RE.replace_all(&content, "").into_owned();
            content = inject_head(&content, &tags.join("\n"));
        }

        for (remote, local) in &mapping.body_mappings {
            let local_url = image_url(public_base, local);
            content = content
                .replace(
                    &format!(r#"src="{}""#, remote),
                    &format!(r#"src="{}""#, local_url),
                )
                .replace(&format!("src='{}'", remote), &format!("src='{}'", local_url));
        }
    }

    let mail_date = mapping.map(|m| m.mail_date.as_str()).unwrap_or("");
    let header = header_html(&article_url(public_base, filename), mail_date);
    inject_header(&content, &header)
}

// ABOUTME: Article assembly: picks the cover image, curates body images, and rewrites the body.
// ABOUTME: Body rewriting is two-pass: decide per tag first, then splice the document once.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Range;

use tracing::{debug, info};

use crate::images::{ImagePipeline, PerceptualHashCache, ProcessedImage, TargetEncoding};
use crate::scanner::{classify_avatars, cover_candidates, ImageMatch, ImageScanner};

/// Per-article memo of pipeline results, keyed by (URL, target encoding).
///
/// Guarantees at most one network fetch per distinct pair within an article.
#[derive(Debug, Default)]
pub struct DownloadCache {
    entries: HashMap<(String, TargetEncoding), ProcessedImage>,
}

impl DownloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str, target: TargetEncoding) -> Option<&ProcessedImage> {
        self.entries.get(&(url.to_string(), target))
    }

    /// Returns the memoized result or runs the pipeline once for this pair.
    pub async fn acquire(
        &mut self,
        pipeline: &ImagePipeline,
        hashes: &mut PerceptualHashCache,
        url: &str,
        target: TargetEncoding,
    ) -> ProcessedImage {
        if let Some(hit) = self.get(url, target) {
            debug!(url, %target, "download cache hit");
            return hit.clone();
        }
        let result = pipeline.acquire(hashes, url, target).await;
        self.entries
            .insert((url.to_string(), target), result.clone());
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What to do with one `<img>` tag in the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagDecision {
    /// Leave the tag and its remote URL untouched.
    Keep,
    /// Leave the tag; the URL is served from the given local file at read time.
    KeepMapped(String),
    /// Drop the tag from the document.
    Remove,
}

/// Decision for the tag occupying `range` in the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyDecision {
    pub url: String,
    pub range: Range<usize>,
    pub decision: TagDecision,
}

/// Maps a body-image pipeline result to a tag decision.
///
/// A decoded-but-rejected image is removed; a fetch or decode failure keeps the
/// remote URL, since the failure may be temporary.
pub fn decide_body_tag(processed: &ProcessedImage) -> TagDecision {
    match (&processed.file_id, processed.source_format) {
        (Some(file_id), _) => TagDecision::KeepMapped(file_id.clone()),
        (None, Some(_)) => TagDecision::Remove,
        (None, None) => TagDecision::Keep,
    }
}

/// Splices removed tags out of `html`. Decisions must be in document order and
/// must not overlap.
pub fn apply_decisions(html: &str, decisions: &[BodyDecision]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for d in decisions {
        if d.decision != TagDecision::Remove || d.range.start < cursor {
            continue;
        }
        out.push_str(&html[cursor..d.range.start]);
        cursor = d.range.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// Result of assembling one article body.
#[derive(Debug, Clone, Default)]
pub struct AssembledArticle {
    pub html: String,
    pub cover: Option<String>,
    pub body_mappings: BTreeMap<String, String>,
    pub avatar_blacklist: HashSet<String>,
}

/// Glue between the scanner and the image pipeline for a single article.
pub struct ArticleAssembler<'a> {
    scanner: &'a dyn ImageScanner,
    pipeline: &'a ImagePipeline,
}

impl<'a> ArticleAssembler<'a> {
    pub fn new(scanner: &'a dyn ImageScanner, pipeline: &'a ImagePipeline) -> Self {
        Self { scanner, pipeline }
    }

    /// Processes every image of `content`. `hashes` must already be reset for this article.
    pub async fn assemble(
        &self,
        hashes: &mut PerceptualHashCache,
        content: &str,
    ) -> AssembledArticle {
        let matches = self.scanner.find_all_image_urls(content);
        let blacklist = classify_avatars(&matches);
        if !blacklist.is_empty() {
            debug!(count = blacklist.len(), "avatar urls blacklisted");
        }

        let mut downloads = DownloadCache::new();

        let cover = self
            .select_cover(&mut downloads, hashes, content, &matches, &blacklist)
            .await;

        let mut body_mappings = BTreeMap::new();
        let mut decisions = Vec::with_capacity(matches.len());
        for m in &matches {
            // the blacklist already contains every avatar-like tag's URL
            let decision = if blacklist.contains(&m.decoded_url) {
                info!(url = %m.url, "avatar or icon removed");
                TagDecision::Remove
            } else {
                let processed = downloads
                    .acquire(self.pipeline, hashes, &m.decoded_url, TargetEncoding::Jpeg)
                    .await;
                let decision = decide_body_tag(&processed);
                match &decision {
                    TagDecision::KeepMapped(file_id) => {
                        // keyed by the raw src, which is what render rewrites
                        body_mappings.insert(m.url.clone(), file_id.clone());
                    }
                    TagDecision::Remove => {
                        info!(url = %m.url, source = ?processed.source_label(), "rejected image removed");
                    }
                    TagDecision::Keep => {
                        debug!(url = %m.url, "download failed, keeping remote url");
                    }
                }
                decision
            };
            decisions.push(BodyDecision {
                url: m.url.clone(),
                range: m.range.clone(),
                decision,
            });
        }

        AssembledArticle {
            html: apply_decisions(content, &decisions),
            cover,
            body_mappings,
            avatar_blacklist: blacklist,
        }
    }

    async fn select_cover(
        &self,
        downloads: &mut DownloadCache,
        hashes: &mut PerceptualHashCache,
        content: &str,
        matches: &[ImageMatch],
        blacklist: &HashSet<String>,
    ) -> Option<String> {
        for url in cover_candidates(content, matches, blacklist) {
            let processed = downloads
                .acquire(self.pipeline, hashes, &url, TargetEncoding::Png)
                .await;
            if let Some(file_id) = processed.file_id {
                info!(%url, file = %file_id, "cover image selected");
                return Some(file_id);
            }
        }
        info!("no usable cover image");
        None
    }
}

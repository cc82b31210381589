// ABOUTME: Per-article perceptual hash cache used to reuse files for visually identical images.
// ABOUTME: Maps (pHash, target encoding) to the first saved file id; reset between articles.

use std::collections::HashMap;

use image::DynamicImage;
use image_hasher::{HashAlg, Hasher, HasherConfig};
use tracing::debug;

use super::normalize::TargetEncoding;

/// Duplicate-detection cache scoped to one article-processing pass.
///
/// Entries are keyed by the 64-bit DCT median hash of the decoded image together
/// with the target encoding, so the same picture saved once as JPEG and once as
/// PNG occupies two entries. The first registration for a key wins.
pub struct PerceptualHashCache {
    hasher: Hasher,
    entries: HashMap<(String, TargetEncoding), String>,
}

impl PerceptualHashCache {
    pub fn new() -> Self {
        let hasher = HasherConfig::new()
            .hash_size(8, 8)
            .hash_alg(HashAlg::Median)
            .preproc_dct()
            .to_hasher();
        Self {
            hasher,
            entries: HashMap::new(),
        }
    }

    /// Computes the perceptual hash, or None for images that cannot be hashed.
    pub fn hash(&self, image: &DynamicImage) -> Option<String> {
        if image.width() == 0 || image.height() == 0 {
            return None;
        }
        Some(self.hasher.hash_image(image).to_base64())
    }

    /// Returns the file id previously saved for a visually identical image in this encoding.
    pub fn lookup(&self, image: &DynamicImage, target: TargetEncoding) -> Option<String> {
        let hash = self.hash(image)?;
        self.lookup_hash(&hash, target)
    }

    /// Same as [`lookup`](Self::lookup) for a hash computed with [`hash`](Self::hash).
    pub fn lookup_hash(&self, hash: &str, target: TargetEncoding) -> Option<String> {
        self.entries.get(&(hash.to_string(), target)).cloned()
    }

    /// Records `file_id` as the saved copy of `image` in `target` encoding.
    ///
    /// Unhashable images are skipped; an existing entry is never replaced.
    pub fn register(&mut self, image: &DynamicImage, target: TargetEncoding, file_id: &str) {
        let Some(hash) = self.hash(image) else {
            debug!(file = file_id, "image could not be hashed, not registered");
            return;
        };
        self.register_hash(&hash, target, file_id);
    }

    /// Same as [`register`](Self::register) for a precomputed hash.
    pub fn register_hash(&mut self, hash: &str, target: TargetEncoding, file_id: &str) {
        self.entries
            .entry((hash.to_string(), target))
            .or_insert_with(|| file_id.to_string());
    }

    /// Drops every entry. Called at the start of each article.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PerceptualHashCache {
    fn default() -> Self {
        Self::new()
    }
}

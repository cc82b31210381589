// ABOUTME: Image curation: quality filters, perceptual dedup cache, normalization, and acquisition.
// ABOUTME: Re-exports the pipeline entry points used by article assembly.

//! Image curation module.
//!
//! Submodules:
//! - `filters`: pure rejection predicates (variance, aspect ratio, compression, avatar tags).
//! - `hash_cache`: per-article perceptual hash cache.
//! - `normalize`: target encodings, alpha handling, and encoding to bytes.
//! - `pipeline`: the fetch-to-disk cascade producing `ProcessedImage`.

pub mod filters;
pub mod hash_cache;
pub mod normalize;
pub mod pipeline;

pub use filters::is_avatar_tag;
pub use hash_cache::PerceptualHashCache;
pub use normalize::TargetEncoding;
pub use pipeline::{ImagePipeline, ProcessedImage, Rejection};

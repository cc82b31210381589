// ABOUTME: Image acquisition pipeline: fetch, decode, quality cascade, dedup, normalize, persist.
// ABOUTME: Every failure collapses into a ProcessedImage pair; nothing propagates to the caller.

use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::filters::{
    bad_aspect_ratio, low_color_variance, over_compressed, DEFAULT_BYTES_PER_PIXEL,
    DEFAULT_MAX_RATIO, DEFAULT_MIN_RATIO, DEFAULT_VARIANCE_THRESHOLD, MIN_DIMENSION,
};
use super::hash_cache::PerceptualHashCache;
use super::normalize::{encode, format_label, normalize, TargetEncoding};
use crate::error::CurateError;
use crate::resource::{fetch, FetchOptions};

/// Outcome of acquiring one (URL, target encoding) pair.
///
/// `source_format` is present whenever the bytes decoded. A missing file id with
/// a present format means the image was rejected or could not be saved; both
/// missing means the fetch or decode failed, which may be transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub file_id: Option<String>,
    pub source_format: Option<ImageFormat>,
}

impl ProcessedImage {
    fn unusable() -> Self {
        Self {
            file_id: None,
            source_format: None,
        }
    }

    fn rejected(format: ImageFormat) -> Self {
        Self {
            file_id: None,
            source_format: Some(format),
        }
    }

    fn saved(file_id: String, format: ImageFormat) -> Self {
        Self {
            file_id: Some(file_id),
            source_format: Some(format),
        }
    }

    /// Uppercase label of the decoded source format, e.g. `PNG`.
    pub fn source_label(&self) -> Option<&'static str> {
        self.source_format.map(format_label)
    }

    /// True when the image decoded but was not kept.
    pub fn is_rejected(&self) -> bool {
        self.file_id.is_none() && self.source_format.is_some()
    }
}

/// Why a decoded image failed the quality cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    TooSmall { width: u32, height: u32 },
    AspectRatio(f64),
    LowVariance,
    OverCompressed { bytes: usize },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::TooSmall { width, height } => write!(f, "too small ({}x{})", width, height),
            Rejection::AspectRatio(ratio) => write!(f, "abnormal aspect ratio ({:.2})", ratio),
            Rejection::LowVariance => write!(f, "single-color or blank image"),
            Rejection::OverCompressed { bytes } => {
                write!(f, "over-compressed ({} bytes)", bytes)
            }
        }
    }
}

/// Runs the quality cascade, cheapest checks first.
pub fn screen(image: &DynamicImage, byte_len: usize) -> Option<Rejection> {
    let (width, height) = (image.width(), image.height());

    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Some(Rejection::TooSmall { width, height });
    }
    if bad_aspect_ratio(width, height, DEFAULT_MIN_RATIO, DEFAULT_MAX_RATIO) {
        return Some(Rejection::AspectRatio(width as f64 / height as f64));
    }
    if low_color_variance(image, DEFAULT_VARIANCE_THRESHOLD) {
        return Some(Rejection::LowVariance);
    }
    if over_compressed(byte_len, width, height, DEFAULT_BYTES_PER_PIXEL) {
        return Some(Rejection::OverCompressed { bytes: byte_len });
    }
    None
}

/// Decodes image bytes, returning the sniffed format alongside the pixels.
pub fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), CurateError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CurateError::decode("<memory>", "Decode", Some(anyhow::Error::new(e))))?;
    let format = reader.format().ok_or_else(|| {
        CurateError::decode(
            "<memory>",
            "Decode",
            Some(anyhow::anyhow!("unrecognized image format")),
        )
    })?;
    let image = reader
        .decode()
        .map_err(|e| CurateError::decode("<memory>", "Decode", Some(anyhow::Error::new(e))))?;
    Ok((image, format))
}

/// Downloads remote images and turns them into curated local files.
#[derive(Debug, Clone)]
pub struct ImagePipeline {
    http_client: reqwest::Client,
    fetch_opts: FetchOptions,
    images_dir: PathBuf,
    jpeg_quality: u8,
}

impl ImagePipeline {
    pub fn new(
        http_client: reqwest::Client,
        fetch_opts: FetchOptions,
        images_dir: impl Into<PathBuf>,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            http_client,
            fetch_opts,
            images_dir: images_dir.into(),
            jpeg_quality,
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Fetches `url` and normalizes it into `target`, consulting and updating `hashes`.
    pub async fn acquire(
        &self,
        hashes: &mut PerceptualHashCache,
        url: &str,
        target: TargetEncoding,
    ) -> ProcessedImage {
        debug!(url, %target, "acquiring image");

        let body = match fetch(&self.http_client, url, &self.fetch_opts).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url, error = %e, "image download failed");
                return ProcessedImage::unusable();
            }
        };

        let (image, format) = match decode(&body) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(url, error = %e, "image could not be decoded");
                return ProcessedImage::unusable();
            }
        };
        debug!(
            url,
            width = image.width(),
            height = image.height(),
            format = format_label(format),
            "decoded image"
        );

        if let Some(reason) = screen(&image, body.len()) {
            info!(url, %reason, "image rejected");
            return ProcessedImage::rejected(format);
        }

        let hash = hashes.hash(&image);
        if let Some(existing) = hash.as_deref().and_then(|h| hashes.lookup_hash(h, target)) {
            info!(url, file = %existing, %target, "duplicate image, reusing saved file");
            return ProcessedImage::saved(existing, format);
        }

        let file_id = match self.persist(&image, target).await {
            Ok(file_id) => file_id,
            Err(e) => {
                warn!(url, error = %e, "image could not be saved");
                return ProcessedImage::rejected(format);
            }
        };
        match hash {
            Some(hash) => hashes.register_hash(&hash, target, &file_id),
            None => debug!(url, file = %file_id, "image could not be hashed, not registered"),
        }

        info!(url, file = %file_id, %target, "image saved");
        ProcessedImage::saved(file_id, format)
    }

    /// Normalizes, encodes and writes the image under a fresh UUID file name.
    async fn persist(
        &self,
        image: &DynamicImage,
        target: TargetEncoding,
    ) -> Result<String, CurateError> {
        let file_id = format!("{}.{}", Uuid::new_v4(), target.extension());
        let path = self.images_dir.join(&file_id);
        let target_str = path.display().to_string();

        let normalized = normalize(image, target);
        let bytes = encode(&normalized, target, self.jpeg_quality).map_err(|e| {
            CurateError::encode(&target_str, "Persist", Some(anyhow::Error::new(e)))
        })?;

        tokio::fs::create_dir_all(&self.images_dir)
            .await
            .map_err(|e| CurateError::io(self.images_dir.display().to_string(), "Persist", e))?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CurateError::io(&target_str, "Persist", e))?;

        Ok(file_id)
    }
}

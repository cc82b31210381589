// ABOUTME: On-disk article store: articles/, images/, and data/ directories under one root.
// ABOUTME: Saves articles with their JSON mapping, enforces retention, and reports folder stats.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use crate::article::ArticleMapping;
use crate::error::CurateError;

static ARTICLE_FILENAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}\.html$").unwrap()
});

/// True for `<lowercase uuid>.html` names; anything else is never served or deleted.
pub fn is_article_filename(name: &str) -> bool {
    ARTICLE_FILENAME_RE.is_match(name)
}

/// Human-readable byte size with one decimal above 1 KB.
fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else if b < KB * KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else {
        format!("{:.1} GB", b / (KB * KB * KB))
    }
}

/// File count and total size of the regular files directly inside `dir`.
/// Unreadable directories count as empty.
pub fn folder_stats(dir: &Path) -> (usize, u64) {
    let Ok(entries) = fs::read_dir(dir) else {
        return (0, 0);
    };
    entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.metadata().ok())
        .filter(|m| m.is_file())
        .fold((0, 0), |(count, size), m| (count + 1, size + m.len()))
}

/// One stored article, as listed for the index page.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleEntry {
    pub name: String,
    #[serde(skip)]
    pub modified: SystemTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct FolderStats {
    pub count: usize,
    pub bytes: u64,
    pub size: String,
}

impl FolderStats {
    fn of(dir: &Path) -> Self {
        let (count, bytes) = folder_stats(dir);
        Self {
            count,
            bytes,
            size: format_size(bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_articles: usize,
    pub articles: FolderStats,
    pub data: FolderStats,
    pub images: FolderStats,
}

/// Durable storage shared by ingestion, rendering, and retention.
#[derive(Debug, Clone)]
pub struct ArticleStore {
    articles_dir: PathBuf,
    images_dir: PathBuf,
    data_dir: PathBuf,
}

impl ArticleStore {
    /// Uses `articles/`, `images/`, and `data/` under `base_dir`.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        let base = base_dir.as_ref();
        Self {
            articles_dir: base.join("articles"),
            images_dir: base.join("images"),
            data_dir: base.join("data"),
        }
    }

    pub fn articles_dir(&self) -> &Path {
        &self.articles_dir
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn ensure_dirs(&self) -> Result<(), CurateError> {
        for dir in [&self.articles_dir, &self.images_dir, &self.data_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| CurateError::io(dir.display().to_string(), "EnsureDirs", e))?;
        }
        Ok(())
    }

    fn mapping_path(&self, article_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", article_id))
    }

    /// Writes `<id>.html` and the pretty-printed `<id>.json` mapping.
    pub fn save(
        &self,
        article_id: &str,
        html: &str,
        mapping: &ArticleMapping,
    ) -> Result<PathBuf, CurateError> {
        self.ensure_dirs()?;
        let html_path = self.articles_dir.join(format!("{}.html", article_id));
        let json_path = self.mapping_path(article_id);

        fs::write(&html_path, html)
            .map_err(|e| CurateError::io(html_path.display().to_string(), "Save", e))?;
        let json = serde_json::to_string_pretty(mapping).map_err(|e| {
            CurateError::encode(json_path.display().to_string(), "Save", Some(e.into()))
        })?;
        fs::write(&json_path, json)
            .map_err(|e| CurateError::io(json_path.display().to_string(), "Save", e))?;

        info!(article = article_id, "article and mapping saved");
        Ok(html_path)
    }

    /// Reads an article's HTML. Names that are not `<uuid>.html` are refused.
    pub fn read_article(&self, filename: &str) -> Result<String, CurateError> {
        if !is_article_filename(filename) {
            return Err(CurateError::invalid_url(
                filename,
                "ReadArticle",
                Some(anyhow::anyhow!("not an article file name")),
            ));
        }
        let path = self.articles_dir.join(filename);
        fs::read_to_string(&path)
            .map_err(|e| CurateError::io(path.display().to_string(), "ReadArticle", e))
    }

    /// Loads the mapping for an article file name, if one was saved.
    pub fn load_mapping(&self, filename: &str) -> Result<Option<ArticleMapping>, CurateError> {
        let article_id = filename.trim_end_matches(".html");
        let path = self.mapping_path(article_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| CurateError::io(path.display().to_string(), "LoadMapping", e))?;
        let mapping = serde_json::from_str(&raw).map_err(|e| {
            CurateError::decode(path.display().to_string(), "LoadMapping", Some(e.into()))
        })?;
        Ok(Some(mapping))
    }

    /// Removes an article, its mapping, and every image the mapping references.
    pub fn delete_article(&self, filename: &str) -> Result<(), CurateError> {
        if !is_article_filename(filename) {
            return Err(CurateError::invalid_url(
                filename,
                "DeleteArticle",
                Some(anyhow::anyhow!("not an article file name")),
            ));
        }

        if let Some(mapping) = self.load_mapping(filename)? {
            for image in mapping.local_images() {
                if image.contains('/') || image.contains('\\') || image.contains("..") {
                    warn!(article = filename, image, "refusing to delete image outside store");
                    continue;
                }
                remove_if_present(&self.images_dir.join(image))?;
            }
            let article_id = filename.trim_end_matches(".html");
            remove_if_present(&self.mapping_path(article_id))?;
            info!(article = article_id, "mapping and local images deleted");
        }

        remove_if_present(&self.articles_dir.join(filename))?;
        info!(article = filename, "article deleted");
        Ok(())
    }

    /// Stored articles, newest first.
    pub fn list_articles(&self) -> Result<Vec<ArticleEntry>, CurateError> {
        let entries = match fs::read_dir(&self.articles_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CurateError::io(
                    self.articles_dir.display().to_string(),
                    "ListArticles",
                    e,
                ))
            }
        };

        let mut articles: Vec<ArticleEntry> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                if !is_article_filename(&name) {
                    return None;
                }
                let modified = e.metadata().and_then(|m| m.modified()).ok()?;
                Some(ArticleEntry { name, modified })
            })
            .collect();
        articles.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(articles)
    }

    /// Deletes the oldest articles until at most `max_articles` remain.
    /// Returns how many were deleted; individual failures are logged and skipped.
    pub fn cleanup_old_articles(&self, max_articles: usize) -> Result<usize, CurateError> {
        let articles = self.list_articles()?;
        if articles.len() <= max_articles {
            return Ok(0);
        }

        let excess = articles.len() - max_articles;
        let mut deleted = 0;
        for entry in articles.iter().rev().take(excess) {
            match self.delete_article(&entry.name) {
                Ok(()) => deleted += 1,
                Err(e) => warn!(article = %entry.name, error = %e, "article deletion failed"),
            }
        }
        info!(deleted, "old articles cleaned up");
        Ok(deleted)
    }

    pub fn stats(&self) -> Result<StoreStats, CurateError> {
        Ok(StoreStats {
            total_articles: self.list_articles()?.len(),
            articles: FolderStats::of(&self.articles_dir),
            data: FolderStats::of(&self.data_dir),
            images: FolderStats::of(&self.images_dir),
        })
    }
}

fn remove_if_present(path: &Path) -> Result<(), CurateError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CurateError::io(path.display().to_string(), "Remove", e)),
    }
}

// ABOUTME: Main library entry point for the letterbox newsletter curator.
// ABOUTME: Re-exports the public API: Curator, CuratorBuilder, Options, MailMessage, CurateError, ErrorCode.

//! Letterbox - turns newsletter mail into self-hosted articles with curated images.
//!
//! Every `<img>` in a message is downloaded, screened by cheap quality filters,
//! de-duplicated by perceptual hash, re-encoded, and stored locally. Avatar-like
//! tags are dropped and a cover image is chosen for link previews.
//!
//! # Example
//!
//! ```no_run
//! use letterbox_curator::{CurateError, Curator, MailMessage};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CurateError> {
//!     let mut curator = Curator::builder().base_dir("/var/lib/letterbox").build();
//!     let msg = MailMessage {
//!         subject: "Weekly digest".into(),
//!         html: Some("<h2>Hello</h2><img src=\"https://example.com/a.jpg\">".into()),
//!         ..Default::default()
//!     };
//!     let article = curator.process_message(&msg).await?;
//!     println!("{}", article.public_url);
//!     Ok(())
//! }
//! ```

pub mod article;
pub mod assembly;
pub mod curator;
pub mod error;
pub mod images;
pub mod options;
pub mod publish;
pub mod render;
pub mod resource;
pub mod scanner;
pub mod store;

pub use crate::article::{ArticleMapping, MailMessage};
pub use crate::assembly::{ArticleAssembler, AssembledArticle, DownloadCache};
pub use crate::curator::{Curator, ProcessedArticle};
pub use crate::error::{CurateError, ErrorCode};
pub use crate::images::{ImagePipeline, PerceptualHashCache, ProcessedImage, TargetEncoding};
pub use crate::options::{Credentials, CuratorBuilder, Options};
pub use crate::publish::{ReadLaterClient, SubmitOutcome};
pub use crate::render::render_article;
pub use crate::scanner::{ImageMatch, ImageScanner, RegexScanner};
pub use crate::store::{ArticleStore, StoreStats};

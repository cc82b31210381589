// ABOUTME: The Curator ties the pipeline together for one mail message at a time.
// ABOUTME: process_message() assembles, stores, and publishes an article; render() serves one back.

use std::net::ToSocketAddrs;

use chrono::Utc;
use scraper::Html;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::article::{format_mail_date, resolve_mail_date, ArticleMapping, MailMessage};
use crate::assembly::ArticleAssembler;
use crate::error::CurateError;
use crate::images::{ImagePipeline, PerceptualHashCache};
use crate::options::{CuratorBuilder, Options};
use crate::publish::{ReadLaterClient, SubmitOutcome};
use crate::render::{article_url, render_article};
use crate::resource::{is_private_ip, FetchOptions};
use crate::scanner::{extract_meta_tag, ImageScanner, RegexScanner};
use crate::store::{ArticleStore, StoreStats};

/// Outcome of processing one mail message.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedArticle {
    pub article_id: String,
    pub public_url: String,
    pub mapping: ArticleMapping,
    /// `None` when publishing is disabled or the service could not be reached.
    pub published: Option<SubmitOutcome>,
}

impl ProcessedArticle {
    pub fn filename(&self) -> String {
        format!("{}.html", self.article_id)
    }
}

pub struct Curator {
    opts: Options,
    scanner: Box<dyn ImageScanner>,
    hashes: PerceptualHashCache,
    pipeline: ImagePipeline,
    store: ArticleStore,
    read_later: Option<ReadLaterClient>,
}

fn redirect_policy(allow_private: bool) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        if allow_private {
            return attempt.follow();
        }
        let next = attempt.url().clone();
        let Some(host) = next.host_str() else {
            return attempt.follow();
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            if is_private_ip(&ip) {
                return attempt.error("redirect to private IP blocked");
            }
            return attempt.follow();
        }
        // synchronous DNS resolution to avoid async in redirect policy
        let port = next.port_or_known_default().unwrap_or(80);
        match (host, port).to_socket_addrs() {
            Ok(mut addrs) => {
                if addrs.any(|sa| is_private_ip(&sa.ip())) {
                    attempt.error("redirect to private IP blocked")
                } else {
                    attempt.follow()
                }
            }
            Err(_) => attempt.error("DNS lookup failed during redirect"),
        }
    })
}

impl Curator {
    pub fn builder() -> CuratorBuilder {
        CuratorBuilder::new()
    }

    pub fn new(opts: Options) -> Self {
        let http_client = opts.http_client.clone().unwrap_or_else(|| {
            reqwest::Client::builder()
                .redirect(redirect_policy(opts.allow_private_networks))
                .user_agent(&opts.user_agent)
                .timeout(opts.timeout)
                .cookie_store(true)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .expect("failed to build HTTP client")
        });

        let store = ArticleStore::new(&opts.base_dir);
        let fetch_opts = FetchOptions {
            allow_private_networks: opts.allow_private_networks,
        };
        let pipeline = ImagePipeline::new(
            http_client.clone(),
            fetch_opts,
            store.images_dir(),
            opts.jpeg_quality,
        );
        let read_later = opts.read_later.clone().map(|credentials| {
            ReadLaterClient::new(
                http_client.clone(),
                opts.read_later_endpoint.clone(),
                credentials,
            )
        });

        Self {
            opts,
            scanner: Box::new(RegexScanner),
            hashes: PerceptualHashCache::new(),
            pipeline,
            store,
            read_later,
        }
    }

    /// Swap the image scanner, e.g. for a DOM-based one.
    pub fn with_scanner(mut self, scanner: Box<dyn ImageScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    /// Turns one mail message into a stored article and submits its public link.
    ///
    /// Retention runs first and the perceptual-hash cache is reset, so duplicate
    /// detection never reaches files that belong to another article. Publishing
    /// problems are logged and reported through `published`; only storage
    /// failures are returned as errors.
    pub async fn process_message(
        &mut self,
        msg: &MailMessage,
    ) -> Result<ProcessedArticle, CurateError> {
        info!(subject = %msg.subject, "processing message");
        match self.store.cleanup_old_articles(self.opts.max_articles) {
            Ok(0) => {}
            Ok(removed) => info!(removed, "old articles removed"),
            Err(e) => warn!(error = %e, "cleanup failed"),
        }
        self.hashes.reset();

        let article_id = Uuid::new_v4().to_string();
        let content = msg.content();

        let mut mapping = {
            let doc = Html::parse_document(&content);
            ArticleMapping {
                og_title: extract_meta_tag(&doc, "og:title"),
                og_description: extract_meta_tag(&doc, "og:description"),
                og_type: extract_meta_tag(&doc, "og:type").unwrap_or_else(|| "article".to_string()),
                og_url: extract_meta_tag(&doc, "og:url"),
                ..Default::default()
            }
        };
        if mapping.og_title.is_none() {
            mapping.og_title = Some(msg.subject.clone());
        }
        let sent = resolve_mail_date(msg.date, self.opts.display_offset, Utc::now());
        mapping.mail_date = format_mail_date(&sent);

        let assembled = ArticleAssembler::new(self.scanner.as_ref(), &self.pipeline)
            .assemble(&mut self.hashes, &content)
            .await;
        mapping.og_image_local = assembled.cover;
        mapping.body_mappings = assembled.body_mappings;

        self.store.save(&article_id, &assembled.html, &mapping)?;

        let public_url = article_url(&self.opts.public_base_url, &format!("{}.html", article_id));
        let published = match &self.read_later {
            Some(client) => match client.submit(&public_url, &msg.subject).await {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    warn!(error = %e, "publishing failed");
                    None
                }
            },
            None => {
                info!("read-later credentials not configured, skipping publish");
                None
            }
        };

        Ok(ProcessedArticle {
            article_id,
            public_url,
            mapping,
            published,
        })
    }

    /// Renders a stored article with its local images and header link.
    ///
    /// An unreadable mapping file only costs the image rewrites; the body is
    /// still served.
    pub fn render(&self, filename: &str) -> Result<String, CurateError> {
        let html = self.store.read_article(filename)?;
        let mapping = match self.store.load_mapping(filename) {
            Ok(mapping) => mapping,
            Err(e) => {
                warn!(article = filename, error = %e, "mapping unreadable, rendering without it");
                None
            }
        };
        Ok(render_article(
            &html,
            mapping.as_ref(),
            &self.opts.public_base_url,
            filename,
        ))
    }

    /// Applies the retention limit now; returns how many articles were removed.
    pub fn cleanup(&self) -> Result<usize, CurateError> {
        self.store.cleanup_old_articles(self.opts.max_articles)
    }

    pub fn stats(&self) -> Result<StoreStats, CurateError> {
        self.store.stats()
    }
}

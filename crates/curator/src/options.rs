// ABOUTME: Configuration options for the curator including Options and CuratorBuilder.
// ABOUTME: Options can be read from LETTERBOX_* / INSTAPAPER_* environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use tracing::warn;

use crate::curator::Curator;
use crate::error::CurateError;
use crate::images::normalize::DEFAULT_JPEG_QUALITY;
use crate::publish::INSTAPAPER_ADD_URL;

/// Default number of articles kept on disk.
pub const DEFAULT_MAX_ARTICLES: usize = 50;

/// Read-later account credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Configuration options for the curator.
#[derive(Debug, Clone)]
pub struct Options {
    /// Root of the `articles/`, `images/` and `data/` folders.
    pub base_dir: PathBuf,
    /// Public origin articles and images are served from.
    pub public_base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub jpeg_quality: u8,
    pub max_articles: usize,
    /// Offset mail dates are displayed in.
    pub display_offset: FixedOffset,
    pub read_later: Option<Credentials>,
    pub read_later_endpoint: String,
    pub http_client: Option<reqwest::Client>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            public_base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(10),
            user_agent: "Mozilla/5.0".to_string(),
            allow_private_networks: false,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_articles: DEFAULT_MAX_ARTICLES,
            display_offset: FixedOffset::east_opt(3 * 3600).expect("UTC+3 is a valid offset"),
            read_later: None,
            read_later_endpoint: INSTAPAPER_ADD_URL.to_string(),
            http_client: None,
        }
    }
}

impl Options {
    /// Defaults overlaid with whatever the environment provides.
    ///
    /// An unparsable `LETTERBOX_MAX_ARTICLES` is an error. Credentials are only
    /// picked up when both user and password are set.
    pub fn from_env() -> Result<Self, CurateError> {
        let mut opts = Self::default();
        if let Ok(dir) = env::var("LETTERBOX_BASE_DIR") {
            opts.base_dir = PathBuf::from(dir);
        }
        if let Ok(url) = env::var("LETTERBOX_PUBLIC_URL") {
            opts.public_base_url = url;
        }
        if let Ok(max) = env::var("LETTERBOX_MAX_ARTICLES") {
            opts.max_articles = max.trim().parse().map_err(|e| {
                CurateError::decode(
                    "LETTERBOX_MAX_ARTICLES",
                    "Config",
                    Some(anyhow::anyhow!("not a number: {}", e)),
                )
            })?;
        }
        match (env::var("INSTAPAPER_USER"), env::var("INSTAPAPER_PASS")) {
            (Ok(username), Ok(password)) if !username.is_empty() => {
                opts.read_later = Some(Credentials { username, password });
            }
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                warn!("incomplete read-later credentials, publishing disabled");
            }
            _ => {}
        }
        Ok(opts)
    }
}

/// Builder for constructing Curator instances with custom configuration.
#[derive(Debug, Clone)]
pub struct CuratorBuilder {
    opts: Options,
}

impl CuratorBuilder {
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Start from existing options, e.g. ones read with [`Options::from_env`].
    pub fn from_options(opts: Options) -> Self {
        Self { opts }
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.opts.base_dir = dir.into();
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.opts.public_base_url = url.into();
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow image downloads from private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.opts.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn max_articles(mut self, max: usize) -> Self {
        self.opts.max_articles = max;
        self
    }

    pub fn display_offset(mut self, offset: FixedOffset) -> Self {
        self.opts.display_offset = offset;
        self
    }

    /// Enable read-later publishing with the given account.
    pub fn read_later(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.read_later = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Point publishing at a different add endpoint.
    pub fn read_later_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.opts.read_later_endpoint = endpoint.into();
        self
    }

    /// Disable publishing even when credentials were configured.
    pub fn without_read_later(mut self) -> Self {
        self.opts.read_later = None;
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Build the Curator with the configured options.
    pub fn build(self) -> Curator {
        Curator::new(self.opts)
    }
}

impl Default for CuratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ABOUTME: Read-later publishing through the Instapaper simple API.
// ABOUTME: Maps the documented status codes to SubmitOutcome; transport failures are errors.

use std::fmt;

use tracing::{info, warn};

use crate::error::CurateError;
use crate::options::Credentials;

/// Simple-API endpoint for adding a link.
pub const INSTAPAPER_ADD_URL: &str = "https://www.instapaper.com/api/add";

/// What the read-later service said about a submitted link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "outcome", content = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// 201: link saved.
    Accepted,
    /// 403: bad credentials or the caller is blocked.
    Forbidden,
    /// 400: the service could not reach the link.
    Unreachable,
    /// Any other status.
    Rejected(u16),
}

impl SubmitOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            201 => SubmitOutcome::Accepted,
            403 => SubmitOutcome::Forbidden,
            400 => SubmitOutcome::Unreachable,
            other => SubmitOutcome::Rejected(other),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

impl fmt::Display for SubmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitOutcome::Accepted => write!(f, "accepted"),
            SubmitOutcome::Forbidden => write!(f, "forbidden"),
            SubmitOutcome::Unreachable => write!(f, "link unreachable"),
            SubmitOutcome::Rejected(status) => write!(f, "rejected with status {}", status),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReadLaterClient {
    http_client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl ReadLaterClient {
    pub fn new(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            credentials,
        }
    }

    /// Adds `url` to the account's reading list under `title`.
    pub async fn submit(&self, url: &str, title: &str) -> Result<SubmitOutcome, CurateError> {
        info!(url, "submitting to read-later service");
        let response = self
            .http_client
            .get(&self.endpoint)
            .query(&[
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
                ("url", url),
                ("title", title),
            ])
            .send()
            .await
            .map_err(|e| {
                CurateError::publish(url, "Submit", Some(anyhow::anyhow!("request failed: {}", e)))
            })?;

        let outcome = SubmitOutcome::from_status(response.status().as_u16());
        if outcome.is_accepted() {
            info!(url, title, "read-later service accepted link");
        } else {
            warn!(url, %outcome, "read-later service did not accept link");
        }
        Ok(outcome)
    }
}

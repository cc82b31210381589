// ABOUTME: Article data types: the incoming mail message and the persisted JSON mapping.
// ABOUTME: Also formats mail dates in the long Turkish display form used in article headers.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A mail message handed to the curator by whatever fetched it.
#[derive(Debug, Clone, Default)]
pub struct MailMessage {
    pub subject: String,
    pub html: Option<String>,
    pub text: Option<String>,
    pub date: Option<DateTime<FixedOffset>>,
}

impl MailMessage {
    /// The HTML body, or the plain-text body wrapped in a `<div>`.
    pub fn content(&self) -> String {
        match (&self.html, &self.text) {
            (Some(html), _) if !html.is_empty() => html.clone(),
            (_, Some(text)) => format!("<div>{}</div>", text),
            _ => "<div></div>".to_string(),
        }
    }
}

/// Sidecar mapping saved next to each article as `<uuid>.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArticleMapping {
    pub og_image_local: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_type: String,
    pub og_url: Option<String>,
    pub mail_date: String,
    /// Remote image URL to local file id.
    pub body_mappings: BTreeMap<String, String>,
}

impl Default for ArticleMapping {
    fn default() -> Self {
        Self {
            og_image_local: None,
            og_title: None,
            og_description: None,
            og_type: "article".to_string(),
            og_url: None,
            mail_date: String::new(),
            body_mappings: BTreeMap::new(),
        }
    }
}

impl ArticleMapping {
    /// Every local image file this article references.
    pub fn local_images(&self) -> impl Iterator<Item = &str> {
        self.og_image_local
            .as_deref()
            .into_iter()
            .chain(self.body_mappings.values().map(String::as_str))
    }
}

const MONTHS: [&str; 12] = [
    "ocak", "şubat", "mart", "nisan", "mayıs", "haziran", "temmuz", "ağustos", "eylül", "ekim",
    "kasım", "aralık",
];
const WEEKDAYS: [&str; 7] = [
    "Pazartesi",
    "Salı",
    "Çarşamba",
    "Perşembe",
    "Cuma",
    "Cumartesi",
    "Pazar",
];

/// Formats a date as `1 ocak 2024 Salı Saat 22.15`.
pub fn format_mail_date(dt: &DateTime<FixedOffset>) -> String {
    let month = MONTHS[dt.month0() as usize];
    let weekday = WEEKDAYS[dt.weekday().num_days_from_monday() as usize];
    format!(
        "{} {} {} {} Saat {}",
        dt.day(),
        month,
        dt.year(),
        weekday,
        dt.format("%H.%M")
    )
}

/// Converts the mail date into the display offset, falling back to `now` when
/// the date is missing or is a parser placeholder (year 1900 or earlier).
pub fn resolve_mail_date(
    date: Option<DateTime<FixedOffset>>,
    offset: FixedOffset,
    now: DateTime<Utc>,
) -> DateTime<FixedOffset> {
    let fallback = now.with_timezone(&offset);
    match date {
        Some(dt) => {
            let local = dt.with_timezone(&offset);
            if local.year() <= 1900 {
                warn!(date = %local, "invalid mail date, using current time");
                fallback
            } else {
                local
            }
        }
        None => fallback,
    }
}

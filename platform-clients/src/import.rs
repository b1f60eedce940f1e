//! Posts exported by other tools, read from a JSON array on disk.
//!
//! Objects are loosely shaped: `likes`, `replies` and `date` are accepted as
//! aliases of `points`, `num_comments` and `created_at`.

use crate::adapter::{FetchBatch, SourceAdapter};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use painminer_core::{CoreError, Platform, RawPost};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

const TITLE_FROM_BODY_CHARS: usize = 80;

fn text(item: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match item.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn count(item: &Map<String, Value>, keys: &[&str]) -> i64 {
    keys.iter()
        .find_map(|k| match item.get(*k)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        })
        .unwrap_or(0)
        .max(0)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, a bare date or unix seconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => Utc.timestamp_opt(n.as_f64()? as i64, 0).single(),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
            Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
        }
        _ => None,
    }
}

/// Stable id for an imported item: its own id, else a UUID v5 of its URL,
/// else its position in the file.
fn import_id(item: &Map<String, Value>, url: &str, index: usize) -> String {
    if let Some(id) = text(item, &["id"]) {
        return id;
    }
    if !url.is_empty() {
        return Uuid::new_v5(&Uuid::NAMESPACE_URL, url.as_bytes()).to_string();
    }
    format!("import_{index}")
}

/// Parse an exported JSON array into posts labelled with `platform`.
///
/// Entries that are not objects are skipped with a warning. The posts carry
/// no matched queries, since no search produced them.
pub fn parse_import(raw: &str, platform: Platform) -> Result<Vec<RawPost>, CoreError> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = value else {
        return Err(CoreError::InvalidInput {
            message: "expected a JSON array of post objects".to_string(),
        });
    };

    let mut posts = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(item) = item else {
            warn!("Skipping import entry {}: not an object", index);
            continue;
        };

        let url = text(&item, &["url"]).unwrap_or_default();
        let mut post = RawPost::new(platform, import_id(&item, &url, index));
        post.body = text(&item, &["body", "text"]).unwrap_or_default();
        post.title = text(&item, &["title"])
            .unwrap_or_else(|| post.body.chars().take(TITLE_FROM_BODY_CHARS).collect());
        post.url = url;
        post.author = text(&item, &["author"]).unwrap_or_default();
        if let Some(community) = text(&item, &["community"]) {
            post.community = community;
        }
        post.points = count(&item, &["points", "likes"]);
        post.num_comments = count(&item, &["num_comments", "replies"]);
        post.created_at = ["created_at", "date"]
            .iter()
            .find_map(|k| item.get(*k).and_then(parse_timestamp));
        posts.push(post);
    }
    Ok(posts)
}

/// Serves the posts of one exported file as if they had been fetched.
pub struct ImportSource {
    path: PathBuf,
    platform: Platform,
}

impl ImportSource {
    pub fn new(path: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            path: path.into(),
            platform,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceAdapter for ImportSource {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch(&self, _topic: &str) -> Result<FetchBatch, CoreError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let posts = parse_import(&raw, self.platform)?;
        info!("Imported {} posts from {}", posts.len(), self.path.display());

        let mut batch = FetchBatch::empty(self.platform);
        batch.posts = posts;
        Ok(batch)
    }
}

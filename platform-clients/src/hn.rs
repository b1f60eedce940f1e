//! Hacker News through the Algolia search API. No credentials needed.

use crate::adapter::{render_queries, FetchBatch, PostCollector, SourceAdapter};
use crate::http::{FetcherConfig, HttpFetcher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use painminer_core::{CoreError, HnConfig, Platform, RawPost};
use serde::Deserialize;
use tracing::{info, warn};

pub const ALGOLIA_BASE_URL: &str = "https://hn.algolia.com";

/// Comment searches phrased the way people complain.
pub const COMMENT_QUERY_TEMPLATES: &[&str] = &[
    "{topic} frustrating",
    "{topic} problem",
    "{topic} limitation",
    "{topic} workflow slow",
    "{topic} expensive",
    "{topic} inconsistent",
    "{topic} disappointing",
    "{topic} workaround",
    "wish {topic} could",
    "need {topic} tool",
    "{topic} alternative",
    "{topic} pain point",
];

pub const STORY_QUERY_TEMPLATES: &[&str] = &[
    "{topic}",
    "{topic} tool",
    "{topic} generation",
    "{topic} open source",
];

#[derive(Debug, Clone, Deserialize)]
pub struct AlgoliaResponse {
    #[serde(default)]
    pub hits: Vec<AlgoliaHit>,
    #[serde(rename = "nbHits", default)]
    pub nb_hits: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlgoliaHit {
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub story_title: Option<String>,
    #[serde(default)]
    pub story_text: Option<String>,
    #[serde(default)]
    pub comment_text: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub points: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    Comment,
    Story,
}

impl HitKind {
    fn tag(&self) -> &'static str {
        match self {
            HitKind::Comment => "comment",
            HitKind::Story => "story",
        }
    }
}

pub fn item_url(object_id: &str) -> String {
    format!("https://news.ycombinator.com/item?id={object_id}")
}

/// Turn Algolia's HTML comment markup into plain text.
pub fn clean_html(raw: &str) -> String {
    let with_breaks = raw.replace("<p>", "\n");
    let mut stripped = String::with_capacity(with_breaks.len());
    let mut in_tag = false;
    for c in with_breaks.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }
    html_escape::decode_html_entities(&stripped).trim().to_string()
}

impl AlgoliaHit {
    pub fn into_post(self, kind: HitKind) -> RawPost {
        let mut post = RawPost::new(Platform::Hn, self.object_id.clone());
        post.url = item_url(&self.object_id);
        post.author = self.author.unwrap_or_default();
        post.points = self.points.unwrap_or(0).max(0);
        post.created_at = self.created_at;
        match kind {
            HitKind::Comment => {
                post.title = self.story_title.unwrap_or_default();
                post.body = clean_html(self.comment_text.as_deref().unwrap_or_default());
            }
            HitKind::Story => {
                post.title = self.title.unwrap_or_default();
                post.body = clean_html(self.story_text.as_deref().unwrap_or_default());
                post.num_comments = self.num_comments.unwrap_or(0).max(0);
            }
        }
        post
    }
}

pub struct HnAdapter {
    fetcher: HttpFetcher,
    config: HnConfig,
    base_url: String,
}

impl HnAdapter {
    pub fn new(config: HnConfig, fetcher: FetcherConfig) -> Result<Self, CoreError> {
        Ok(Self {
            fetcher: HttpFetcher::new(Platform::Hn, fetcher)?,
            config,
            base_url: ALGOLIA_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, query: &str, kind: HitKind) -> Result<AlgoliaResponse, CoreError> {
        let mut params = vec![
            ("query", query.to_string()),
            ("tags", kind.tag().to_string()),
            ("hitsPerPage", self.config.hits_per_query.to_string()),
        ];
        if kind == HitKind::Story && self.config.min_points > 0 {
            params.push(("numericFilters", format!("points>{}", self.config.min_points)));
        }
        let url = format!("{}/api/v1/search", self.base_url.trim_end_matches('/'));
        self.fetcher.get_json(&url, &params, None).await
    }
}

#[async_trait]
impl SourceAdapter for HnAdapter {
    fn platform(&self) -> Platform {
        Platform::Hn
    }

    async fn fetch(&self, topic: &str) -> Result<FetchBatch, CoreError> {
        let mut collector = PostCollector::new();
        let mut batch = FetchBatch::empty(Platform::Hn);

        let plan = render_queries(COMMENT_QUERY_TEMPLATES, topic)
            .into_iter()
            .map(|q| (q, HitKind::Comment))
            .chain(
                render_queries(STORY_QUERY_TEMPLATES, topic)
                    .into_iter()
                    .map(|q| (q, HitKind::Story)),
            );

        for (query, kind) in plan {
            batch.queries_issued += 1;
            match self.search(&query, kind).await {
                Ok(response) => {
                    info!(
                        "[HN {}] '{}' -> {} total, fetched {}",
                        kind.tag(),
                        query,
                        response.nb_hits,
                        response.hits.len()
                    );
                    for hit in response.hits {
                        collector.add(hit.into_post(kind), &query);
                    }
                }
                Err(e) => {
                    warn!("[HN {}] '{}' failed: {}", kind.tag(), query, e);
                    batch.failed_queries += 1;
                }
            }
        }

        batch.posts = collector.into_posts();
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_html() {
        assert_eq!(
            clean_html("It&#x27;s slow.<p>Really <i>slow</i> &amp; <a href=\"x\">buggy</a>"),
            "It's slow.\nReally slow & buggy"
        );
        assert_eq!(clean_html(""), "");
        // Decoded angle brackets are text, not markup.
        assert_eq!(clean_html("a &lt;b&gt; c"), "a <b> c");
    }

    #[test]
    fn test_comment_hit_conversion() {
        let hit: AlgoliaHit = serde_json::from_str(
            r#"{"objectID": "123", "story_title": "Ask HN: tools", "comment_text": "I hate it",
                "author": "pg", "points": null, "created_at": "2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();
        let post = hit.into_post(HitKind::Comment);
        assert_eq!(post.id, "123");
        assert_eq!(post.url, "https://news.ycombinator.com/item?id=123");
        assert_eq!(post.title, "Ask HN: tools");
        assert_eq!(post.body, "I hate it");
        assert_eq!(post.points, 0);
        assert!(post.created_at.is_some());
    }

    #[test]
    fn test_story_hit_conversion() {
        let hit: AlgoliaHit = serde_json::from_str(
            r#"{"objectID": "9", "title": "Show HN: x", "points": 120, "num_comments": 44}"#,
        )
        .unwrap();
        let post = hit.into_post(HitKind::Story);
        assert_eq!(post.title, "Show HN: x");
        assert_eq!(post.points, 120);
        assert_eq!(post.num_comments, 44);
        assert!(post.body.is_empty());
    }

    #[test]
    fn test_query_plan_size() {
        assert_eq!(COMMENT_QUERY_TEMPLATES.len(), 12);
        assert_eq!(STORY_QUERY_TEMPLATES.len(), 4);
    }
}

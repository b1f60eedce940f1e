//! X through the v2 recent-search endpoint. Needs a bearer token with search access.

use crate::adapter::{render_queries, FetchBatch, PostCollector, SourceAdapter};
use crate::http::{FetcherConfig, HttpFetcher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use painminer_core::{CoreError, Platform, RawPost, XConfig};
use serde::Deserialize;
use tracing::{info, warn};

pub const X_BASE_URL: &str = "https://api.x.com";
const TWEET_FIELDS: &str = "created_at,public_metrics,author_id,conversation_id";

pub const QUERY_TEMPLATES: &[&str] = &[
    r#""{topic}" (frustrating OR terrible OR hate OR broken)"#,
    r#""{topic}" ("wish there was" OR "someone should build" OR "need a tool")"#,
    r#""{topic}" (expensive OR overpriced OR "would pay")"#,
    r#""{topic}" (alternative OR workaround OR "looking for")"#,
];

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<Tweet>,
    #[serde(default)]
    pub meta: Option<SearchMeta>,
}

#[derive(Debug, Deserialize)]
pub struct SearchMeta {
    #[serde(default)]
    pub result_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
}

#[derive(Debug, Default, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub retweet_count: i64,
    #[serde(default)]
    pub reply_count: i64,
}

impl From<Tweet> for RawPost {
    fn from(tweet: Tweet) -> Self {
        let mut post = RawPost::new(Platform::X, tweet.id);
        post.url = format!("https://x.com/i/status/{}", post.id);
        post.body = tweet.text;
        post.author = tweet.author_id.unwrap_or_default();
        post.community = "twitter".to_string();
        post.points = (tweet.public_metrics.like_count + tweet.public_metrics.retweet_count).max(0);
        post.num_comments = tweet.public_metrics.reply_count.max(0);
        post.created_at = tweet.created_at;
        post
    }
}

pub struct XAdapter {
    fetcher: HttpFetcher,
    config: XConfig,
    base_url: String,
}

impl XAdapter {
    pub fn new(config: XConfig, fetcher: FetcherConfig) -> Result<Self, CoreError> {
        Ok(Self {
            fetcher: HttpFetcher::new(Platform::X, fetcher)?,
            config,
            base_url: X_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn search(&self, query: &str, token: &str) -> Result<SearchResponse, CoreError> {
        let url = format!("{}/2/tweets/search/recent", self.base_url.trim_end_matches('/'));
        // The endpoint rejects page sizes outside 10..=100.
        let max_results = self.config.max_results_per_query.clamp(10, 100);
        let params = [
            ("query", format!("{query} -is:retweet lang:en")),
            ("max_results", max_results.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        self.fetcher.get_json(&url, &params, Some(token)).await
    }
}

#[async_trait]
impl SourceAdapter for XAdapter {
    fn platform(&self) -> Platform {
        Platform::X
    }

    async fn fetch(&self, topic: &str) -> Result<FetchBatch, CoreError> {
        let mut batch = FetchBatch::empty(Platform::X);
        let Some(token) = self.config.bearer_token.as_deref().filter(|t| !t.trim().is_empty()) else {
            warn!("[X] No bearer token, set X_BEARER_TOKEN to search X");
            return Ok(batch);
        };

        let mut collector = PostCollector::new();
        for query in render_queries(QUERY_TEMPLATES, topic) {
            batch.queries_issued += 1;
            match self.search(&query, token).await {
                Ok(response) => {
                    let total = response
                        .meta
                        .map(|m| m.result_count)
                        .unwrap_or(response.data.len() as u64);
                    info!("[X] '{}' -> {} results", query, total);
                    for tweet in response.data {
                        collector.add(RawPost::from(tweet), &query);
                    }
                }
                Err(e) => {
                    warn!("[X] '{}' failed: {}", query, e);
                    batch.failed_queries += 1;
                }
            }
        }

        batch.posts = collector.into_posts();
        Ok(batch)
    }
}

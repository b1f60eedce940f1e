//! Reddit through its public `.json` endpoints. No OAuth; anonymous clients
//! are throttled, so requests are paced at least `min_query_delay_ms` apart.

use crate::adapter::{append_section, render_queries, FetchBatch, PostCollector, SourceAdapter};
use crate::http::{FetcherConfig, HttpFetcher};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use painminer_core::{CoreError, Platform, RawPost, RedditConfig};
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, info, warn};

pub const REDDIT_BASE_URL: &str = "https://www.reddit.com";
const TOP_COMMENTS: usize = 5;
const COMMENTS_MARKER: &str = "\n\n--- TOP COMMENTS ---\n";
const COMMENT_SEPARATOR: &str = "\n---\n";

pub const QUERY_TEMPLATES: &[&str] = &[
    r#""{topic}" ("I wish" OR "is there a tool" OR "frustrating")"#,
    r#""{topic}" ("I'd pay for" OR "someone should build" OR "workaround")"#,
    r#""{topic}" (complaint OR problem OR "waste of time")"#,
    r#""{topic}" (alternative OR "looking for" OR disappointing)"#,
];

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    #[serde(default)]
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<RedditListingChild<T>>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedditCommentData {
    #[serde(default)]
    pub body: String,
}

/// A thread page is a two-element array: the post listing, then comments.
pub type ThreadResponse = (
    RedditListing<IgnoredAny>,
    RedditListing<RedditCommentData>,
);

fn timestamp(created_utc: Option<f64>) -> Option<DateTime<Utc>> {
    let secs = created_utc?;
    Utc.timestamp_opt(secs as i64, 0).single()
}

impl From<RedditPostData> for RawPost {
    fn from(data: RedditPostData) -> Self {
        let mut post = RawPost::new(Platform::Reddit, data.id);
        post.url = format!("https://reddit.com{}", data.permalink);
        post.title = data.title;
        post.body = data.selftext;
        post.author = if data.author.is_empty() {
            "[deleted]".to_string()
        } else {
            data.author
        };
        post.community = data.subreddit;
        post.points = data.score.max(0);
        post.num_comments = data.num_comments.max(0);
        post.created_at = timestamp(data.created_utc);
        post
    }
}

/// Usable comment bodies from a thread, skipping deleted and removed ones.
pub fn top_comments(thread: ThreadResponse, limit: usize) -> Vec<String> {
    thread
        .1
        .data
        .children
        .into_iter()
        .take(limit)
        .filter(|c| c.kind == "t1")
        .map(|c| c.data.body)
        .filter(|b| !b.trim().is_empty() && b != "[deleted]" && b != "[removed]")
        .collect()
}

pub struct RedditAdapter {
    fetcher: HttpFetcher,
    config: RedditConfig,
    subreddits: Vec<String>,
    base_url: String,
}

impl RedditAdapter {
    pub fn new(config: RedditConfig, mut fetcher: FetcherConfig) -> Result<Self, CoreError> {
        let min_delay = std::time::Duration::from_millis(config.min_query_delay_ms);
        fetcher.min_interval = fetcher.min_interval.max(min_delay);
        fetcher.user_agent = config.user_agent.clone();
        Ok(Self {
            fetcher: HttpFetcher::new(Platform::Reddit, fetcher)?,
            subreddits: config.default_subreddits.clone(),
            config,
            base_url: REDDIT_BASE_URL.to_string(),
        })
    }

    /// Search these subreddits instead of the configured defaults.
    pub fn with_subreddits(mut self, subreddits: Vec<String>) -> Self {
        if !subreddits.is_empty() {
            self.subreddits = subreddits;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    async fn search(&self, query: &str) -> Result<RedditListing<RedditPostData>, CoreError> {
        let url = format!("{}/r/{}/search.json", self.base(), self.subreddits.join("+"));
        let params = [
            ("q", query.to_string()),
            ("sort", self.config.sort.clone()),
            ("t", self.config.time_filter.clone()),
            ("limit", self.config.limit.to_string()),
            ("restrict_sr", "on".to_string()),
        ];
        self.fetcher.get_json(&url, &params, None).await
    }

    async fn comments(&self, subreddit: &str, post_id: &str) -> Vec<String> {
        let url = format!("{}/r/{}/comments/{}.json", self.base(), subreddit, post_id);
        match self.fetcher.get_json::<ThreadResponse>(&url, &[], None).await {
            Ok(thread) => top_comments(thread, TOP_COMMENTS),
            Err(e) => {
                debug!("Could not load comments for reddit:{}: {}", post_id, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn platform(&self) -> Platform {
        Platform::Reddit
    }

    async fn fetch(&self, topic: &str) -> Result<FetchBatch, CoreError> {
        let mut collector = PostCollector::new();
        let mut batch = FetchBatch::empty(Platform::Reddit);

        for query in render_queries(QUERY_TEMPLATES, topic) {
            batch.queries_issued += 1;
            let listing = match self.search(&query).await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("[Reddit] '{}' failed: {}", query, e);
                    batch.failed_queries += 1;
                    continue;
                }
            };

            let mut new_posts = 0;
            for child in listing.data.children {
                if child.kind != "t3" {
                    continue;
                }
                if collector.contains(&child.data.id) {
                    collector.add(RawPost::new(Platform::Reddit, child.data.id), &query);
                    continue;
                }

                let mut post = RawPost::from(child.data);
                if post.num_comments >= self.config.comment_threshold {
                    let subreddit = if post.community.is_empty() {
                        self.subreddits.first().cloned().unwrap_or_default()
                    } else {
                        post.community.clone()
                    };
                    let comments = self.comments(&subreddit, &post.id).await;
                    append_section(&mut post.body, COMMENTS_MARKER, &comments, COMMENT_SEPARATOR);
                }
                collector.add(post, &query);
                new_posts += 1;
            }
            info!("[Reddit] '{}' -> {} new posts", query, new_posts);
        }

        batch.posts = collector.into_posts();
        Ok(batch)
    }
}

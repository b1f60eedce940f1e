//! Product Hunt through the v2 GraphQL API.
//!
//! There is no keyword search, so the topic is mapped onto Product Hunt topic
//! slugs, each slug is paged through, and posts are filtered client-side.

use crate::adapter::{append_section, FetchBatch, PostCollector, SourceAdapter};
use crate::http::{FetcherConfig, HttpFetcher};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use painminer_core::{canonical_url, CoreError, Platform, ProductHuntConfig, RawPost, SourceError};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub const GRAPHQL_URL: &str = "https://api.producthunt.com/v2/api/graphql";
const COMMENTS_MARKER: &str = "\n\n--- User Comments ---\n";
const DEFAULT_POSTED_WITHIN_DAYS: u32 = 180;

const POSTS_QUERY: &str = r#"
query($topic: String!, $cursor: String, $postedAfter: DateTime) {
  posts(topic: $topic, after: $cursor, postedAfter: $postedAfter, order: VOTES, first: 20) {
    edges {
      node {
        id
        name
        tagline
        description
        url
        votesCount
        commentsCount
        createdAt
        website
        topics { edges { node { name slug } } }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

const COMMENTS_QUERY: &str = r#"
query($postId: ID!) {
  post(id: $postId) {
    comments(first: 10, order: VOTES) {
      edges { node { id body votesCount createdAt } }
    }
  }
}
"#;

const TOPIC_SLUGS: &[(&str, &[&str])] = &[
    ("ai", &["artificial-intelligence", "ai", "machine-learning"]),
    ("video", &["video", "video-editing", "video-streaming"]),
    ("design", &["design-tools", "web-design", "graphic-design"]),
    ("developer", &["developer-tools", "open-source", "github"]),
    ("nocode", &["no-code", "low-code"]),
    ("saas", &["saas", "productivity", "software-engineering"]),
    ("marketing", &["marketing", "seo", "social-media-marketing"]),
];

const FALLBACK_SLUGS: &[&str] = &["tech", "artificial-intelligence", "developer-tools"];

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostsData {
    pub posts: Connection<ProductNode>,
}

#[derive(Debug, Deserialize)]
pub struct TopicNode {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tagline: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub votes_count: i64,
    #[serde(default)]
    pub comments_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub topics: Option<Connection<TopicNode>>,
}

#[derive(Debug, Deserialize)]
pub struct CommentsData {
    pub post: Option<CommentedPost>,
}

#[derive(Debug, Deserialize)]
pub struct CommentedPost {
    pub comments: Connection<CommentNode>,
}

#[derive(Debug, Deserialize)]
pub struct CommentNode {
    #[serde(default)]
    pub body: String,
}

fn topic_words(topic: &str) -> Vec<String> {
    topic
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Product Hunt topic slugs for a free-text topic, in a stable order.
pub fn topic_slugs(topic: &str) -> Vec<String> {
    let words: BTreeSet<String> = topic_words(topic).into_iter().collect();
    let mut slugs = BTreeSet::new();
    for (key, mapped) in TOPIC_SLUGS {
        if words.contains(*key) {
            slugs.extend(mapped.iter().map(|s| s.to_string()));
        }
    }
    if slugs.is_empty() {
        slugs.extend(FALLBACK_SLUGS.iter().map(|s| s.to_string()));
    }
    slugs.into_iter().collect()
}

/// Keywords of two or more letters used to filter posts client-side.
pub fn topic_keywords(topic: &str) -> Vec<String> {
    topic_words(topic).into_iter().filter(|w| w.len() >= 2).collect()
}

impl ProductNode {
    pub fn matches(&self, keywords: &[String]) -> bool {
        let text = format!(
            "{} {} {}",
            self.name,
            self.tagline,
            self.description.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        keywords.iter().any(|kw| text.contains(kw.as_str()))
    }

    pub fn into_post(self) -> RawPost {
        let mut post = RawPost::new(Platform::ProductHunt, self.id);
        post.url = canonical_url(&self.url).unwrap_or_default();
        post.title = self.name;
        post.body = format!(
            "{}\n{}",
            self.tagline,
            self.description.unwrap_or_default()
        )
        .trim()
        .to_string();
        let community: Vec<String> = self
            .topics
            .map(|t| t.edges.into_iter().take(3).map(|e| e.node.name).collect())
            .unwrap_or_default();
        if !community.is_empty() {
            post.community = community.join(", ");
        }
        post.points = self.votes_count.max(0);
        post.num_comments = self.comments_count.max(0);
        post.created_at = self.created_at;
        post
    }
}

pub struct ProductHuntAdapter {
    fetcher: HttpFetcher,
    config: ProductHuntConfig,
    posted_within_days: u32,
    endpoint: String,
}

impl ProductHuntAdapter {
    pub fn new(config: ProductHuntConfig, fetcher: FetcherConfig) -> Result<Self, CoreError> {
        Ok(Self {
            fetcher: HttpFetcher::new(Platform::ProductHunt, fetcher)?,
            config,
            posted_within_days: DEFAULT_POSTED_WITHIN_DAYS,
            endpoint: GRAPHQL_URL.to_string(),
        })
    }

    /// Only ask for launches newer than this many days.
    pub fn with_posted_within_days(mut self, days: u32) -> Self {
        self.posted_within_days = days;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn token(&self) -> Option<&str> {
        self.config
            .developer_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    async fn query<T>(&self, query: &str, variables: serde_json::Value, token: &str) -> Result<T, CoreError>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = json!({ "query": query, "variables": variables });
        let response: GraphQlResponse<T> = self.fetcher.post_json(&self.endpoint, &body, Some(token)).await?;
        if !response.errors.is_empty() {
            let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(SourceError::InvalidResponse {
                platform: Platform::ProductHunt,
                details: messages.join("; "),
            }
            .into());
        }
        response.data.ok_or_else(|| {
            SourceError::InvalidResponse {
                platform: Platform::ProductHunt,
                details: "response carried no data".to_string(),
            }
            .into()
        })
    }

    async fn comments(&self, post_id: &str, token: &str) -> Vec<String> {
        let result: Result<CommentsData, CoreError> = self
            .query(COMMENTS_QUERY, json!({ "postId": post_id }), token)
            .await;
        match result {
            Ok(data) => data
                .post
                .map(|p| {
                    p.comments
                        .edges
                        .into_iter()
                        .map(|e| e.node.body)
                        .filter(|b| !b.trim().is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            Err(e) => {
                debug!("Could not load comments for producthunt:{}: {}", post_id, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for ProductHuntAdapter {
    fn platform(&self) -> Platform {
        Platform::ProductHunt
    }

    async fn fetch(&self, topic: &str) -> Result<FetchBatch, CoreError> {
        let mut batch = FetchBatch::empty(Platform::ProductHunt);
        let Some(token) = self.token() else {
            warn!("[PH] No developer token, set PRODUCTHUNT_TOKEN to search Product Hunt");
            return Ok(batch);
        };

        let posted_after = (Utc::now() - Duration::days(i64::from(self.posted_within_days)))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let keywords = topic_keywords(topic);
        let slugs = topic_slugs(topic);
        info!("[PH] Searching topic slugs: {}", slugs.join(", "));

        let mut collector = PostCollector::new();
        for slug in &slugs {
            batch.queries_issued += 1;
            let mut cursor: Option<String> = None;
            for page in 1..=self.config.max_pages_per_topic.max(1) {
                let variables = json!({
                    "topic": slug,
                    "postedAfter": posted_after,
                    "cursor": cursor,
                });
                let data: PostsData = match self.query(POSTS_QUERY, variables, token).await {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("[PH] topic '{}' page {} failed: {}", slug, page, e);
                        if page == 1 {
                            batch.failed_queries += 1;
                        }
                        break;
                    }
                };

                let connection = data.posts;
                if connection.edges.is_empty() {
                    break;
                }
                let total = connection.edges.len();
                let mut matched = 0;
                for edge in connection.edges {
                    if !edge.node.matches(&keywords) {
                        continue;
                    }
                    if !collector.contains(&edge.node.id) {
                        matched += 1;
                    }
                    collector.add(edge.node.into_post(), slug);
                }
                info!("[PH] topic '{}' page {} -> {} posts, {} matched", slug, page, total, matched);

                match connection.page_info {
                    PageInfo { has_next_page: true, end_cursor: Some(next) } => cursor = Some(next),
                    _ => break,
                }
            }
        }

        let mut enriched = 0;
        let mut posts = collector.into_posts();
        for post in posts
            .iter_mut()
            .filter(|p| p.num_comments >= self.config.min_comments_to_fetch)
        {
            let comments = self.comments(&post.id, token).await;
            if !comments.is_empty() {
                append_section(&mut post.body, COMMENTS_MARKER, &comments, "\n");
                enriched += 1;
            }
        }
        if enriched > 0 {
            info!("[PH] Enriched {} posts with top comments", enriched);
        }

        batch.posts = posts;
        Ok(batch)
    }
}
